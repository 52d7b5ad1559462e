//! Job adapter: turns a raw message into a runnable job and runs it.
//!
//! Payload format carried in the SQS message body:
//!
//! ```json
//! {
//!   "uuid": "7f9c…",
//!   "displayName": "Send welcome email",
//!   "job": "send_welcome_email",
//!   "data": { "user_id": "…", "email": "…" },
//!   "version": 1,
//!   "attempts": 0
//! }
//! ```
//!
//! Only `job` and `data` are required.

use crate::error::DeserializationError;
use crate::message::RawMessage;
use crate::outcome::{FailureDetail, Outcome};
use crate::registry::{JobRegistry, PreparedJob};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

/// Payload version this worker understands
pub const PAYLOAD_VERSION: u32 = 1;

/// Job payload envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Job type id, resolved through the [`JobRegistry`]
    pub job: String,

    /// Job data, deserialized by the registered handler
    pub data: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Attempts recorded by the producer; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl JobPayload {
    /// Build a payload for `data`, stamped with a fresh uuid and the current version.
    pub fn new<T: Serialize>(
        job_type: impl Into<String>,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            uuid: Some(Uuid::new_v4().to_string()),
            display_name: None,
            job: job_type.into(),
            data: serde_json::to_value(data)?,
            version: Some(PAYLOAD_VERSION),
            attempts: Some(0),
        })
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Serialize to the message body string
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a message body
    pub fn from_body(body: &str) -> Result<Self, DeserializationError> {
        let payload: Self = serde_json::from_str(body)
            .map_err(|e| DeserializationError::InvalidPayload(e.to_string()))?;

        match payload.version {
            Some(found) if found != PAYLOAD_VERSION => {
                Err(DeserializationError::UnsupportedVersion {
                    found,
                    supported: PAYLOAD_VERSION,
                })
            }
            _ => Ok(payload),
        }
    }

    /// Identifying metadata for logs and failure details
    pub fn metadata(&self) -> JobMetadata {
        JobMetadata {
            job_type: self.job.clone(),
            uuid: self.uuid.clone(),
            display_name: self.display_name.clone().unwrap_or_else(|| self.job.clone()),
            attempts: self.attempts,
        }
    }
}

/// Identifying metadata of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMetadata {
    pub job_type: String,
    pub uuid: Option<String>,
    pub display_name: String,
    pub attempts: Option<u32>,
}

impl JobMetadata {
    /// Metadata when only the job type is known
    pub fn for_type(job_type: impl Into<String>) -> Self {
        let job_type = job_type.into();
        Self {
            display_name: job_type.clone(),
            job_type,
            uuid: None,
            attempts: None,
        }
    }
}

/// What a handler can see about the delivery it is running for.
#[derive(Debug, Clone, Copy)]
pub struct JobDelivery<'a> {
    pub connection_name: &'a str,
    pub queue_name: &'a str,
    pub message: &'a RawMessage,
    pub metadata: &'a JobMetadata,
}

impl JobDelivery<'_> {
    /// Delivery attempt number as counted by SQS
    pub fn attempt(&self) -> u32 {
        self.message.approximate_receive_count
    }
}

/// Execution context for one message.
///
/// Created per message by [`JobAdapter::adapt`] and consumed by
/// [`JobAdapter::execute`].
pub struct JobContext {
    pub connection_name: String,
    pub queue_name: String,
    pub message: RawMessage,
    pub metadata: JobMetadata,
    job: Box<dyn PreparedJob>,
}

impl JobContext {
    /// Name of the handler bound to this job
    pub fn handler_name(&self) -> &'static str {
        self.job.handler_name()
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("connection_name", &self.connection_name)
            .field("queue_name", &self.queue_name)
            .field("message_id", &self.message.id)
            .field("metadata", &self.metadata)
            .field("handler", &self.job.handler_name())
            .finish()
    }
}

/// Deserializes message bodies into jobs bound to one connection/queue pair
/// and runs them.
#[derive(Debug, Clone)]
pub struct JobAdapter {
    registry: Arc<JobRegistry>,
    connection_name: String,
    queue_name: String,
}

impl JobAdapter {
    pub fn new(
        registry: Arc<JobRegistry>,
        connection_name: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            connection_name: connection_name.into(),
            queue_name: queue_name.into(),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Deserialize the message body into an execution context.
    pub fn adapt(&self, message: &RawMessage) -> Result<JobContext, DeserializationError> {
        let payload = JobPayload::from_body(&message.body)?;
        let metadata = payload.metadata();
        let prepared = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry.prepare(&payload.job, payload.data)
        }));
        let job = match prepared {
            Ok(job) => job?,
            Err(panic) => {
                return Err(DeserializationError::InvalidJobData {
                    job_type: payload.job,
                    details: panic_message("deserializer", panic.as_ref()),
                });
            }
        };

        Ok(JobContext {
            connection_name: self.connection_name.clone(),
            queue_name: self.queue_name.clone(),
            message: message.clone(),
            metadata,
            job,
        })
    }

    /// Run the job once.
    ///
    /// Errors and panics raised by the handler become a failed outcome; nothing
    /// escapes this call.
    pub async fn execute(&self, context: JobContext) -> Outcome {
        let JobContext {
            connection_name,
            queue_name,
            message,
            metadata,
            job,
        } = context;

        let delivery = JobDelivery {
            connection_name: &connection_name,
            queue_name: &queue_name,
            message: &message,
            metadata: &metadata,
        };

        match AssertUnwindSafe(job.run(&delivery)).catch_unwind().await {
            Ok(Ok(())) => Outcome::Succeeded,
            Ok(Err(error)) => Outcome::Failed(FailureDetail::execution(&error, metadata.clone())),
            Err(panic) => Outcome::Failed(FailureDetail::panic(
                panic_message("job", panic.as_ref()),
                metadata.clone(),
            )),
        }
    }
}

fn panic_message(what: &str, panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("{what} panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("{what} panicked: {message}")
    } else {
        format!("{what} panicked")
    }
}
