//! Job handler trait and the job type registry.
//!
//! The registry maps the `job` field of a payload to the handler that owns
//! that job type. Handlers get their dependencies through their constructor,
//! the registry only stores them.

use crate::adapter::JobDelivery;
use crate::error::{DeserializationError, JobError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// Trait for job handlers.
///
/// One implementation per job type. `J` is the typed job data, deserialized
/// from the payload's `data` field before the handler is called.
///
/// # Example
///
/// ```rust,ignore
/// use sqs_worker::{JobDelivery, JobError, JobHandler};
///
/// #[derive(Deserialize)]
/// struct WelcomeEmail {
///     user_id: Uuid,
///     email: String,
/// }
///
/// struct WelcomeEmailHandler {
///     mailer: Arc<dyn Mailer>,
/// }
///
/// #[async_trait]
/// impl JobHandler<WelcomeEmail> for WelcomeEmailHandler {
///     async fn handle(&self, job: WelcomeEmail, _delivery: &JobDelivery<'_>) -> Result<(), JobError> {
///         self.mailer
///             .send(&job.email, "Welcome!")
///             .await
///             .map_err(|e| JobError::with_source("failed to send welcome email", e))
///     }
///
///     fn name(&self) -> &'static str {
///         "WelcomeEmailHandler"
///     }
/// }
/// ```
#[async_trait]
pub trait JobHandler<J>: Send + Sync
where
    J: Send + 'static,
{
    /// Run the job once.
    ///
    /// Return `Ok(())` for success, `Err` for failure. Failed messages are
    /// left on the queue and redelivered by SQS.
    async fn handle(&self, job: J, delivery: &JobDelivery<'_>) -> Result<(), JobError>;

    /// Get the handler name for logging.
    fn name(&self) -> &'static str;
}

/// A deserialized job bound to its handler, ready to run.
#[async_trait]
pub trait PreparedJob: Send {
    /// Name of the handler that will run the job
    fn handler_name(&self) -> &'static str;

    /// Run the job, consuming it
    async fn run(self: Box<Self>, delivery: &JobDelivery<'_>) -> Result<(), JobError>;
}

struct Prepared<J, H> {
    job: J,
    handler: Arc<H>,
}

#[async_trait]
impl<J, H> PreparedJob for Prepared<J, H>
where
    J: Send + 'static,
    H: JobHandler<J> + 'static,
{
    fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    async fn run(self: Box<Self>, delivery: &JobDelivery<'_>) -> Result<(), JobError> {
        let Prepared { job, handler } = *self;
        handler.handle(job, delivery).await
    }
}

/// Type-erased handler entry stored in the registry.
trait ErasedHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn prepare(
        &self,
        data: serde_json::Value,
    ) -> Result<Box<dyn PreparedJob>, serde_json::Error>;
}

struct TypedHandler<J, H> {
    handler: Arc<H>,
    _job: PhantomData<fn() -> J>,
}

impl<J, H> ErasedHandler for TypedHandler<J, H>
where
    J: DeserializeOwned + Send + 'static,
    H: JobHandler<J> + 'static,
{
    fn name(&self) -> &'static str {
        self.handler.name()
    }

    fn prepare(
        &self,
        data: serde_json::Value,
    ) -> Result<Box<dyn PreparedJob>, serde_json::Error> {
        let job: J = serde_json::from_value(data)?;
        Ok(Box::new(Prepared {
            job,
            handler: Arc::clone(&self.handler),
        }))
    }
}

/// Registry of job types known to this worker.
///
/// Built once at cold start and shared read-only afterwards.
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn ErasedHandler>>,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job type.
    ///
    /// Registering a job type twice replaces the earlier handler.
    pub fn register<J, H>(self, job_type: impl Into<String>, handler: H) -> Self
    where
        J: DeserializeOwned + Send + 'static,
        H: JobHandler<J> + 'static,
    {
        self.register_arc(job_type, Arc::new(handler))
    }

    /// Register a handler that is shared with other owners.
    pub fn register_arc<J, H>(mut self, job_type: impl Into<String>, handler: Arc<H>) -> Self
    where
        J: DeserializeOwned + Send + 'static,
        H: JobHandler<J> + 'static,
    {
        let job_type = job_type.into();
        let entry: Arc<dyn ErasedHandler> = Arc::new(TypedHandler::<J, H> {
            handler,
            _job: PhantomData,
        });

        if let Some(previous) = self.handlers.insert(job_type.clone(), entry) {
            warn!(
                job_type = %job_type,
                replaced = %previous.name(),
                "Job type registered twice, replacing handler"
            );
        }

        self
    }

    /// Check whether a job type is registered
    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types, sorted
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Handler name for a job type
    pub fn handler_name(&self, job_type: &str) -> Option<&'static str> {
        self.handlers.get(job_type).map(|h| h.name())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deserialize job data for a job type and bind it to its handler.
    pub fn prepare(
        &self,
        job_type: &str,
        data: serde_json::Value,
    ) -> Result<Box<dyn PreparedJob>, DeserializationError> {
        let handler = self
            .handlers
            .get(job_type)
            .ok_or_else(|| DeserializationError::UnknownJobType(job_type.to_string()))?;

        handler
            .prepare(data)
            .map_err(|e| DeserializationError::InvalidJobData {
                job_type: job_type.to_string(),
                details: e.to_string(),
            })
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("job_types", &self.job_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::JobMetadata;
    use crate::message::RawMessage;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Deserialize)]
    struct AddJob {
        amount: u32,
    }

    #[derive(Default)]
    struct AddHandler {
        total: AtomicU32,
    }

    #[async_trait]
    impl JobHandler<AddJob> for AddHandler {
        async fn handle(&self, job: AddJob, _delivery: &JobDelivery<'_>) -> Result<(), JobError> {
            self.total.fetch_add(job.amount, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "AddHandler"
        }
    }

    struct OtherHandler;

    #[async_trait]
    impl JobHandler<AddJob> for OtherHandler {
        async fn handle(&self, _job: AddJob, _delivery: &JobDelivery<'_>) -> Result<(), JobError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "OtherHandler"
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = JobRegistry::new()
            .register("add", AddHandler::default())
            .register("other", OtherHandler);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("add"));
        assert!(!registry.contains("missing"));
        assert_eq!(registry.job_types(), ["add", "other"]);
        assert_eq!(registry.handler_name("add"), Some("AddHandler"));
    }

    #[test]
    fn test_register_twice_replaces() {
        let registry = JobRegistry::new()
            .register("add", AddHandler::default())
            .register("add", OtherHandler);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.handler_name("add"), Some("OtherHandler"));
    }

    #[test]
    fn test_prepare_unknown_type() {
        let registry = JobRegistry::new();

        let err = registry.prepare("add", json!({ "amount": 1 })).err().unwrap();
        assert_eq!(err, DeserializationError::UnknownJobType("add".to_string()));
    }

    #[test]
    fn test_prepare_invalid_data() {
        let registry = JobRegistry::new().register("add", AddHandler::default());

        let err = registry
            .prepare("add", json!({ "amount": "lots" }))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DeserializationError::InvalidJobData { ref job_type, .. } if job_type == "add"
        ));
    }

    #[tokio::test]
    async fn test_prepared_job_runs_shared_handler() {
        let handler = Arc::new(AddHandler::default());
        let registry = JobRegistry::new().register_arc("add", Arc::clone(&handler));

        let message = RawMessage::new("m-1", "{}", "rh-1");
        let metadata = JobMetadata::for_type("add");
        let delivery = JobDelivery {
            connection_name: "sqs",
            queue_name: "jobs",
            message: &message,
            metadata: &metadata,
        };

        for amount in [2, 3] {
            let job = registry.prepare("add", json!({ "amount": amount })).unwrap();
            assert_eq!(job.handler_name(), "AddHandler");
            job.run(&delivery).await.unwrap();
        }

        assert_eq!(handler.total.load(Ordering::SeqCst), 5);
    }
}
