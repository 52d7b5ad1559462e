//! Error types for batch decoding, job adaptation, execution and acknowledgement.
//!
//! Only [`MalformedBatchError`] ever escapes an invocation. Everything else is
//! caught per message by the runner and turned into a failed outcome:
//! - **MalformedBatchError**: the event itself is unusable, the whole batch is redelivered
//! - **DeserializationError**: one message body is not a runnable job
//! - **JobError**: the job ran and failed
//! - **AckError**: the job succeeded but its delete call failed

use std::error::Error as StdError;
use std::fmt::{self, Write as _};
use thiserror::Error;

/// The invocation payload does not match the SQS batch schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedBatchError {
    /// The payload is not JSON at all
    #[error("Invalid event JSON: {0}")]
    InvalidJson(String),

    /// The top-level `Records` array is absent or not an array
    #[error("Event has no 'Records' array")]
    MissingRecords,

    /// A record lacks one of the fields every SQS record carries
    #[error("Record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    /// A record field has the wrong shape
    #[error("Record {index} has invalid field '{field}': {details}")]
    InvalidField {
        index: usize,
        field: &'static str,
        details: String,
    },

    /// The record was produced by something other than SQS
    #[error("Record {index} comes from unsupported event source '{event_source}'")]
    UnsupportedEventSource { index: usize, event_source: String },

    /// Two records share a message id
    #[error("Duplicate message id '{0}' in batch")]
    DuplicateMessageId(String),
}

impl From<serde_json::Error> for MalformedBatchError {
    fn from(err: serde_json::Error) -> Self {
        MalformedBatchError::InvalidJson(err.to_string())
    }
}

/// A message body could not be turned into a runnable job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeserializationError {
    /// Body is not a well-formed job payload envelope
    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    /// No handler is registered for the job type
    #[error("Unknown job type '{0}'")]
    UnknownJobType(String),

    /// Payload was written by an incompatible producer
    #[error("Unsupported payload version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The job data does not match the registered job type
    #[error("Invalid data for job '{job_type}': {details}")]
    InvalidJobData { job_type: String, details: String },
}

impl DeserializationError {
    /// Short error type name used in failure details and metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            DeserializationError::InvalidPayload(_) => "InvalidPayload",
            DeserializationError::UnknownJobType(_) => "UnknownJobType",
            DeserializationError::UnsupportedVersion { .. } => "UnsupportedVersion",
            DeserializationError::InvalidJobData { .. } => "InvalidJobData",
        }
    }

    /// The job type named by the payload, when it got that far
    pub fn job_type(&self) -> Option<&str> {
        match self {
            DeserializationError::UnknownJobType(job_type) => Some(job_type),
            DeserializationError::InvalidJobData { job_type, .. } => Some(job_type),
            _ => None,
        }
    }
}

/// Error returned by a job handler.
///
/// Carries no retry category: redelivery is decided by the queue's redrive
/// policy, never by the worker.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job failed while doing its work
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// The job rejected its own input after deserialization
    #[error("invalid job input: {0}")]
    InvalidInput(String),
}

impl JobError {
    /// Create a failure from a message
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a failure wrapping an underlying error
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        JobError::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an input validation failure
    pub fn invalid_input(message: impl Into<String>) -> Self {
        JobError::InvalidInput(message.into())
    }

    /// Short error type name used in failure details and metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            JobError::Failed { .. } => "JobFailed",
            JobError::InvalidInput(_) => "InvalidInput",
        }
    }

    /// Message including the whole source chain
    pub fn detailed_message(&self) -> String {
        error_chain(self)
    }
}

impl From<eyre::Report> for JobError {
    fn from(report: eyre::Report) -> Self {
        let message = report
            .chain()
            .map(|cause| cause.to_string())
            .collect::<Vec<_>>()
            .join(": ");
        JobError::Failed {
            message,
            source: None,
        }
    }
}

/// Deleting a processed message from the queue failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AckError {
    /// The DeleteMessage call itself failed
    #[error("DeleteMessage failed for message '{message_id}': {details}")]
    DeleteFailed { message_id: String, details: String },

    /// No queue URL configured and none derivable from the record
    #[error("Cannot resolve queue URL for message '{message_id}': {details}")]
    QueueUrl { message_id: String, details: String },
}

/// Errors surfaced at the invocation boundary.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The batch could not be decoded; the platform redelivers all of it
    #[error(transparent)]
    MalformedBatch(#[from] MalformedBatchError),

    /// Worker wiring is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Render an error and all of its sources as `outer: inner: root`.
pub(crate) fn error_chain(err: &dyn StdError) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_chain(&mut out, err);
    out
}

fn write_chain(out: &mut String, err: &dyn StdError) -> fmt::Result {
    write!(out, "{err}")?;
    if let Some(source) = err.source() {
        write!(out, ": ")?;
        write_chain(out, source)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_malformed_batch_messages() {
        let err = MalformedBatchError::MissingField {
            index: 2,
            field: "receiptHandle",
        };
        assert_eq!(
            err.to_string(),
            "Record 2 is missing required field 'receiptHandle'"
        );
        assert_eq!(
            MalformedBatchError::DuplicateMessageId("abc".into()).to_string(),
            "Duplicate message id 'abc' in batch"
        );
    }

    #[test]
    fn test_deserialization_error_type_and_job() {
        let err = DeserializationError::InvalidJobData {
            job_type: "send_welcome_email".into(),
            details: "missing field `email`".into(),
        };
        assert_eq!(err.error_type(), "InvalidJobData");
        assert_eq!(err.job_type(), Some("send_welcome_email"));

        let err = DeserializationError::InvalidPayload("expected value".into());
        assert_eq!(err.job_type(), None);
    }

    #[test]
    fn test_job_error_source_chain() {
        let err = JobError::with_source(
            "failed to render template",
            io::Error::new(io::ErrorKind::NotFound, "welcome.html not found"),
        );
        assert_eq!(err.error_type(), "JobFailed");
        assert_eq!(err.to_string(), "failed to render template");
        assert_eq!(
            err.detailed_message(),
            "failed to render template: welcome.html not found"
        );
    }

    #[test]
    fn test_job_error_from_eyre() {
        use eyre::WrapErr;

        let report = Err::<(), _>(io::Error::other("connection reset"))
            .wrap_err("upstream returned 503")
            .unwrap_err();
        let err: JobError = report.into();
        assert_eq!(err.to_string(), "upstream returned 503: connection reset");
        assert_eq!(err.error_type(), "JobFailed");
    }

    #[test]
    fn test_worker_error_is_transparent() {
        let err: WorkerError = MalformedBatchError::MissingRecords.into();
        assert_eq!(err.to_string(), "Event has no 'Records' array");
    }
}
