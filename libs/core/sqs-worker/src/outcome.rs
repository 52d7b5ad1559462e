//! Per-message outcomes produced by the batch runner.

use crate::adapter::JobMetadata;
use crate::error::{AckError, DeserializationError, JobError};
use std::fmt;

/// Why a message failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Body could not be turned into a job; the job never ran
    Deserialization,
    /// The job ran and returned an error
    Execution,
    /// The job panicked
    Panic,
    /// Not run because an earlier message of the same FIFO group failed
    Skipped,
    /// The job succeeded but deleting the message failed
    Acknowledge,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Deserialization => "deserialization",
            FailureKind::Execution => "execution",
            FailureKind::Panic => "panic",
            FailureKind::Skipped => "skipped",
            FailureKind::Acknowledge => "acknowledge",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong with a failed message, kept for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub kind: FailureKind,
    /// Short error type name (`UnknownJobType`, `JobFailed`, ...)
    pub error_type: String,
    pub message: String,
    /// Identifying metadata of the job, when the payload got far enough to have one
    pub job: Option<JobMetadata>,
}

impl FailureDetail {
    pub fn deserialization(error: &DeserializationError) -> Self {
        Self {
            kind: FailureKind::Deserialization,
            error_type: error.error_type().to_string(),
            message: error.to_string(),
            job: error.job_type().map(JobMetadata::for_type),
        }
    }

    pub fn execution(error: &JobError, job: JobMetadata) -> Self {
        Self {
            kind: FailureKind::Execution,
            error_type: error.error_type().to_string(),
            message: error.detailed_message(),
            job: Some(job),
        }
    }

    pub fn panic(message: impl Into<String>, job: JobMetadata) -> Self {
        Self {
            kind: FailureKind::Panic,
            error_type: "Panic".to_string(),
            message: message.into(),
            job: Some(job),
        }
    }

    pub fn skipped(group_id: &str) -> Self {
        Self {
            kind: FailureKind::Skipped,
            error_type: "GroupBlocked".to_string(),
            message: format!("an earlier message of group '{group_id}' failed in this batch"),
            job: None,
        }
    }

    pub fn acknowledge(error: &AckError, job: Option<JobMetadata>) -> Self {
        Self {
            kind: FailureKind::Acknowledge,
            error_type: "AckError".to_string(),
            message: error.to_string(),
            job,
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.error_type, self.kind, self.message)
    }
}

/// Result of processing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(FailureDetail),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    pub fn failure(&self) -> Option<&FailureDetail> {
        match self {
            Outcome::Succeeded => None,
            Outcome::Failed(detail) => Some(detail),
        }
    }
}

/// Outcome bound to the message it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOutcome {
    pub message_id: String,
    pub outcome: Outcome,
}

impl MessageOutcome {
    pub fn new(message_id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            message_id: message_id.into(),
            outcome,
        }
    }
}
