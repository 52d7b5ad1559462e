//! Worker configuration
//!
//! This module provides `WorkerConfig` for configuring the batch runner.

use crate::error::WorkerError;

/// How to report a message whose job succeeded but whose delete call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckFailurePolicy {
    /// Report it as succeeded. The failed delete is logged; SQS may redeliver
    /// the message once its visibility timeout expires.
    #[default]
    ReportSucceeded,
    /// Report it as failed so the platform redelivers it deterministically.
    /// Jobs must then tolerate running twice.
    ReportFailed,
}

/// Configuration for the batch runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Job-system connection name the messages belong to
    pub connection_name: String,

    /// Logical queue name the function is bound to
    pub queue_name: String,

    /// Reporting policy for failed deletes
    pub ack_failure_policy: AckFailurePolicy,

    /// Skip later messages of a FIFO group after one of them failed
    pub preserve_group_order: bool,
}

impl WorkerConfig {
    /// Create a new WorkerConfig with explicit values
    pub fn new(connection_name: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            queue_name: queue_name.into(),
            ack_failure_policy: AckFailurePolicy::default(),
            preserve_group_order: false,
        }
    }

    /// Set the ack failure policy
    pub fn with_ack_failure_policy(mut self, policy: AckFailurePolicy) -> Self {
        self.ack_failure_policy = policy;
        self
    }

    /// Enable or disable FIFO group ordering
    pub fn with_preserve_group_order(mut self, enable: bool) -> Self {
        self.preserve_group_order = enable;
        self
    }

    /// Check the names are usable
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.connection_name.trim().is_empty() {
            return Err(WorkerError::Config("connection name is empty".to_string()));
        }
        if self.queue_name.trim().is_empty() {
            return Err(WorkerError::Config("queue name is empty".to_string()));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("sqs", "default")
    }
}
