//! Metrics for the SQS batch runner
//!
//! Emitted through the `metrics` facade. Whatever recorder the host process
//! installs receives them; without one they are no-ops.

use crate::outcome::FailureKind;
use metrics::{counter, histogram};
use std::time::Duration;

/// Batch runner metrics helper
#[derive(Debug, Clone)]
pub struct SqsMetrics {
    /// Queue name for labeling
    queue_name: String,
}

impl SqsMetrics {
    /// Create new SqsMetrics
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Record a message being received
    pub fn message_received(&self) {
        counter!(
            "sqs_worker_messages_received_total",
            "queue" => self.queue_name.clone()
        )
        .increment(1);
    }

    /// Record the number of messages in a batch
    pub fn batch_size(&self, size: usize) {
        histogram!(
            "sqs_worker_batch_size",
            "queue" => self.queue_name.clone()
        )
        .record(size as f64);
    }

    /// Record a job finishing successfully
    pub fn job_processed(&self, job_type: &str, duration: Duration) {
        counter!(
            "sqs_worker_jobs_processed_total",
            "queue" => self.queue_name.clone(),
            "job" => job_type.to_string(),
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "sqs_worker_job_duration_seconds",
            "queue" => self.queue_name.clone(),
            "job" => job_type.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a message failing
    pub fn job_failed(&self, kind: FailureKind) {
        counter!(
            "sqs_worker_jobs_processed_total",
            "queue" => self.queue_name.clone(),
            "status" => "failed"
        )
        .increment(1);

        counter!(
            "sqs_worker_job_errors_total",
            "queue" => self.queue_name.clone(),
            "kind" => kind.as_str()
        )
        .increment(1);
    }

    /// Record a delete call failing after a successful job
    pub fn ack_failed(&self) {
        counter!(
            "sqs_worker_ack_failures_total",
            "queue" => self.queue_name.clone()
        )
        .increment(1);
    }
}
