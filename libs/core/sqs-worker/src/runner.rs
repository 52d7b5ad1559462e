//! Batch runner: drives one SQS batch through the job adapter.
//!
//! Messages are processed sequentially in delivery order. Every message ends
//! with exactly one outcome; a successful message is deleted from the queue
//! before the next one starts, so a later failure in the same batch never
//! causes it to be redelivered.

use crate::ack::Acknowledger;
use crate::adapter::{JobAdapter, JobMetadata};
use crate::config::{AckFailurePolicy, WorkerConfig};
use crate::message::RawMessage;
use crate::metrics::SqsMetrics;
use crate::outcome::{FailureDetail, MessageOutcome, Outcome};
use crate::registry::JobRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info_span, warn, Instrument};

/// Runs batches of raw messages and acknowledges the successful ones.
///
/// # Example
///
/// ```rust,ignore
/// use sqs_worker::{BatchRunner, JobRegistry, SqsAcknowledger, WorkerConfig};
///
/// let registry = JobRegistry::new().register("send_welcome_email", WelcomeEmailHandler::new(mailer));
/// let runner = BatchRunner::new(registry, SqsAcknowledger::new(client), WorkerConfig::new("sqs", "jobs"));
///
/// let outcomes = runner.run(messages).await;
/// ```
pub struct BatchRunner<A> {
    adapter: JobAdapter,
    acknowledger: A,
    config: WorkerConfig,
    metrics: SqsMetrics,
}

impl<A> BatchRunner<A>
where
    A: Acknowledger,
{
    /// Create a new batch runner.
    pub fn new(
        registry: impl Into<Arc<JobRegistry>>,
        acknowledger: A,
        config: WorkerConfig,
    ) -> Self {
        let adapter = JobAdapter::new(
            registry.into(),
            config.connection_name.clone(),
            config.queue_name.clone(),
        );
        let metrics = SqsMetrics::new(config.queue_name.clone());

        Self {
            adapter,
            acknowledger,
            config,
            metrics,
        }
    }

    pub fn adapter(&self) -> &JobAdapter {
        &self.adapter
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process a batch.
    ///
    /// Returns one outcome per input message, in input order. Never fails:
    /// deserialization errors, job errors and panics all become `Failed`.
    pub async fn run(&self, batch: Vec<RawMessage>) -> Vec<MessageOutcome> {
        self.metrics.batch_size(batch.len());

        let mut outcomes = Vec::with_capacity(batch.len());
        let mut blocked_groups: HashSet<String> = HashSet::new();

        for message in &batch {
            let span = info_span!(
                "sqs_message",
                message_id = %message.id,
                receive_count = message.approximate_receive_count
            );

            let outcome = self
                .process_message(message, &blocked_groups)
                .instrument(span)
                .await;

            if self.config.preserve_group_order && !outcome.is_success() {
                if let Some(group_id) = message.message_group_id() {
                    blocked_groups.insert(group_id.to_string());
                }
            }

            outcomes.push(MessageOutcome::new(message.id.clone(), outcome));
        }

        outcomes
    }

    /// Process a single message.
    async fn process_message(
        &self,
        message: &RawMessage,
        blocked_groups: &HashSet<String>,
    ) -> Outcome {
        self.metrics.message_received();

        if message.is_redelivery() {
            debug!(
                receive_count = message.approximate_receive_count,
                "Processing redelivered message"
            );
        }

        if self.config.preserve_group_order {
            if let Some(group_id) = message.message_group_id() {
                if blocked_groups.contains(group_id) {
                    warn!(
                        group_id = %group_id,
                        "Skipping message, an earlier message of its group failed"
                    );
                    return self.failed(FailureDetail::skipped(group_id));
                }
            }
        }

        let context = match self.adapter.adapt(message) {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    error = %e,
                    error_type = e.error_type(),
                    "Failed to deserialize job, leaving message for redelivery"
                );
                return self.failed(FailureDetail::deserialization(&e));
            }
        };

        let metadata = context.metadata.clone();

        debug!(
            job = %metadata.job_type,
            job_uuid = ?metadata.uuid,
            display_name = %metadata.display_name,
            handler = context.handler_name(),
            queue_latency_ms = ?message.queue_latency_ms(),
            "Processing job"
        );

        let start = Instant::now();

        match self.adapter.execute(context).await {
            Outcome::Succeeded => {
                let elapsed = start.elapsed();
                let job_type = metadata.job_type.clone();

                // Counted once the delete outcome is known; a reported ack
                // failure is counted as failed instead.
                let outcome = self.acknowledge(message, metadata).await;
                if outcome.is_success() {
                    self.metrics.job_processed(&job_type, elapsed);
                }
                outcome
            }
            Outcome::Failed(detail) => {
                warn!(
                    job = %metadata.job_type,
                    error = %detail.message,
                    error_type = %detail.error_type,
                    kind = %detail.kind,
                    "Job failed, leaving message for redelivery"
                );
                self.failed(detail)
            }
        }
    }

    /// Delete a successfully processed message.
    async fn acknowledge(&self, message: &RawMessage, metadata: JobMetadata) -> Outcome {
        match self.acknowledger.acknowledge(message).await {
            Ok(()) => {
                debug!(job = %metadata.job_type, "Job succeeded, message acknowledged");
                Outcome::Succeeded
            }
            Err(e) => {
                self.metrics.ack_failed();
                error!(
                    job = %metadata.job_type,
                    error = %e,
                    acknowledger = self.acknowledger.name(),
                    policy = ?self.config.ack_failure_policy,
                    "Failed to delete message after successful job"
                );

                match self.config.ack_failure_policy {
                    AckFailurePolicy::ReportSucceeded => Outcome::Succeeded,
                    AckFailurePolicy::ReportFailed => {
                        self.failed(FailureDetail::acknowledge(&e, Some(metadata)))
                    }
                }
            }
        }
    }

    fn failed(&self, detail: FailureDetail) -> Outcome {
        self.metrics.job_failed(detail.kind);
        Outcome::Failed(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::{FailingAcknowledger, RecordingAcknowledger};
    use crate::adapter::{JobDelivery, JobPayload};
    use crate::error::JobError;
    use crate::message::MESSAGE_GROUP_ID;
    use crate::outcome::FailureKind;
    use crate::registry::JobHandler;
    use async_trait::async_trait;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Serialize, Deserialize)]
    struct Step {
        action: String,
    }

    #[derive(Default)]
    struct StepHandler {
        ran: Mutex<Vec<String>>,
    }

    impl StepHandler {
        fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobHandler<Step> for StepHandler {
        async fn handle(&self, job: Step, delivery: &JobDelivery<'_>) -> Result<(), JobError> {
            self.ran.lock().unwrap().push(delivery.message.id.clone());
            match job.action.as_str() {
                "fail" => Err(JobError::failed("step failed")),
                "panic" => panic!("step exploded"),
                _ => Ok(()),
            }
        }

        fn name(&self) -> &'static str {
            "StepHandler"
        }
    }

    fn step(id: &str, action: &str) -> RawMessage {
        let body = JobPayload::new("step", &Step { action: action.to_string() })
            .unwrap()
            .to_body()
            .unwrap();
        RawMessage::new(id, body, format!("rh-{id}"))
    }

    fn runner<A: Acknowledger>(
        handler: Arc<StepHandler>,
        acknowledger: A,
        config: WorkerConfig,
    ) -> BatchRunner<A> {
        BatchRunner::new(
            JobRegistry::new().register_arc("step", handler),
            acknowledger,
            config,
        )
    }

    fn failed_ids(outcomes: &[MessageOutcome]) -> Vec<&str> {
        outcomes
            .iter()
            .filter(|o| !o.outcome.is_success())
            .map(|o| o.message_id.as_str())
            .collect()
    }

    /// `sqs_worker_jobs_processed_total` values keyed by `status`
    fn processed_by_status(snapshotter: &Snapshotter) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, ..)| key.key().name() == "sqs_worker_jobs_processed_total")
            .filter_map(|(key, _, _, value)| {
                let status = key.key().labels().find(|l| l.key() == "status")?;
                match value {
                    DebugValue::Counter(count) => Some((status.value().to_string(), count)),
                    _ => None,
                }
            })
            .collect();
        counts.sort();
        counts
    }

    #[tokio::test]
    async fn test_all_succeed_acks_in_order() {
        let handler = Arc::new(StepHandler::default());
        let acker = RecordingAcknowledger::new();
        let runner = runner(Arc::clone(&handler), acker.clone(), WorkerConfig::default());

        let outcomes = runner
            .run(vec![step("1", "ok"), step("2", "ok"), step("3", "ok")])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(failed_ids(&outcomes).is_empty());
        assert_eq!(acker.acknowledged_ids(), ["1", "2", "3"]);
        assert_eq!(acker.receipt_handles(), ["rh-1", "rh-2", "rh-3"]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_batch() {
        let handler = Arc::new(StepHandler::default());
        let acker = RecordingAcknowledger::new();
        let runner = runner(Arc::clone(&handler), acker.clone(), WorkerConfig::default());

        let outcomes = runner
            .run(vec![
                step("1", "fail"),
                step("2", "ok"),
                step("3", "panic"),
                step("4", "ok"),
            ])
            .await;

        assert_eq!(failed_ids(&outcomes), ["1", "3"]);
        assert_eq!(acker.acknowledged_ids(), ["2", "4"]);
        assert_eq!(handler.ran(), ["1", "2", "3", "4"]);
        assert_eq!(
            outcomes[2].outcome.failure().map(|f| f.kind),
            Some(FailureKind::Panic)
        );
    }

    #[tokio::test]
    async fn test_corrupted_body_never_runs_job() {
        let handler = Arc::new(StepHandler::default());
        let acker = RecordingAcknowledger::new();
        let runner = runner(Arc::clone(&handler), acker.clone(), WorkerConfig::default());

        let outcomes = runner
            .run(vec![RawMessage::new("1", "{corrupted", "rh-1")])
            .await;

        let failure = outcomes[0].outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Deserialization);
        assert_eq!(failure.error_type, "InvalidPayload");
        assert!(handler.ran().is_empty());
        assert_eq!(acker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let acker = RecordingAcknowledger::new();
        let runner = runner(
            Arc::new(StepHandler::default()),
            acker.clone(),
            WorkerConfig::default(),
        );

        assert!(runner.run(Vec::new()).await.is_empty());
        assert_eq!(acker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ack_failure_reported_as_succeeded_by_default() {
        let acker = FailingAcknowledger::for_messages(["1"], "throttled");
        let runner = runner(
            Arc::new(StepHandler::default()),
            acker.clone(),
            WorkerConfig::default(),
        );

        let outcomes = runner.run(vec![step("1", "ok"), step("2", "ok")]).await;

        assert!(failed_ids(&outcomes).is_empty());
        assert_eq!(acker.attempted_ids(), ["1", "2"]);
    }

    #[tokio::test]
    async fn test_ack_failure_reported_as_failed_when_configured() {
        let acker = FailingAcknowledger::for_messages(["1"], "throttled");
        let config =
            WorkerConfig::default().with_ack_failure_policy(AckFailurePolicy::ReportFailed);
        let runner = runner(Arc::new(StepHandler::default()), acker, config);

        let outcomes = runner.run(vec![step("1", "ok"), step("2", "ok")]).await;

        assert_eq!(failed_ids(&outcomes), ["1"]);
        let failure = outcomes[0].outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Acknowledge);
        assert_eq!(failure.job.as_ref().map(|j| j.job_type.as_str()), Some("step"));
    }

    #[test]
    fn test_reported_ack_failure_counted_once() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let acker = FailingAcknowledger::for_messages(["1"], "throttled");
        let config =
            WorkerConfig::default().with_ack_failure_policy(AckFailurePolicy::ReportFailed);
        let runner = runner(Arc::new(StepHandler::default()), acker, config);

        ::metrics::with_local_recorder(&recorder, || {
            futures::executor::block_on(runner.run(vec![step("1", "ok"), step("2", "ok")]))
        });

        assert_eq!(
            processed_by_status(&snapshotter),
            [("failed".to_string(), 1), ("success".to_string(), 1)]
        );
    }

    #[test]
    fn test_unreported_ack_failure_counted_as_success() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let acker = FailingAcknowledger::for_messages(["1"], "throttled");
        let runner = runner(Arc::new(StepHandler::default()), acker, WorkerConfig::default());

        ::metrics::with_local_recorder(&recorder, || {
            futures::executor::block_on(runner.run(vec![step("1", "ok"), step("2", "ok")]))
        });

        assert_eq!(processed_by_status(&snapshotter), [("success".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_group_order_skips_later_group_messages() {
        let handler = Arc::new(StepHandler::default());
        let acker = RecordingAcknowledger::new();
        let config = WorkerConfig::new("sqs", "orders.fifo").with_preserve_group_order(true);
        let runner = runner(Arc::clone(&handler), acker.clone(), config);

        let outcomes = runner
            .run(vec![
                step("1", "fail").with_attribute(MESSAGE_GROUP_ID, "a"),
                step("2", "ok").with_attribute(MESSAGE_GROUP_ID, "b"),
                step("3", "ok").with_attribute(MESSAGE_GROUP_ID, "a"),
            ])
            .await;

        assert_eq!(failed_ids(&outcomes), ["1", "3"]);
        assert_eq!(
            outcomes[2].outcome.failure().map(|f| f.kind),
            Some(FailureKind::Skipped)
        );
        assert_eq!(handler.ran(), ["1", "2"]);
        assert_eq!(acker.acknowledged_ids(), ["2"]);
    }

    #[tokio::test]
    async fn test_group_order_off_runs_every_message() {
        let handler = Arc::new(StepHandler::default());
        let runner = runner(
            Arc::clone(&handler),
            RecordingAcknowledger::new(),
            WorkerConfig::default(),
        );

        let outcomes = runner
            .run(vec![
                step("1", "fail").with_attribute(MESSAGE_GROUP_ID, "a"),
                step("2", "ok").with_attribute(MESSAGE_GROUP_ID, "a"),
            ])
            .await;

        assert_eq!(failed_ids(&outcomes), ["1"]);
        assert_eq!(handler.ran(), ["1", "2"]);
    }
}
