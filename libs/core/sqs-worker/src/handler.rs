//! Invocation entry point: decode, run, report.

use crate::ack::Acknowledger;
use crate::decoder::{decode, decode_value};
use crate::error::{MalformedBatchError, WorkerError};
use crate::message::RawMessage;
use crate::report::{report, BatchResponse, BatchSummary};
use crate::runner::BatchRunner;
use serde_json::Value;
use tracing::{error, info};

/// Handles one Lambda invocation carrying an SQS batch.
///
/// A malformed event fails the whole invocation so Lambda redelivers the
/// batch untouched. Anything that goes wrong with an individual message ends
/// up in the returned `batchItemFailures` instead.
pub struct SqsHandler<A> {
    runner: BatchRunner<A>,
}

impl<A> SqsHandler<A>
where
    A: Acknowledger,
{
    /// Create a handler, validating the runner's configuration
    pub fn new(runner: BatchRunner<A>) -> Result<Self, WorkerError> {
        runner.config().validate()?;
        Ok(Self { runner })
    }

    pub fn runner(&self) -> &BatchRunner<A> {
        &self.runner
    }

    /// Handle an already parsed event
    pub async fn handle(&self, event: &Value) -> Result<BatchResponse, WorkerError> {
        let batch = decode_value(event).map_err(|e| self.malformed(e))?;
        Ok(self.handle_batch(batch).await)
    }

    /// Handle a raw event payload
    pub async fn handle_bytes(&self, payload: &[u8]) -> Result<BatchResponse, WorkerError> {
        let batch = decode(payload).map_err(|e| self.malformed(e))?;
        Ok(self.handle_batch(batch).await)
    }

    async fn handle_batch(&self, batch: Vec<RawMessage>) -> BatchResponse {
        let config = self.runner.config();

        info!(
            connection = %config.connection_name,
            queue = %config.queue_name,
            batch_size = batch.len(),
            "Processing SQS batch"
        );

        let outcomes = self.runner.run(batch).await;
        let summary = BatchSummary::from_outcomes(&outcomes);
        let response = report(&outcomes);

        info!(
            queue = %config.queue_name,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "SQS batch processed"
        );

        response
    }

    fn malformed(&self, e: MalformedBatchError) -> WorkerError {
        error!(
            queue = %self.runner.config().queue_name,
            error = %e,
            "Malformed SQS event, failing the invocation"
        );
        WorkerError::MalformedBatch(e)
    }
}
