//! Partial batch response returned to Lambda.
//!
//! With `ReportBatchItemFailures` enabled on the event source mapping, Lambda
//! only makes the listed messages visible again. Listing nothing means the
//! whole batch succeeded.

use crate::outcome::MessageOutcome;

pub use aws_lambda_events::sqs::BatchItemFailure;

/// Invocation response: `{"batchItemFailures":[{"itemIdentifier":"..."}]}`
pub type BatchResponse = aws_lambda_events::sqs::SqsBatchResponse;

/// Read helpers for [`BatchResponse`]
pub trait BatchResponseExt {
    /// Ids of the failed messages, in order
    fn failed_ids(&self) -> Vec<&str>;

    fn is_full_success(&self) -> bool;
}

impl BatchResponseExt for BatchResponse {
    fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }

    fn is_full_success(&self) -> bool {
        self.batch_item_failures.is_empty()
    }
}

/// Build the response from the runner's outcomes.
pub fn report(outcomes: &[MessageOutcome]) -> BatchResponse {
    let batch_item_failures = outcomes
        .iter()
        .filter(|o| !o.outcome.is_success())
        .map(|o| BatchItemFailure {
            item_identifier: o.message_id.clone(),
        })
        .collect();

    BatchResponse {
        batch_item_failures,
    }
}

/// Counts for the end-of-invocation log line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[MessageOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.outcome.is_success()).count();

        Self {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}
