//! Acknowledgement (delete) of processed messages.
//!
//! The runner deletes every successful message right after its job returns,
//! so a later failure in the same batch never causes it to be redelivered.

use crate::error::{error_chain, AckError};
use crate::message::RawMessage;
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use futures::FutureExt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Deletes a message from its queue.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Delete the message identified by its receipt handle.
    async fn acknowledge(&self, message: &RawMessage) -> Result<(), AckError>;

    /// Get the acknowledger name for logging.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<A: Acknowledger + ?Sized> Acknowledger for Arc<A> {
    async fn acknowledge(&self, message: &RawMessage) -> Result<(), AckError> {
        (**self).acknowledge(message).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Derive a queue URL from an SQS queue ARN.
///
/// `arn:aws:sqs:eu-west-1:123456789012:jobs` becomes
/// `https://sqs.eu-west-1.amazonaws.com/123456789012/jobs`.
pub fn queue_url_from_arn(arn: &str) -> Option<String> {
    let mut parts = arn.splitn(6, ':');
    let (Some("arn"), Some(partition), Some("sqs"), Some(region), Some(account), Some(name)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };

    if region.is_empty() || account.is_empty() || name.is_empty() {
        return None;
    }

    let domain = match partition {
        "aws-cn" => "amazonaws.com.cn",
        _ => "amazonaws.com",
    };

    Some(format!("https://sqs.{region}.{domain}/{account}/{name}"))
}

/// Deletes messages through the SQS `DeleteMessage` API.
#[derive(Debug, Clone)]
pub struct SqsAcknowledger {
    client: Client,
    queue_url: Option<String>,
}

impl SqsAcknowledger {
    /// Create an acknowledger that derives queue URLs from each record's source ARN
    pub fn new(client: Client) -> Self {
        Self {
            client,
            queue_url: None,
        }
    }

    /// Use a fixed queue URL instead of deriving it from the record
    pub fn with_queue_url(mut self, queue_url: Option<String>) -> Self {
        self.queue_url = queue_url;
        self
    }

    fn queue_url_for(&self, message: &RawMessage) -> Result<String, AckError> {
        if let Some(url) = &self.queue_url {
            return Ok(url.clone());
        }

        let arn = message
            .event_source_arn
            .as_deref()
            .ok_or_else(|| AckError::QueueUrl {
                message_id: message.id.clone(),
                details: "no queue URL configured and record has no eventSourceARN".to_string(),
            })?;

        queue_url_from_arn(arn).ok_or_else(|| AckError::QueueUrl {
            message_id: message.id.clone(),
            details: format!("'{arn}' is not an SQS queue ARN"),
        })
    }
}

#[async_trait]
impl Acknowledger for SqsAcknowledger {
    async fn acknowledge(&self, message: &RawMessage) -> Result<(), AckError> {
        let queue_url = self.queue_url_for(message)?;

        self.client
            .delete_message()
            .queue_url(&queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            // The send future is several KB; box it to keep the runner's future small.
            .boxed()
            .await
            .map_err(|e| AckError::DeleteFailed {
                message_id: message.id.clone(),
                details: error_chain(&e),
            })?;

        debug!(message_id = %message.id, queue_url = %queue_url, "Deleted message");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqs"
    }
}

/// An acknowledger that does nothing (for testing and dry runs).
#[derive(Debug, Clone, Default)]
pub struct NoOpAcknowledger;

#[async_trait]
impl Acknowledger for NoOpAcknowledger {
    async fn acknowledge(&self, _message: &RawMessage) -> Result<(), AckError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// An acknowledger that records every call in order (for testing).
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingAcknowledger {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingAcknowledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message ids acknowledged so far, in call order
    pub fn acknowledged_ids(&self) -> Vec<String> {
        self.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    /// Receipt handles acknowledged so far, in call order
    pub fn receipt_handles(&self) -> Vec<String> {
        self.lock().iter().map(|(_, handle)| handle.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Acknowledger for RecordingAcknowledger {
    async fn acknowledge(&self, message: &RawMessage) -> Result<(), AckError> {
        self.lock()
            .push((message.id.clone(), message.receipt_handle.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// An acknowledger that fails for selected messages (for testing).
///
/// Failed and successful calls are both recorded.
#[derive(Debug, Clone)]
pub struct FailingAcknowledger {
    failing_ids: Option<Vec<String>>,
    error_message: String,
    attempts: RecordingAcknowledger,
}

impl FailingAcknowledger {
    /// Fail every acknowledgement
    pub fn always(message: impl Into<String>) -> Self {
        Self {
            failing_ids: None,
            error_message: message.into(),
            attempts: RecordingAcknowledger::new(),
        }
    }

    /// Fail only for the given message ids
    pub fn for_messages<I, S>(ids: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing_ids: Some(ids.into_iter().map(Into::into).collect()),
            error_message: message.into(),
            attempts: RecordingAcknowledger::new(),
        }
    }

    /// Message ids of every acknowledge attempt, failed or not
    pub fn attempted_ids(&self) -> Vec<String> {
        self.attempts.acknowledged_ids()
    }

    fn should_fail(&self, message_id: &str) -> bool {
        match &self.failing_ids {
            None => true,
            Some(ids) => ids.iter().any(|id| id == message_id),
        }
    }
}

#[async_trait]
impl Acknowledger for FailingAcknowledger {
    async fn acknowledge(&self, message: &RawMessage) -> Result<(), AckError> {
        self.attempts.acknowledge(message).await?;

        if self.should_fail(&message.id) {
            return Err(AckError::DeleteFailed {
                message_id: message.id.clone(),
                details: self.error_message.clone(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_url_from_arn() {
        assert_eq!(
            queue_url_from_arn("arn:aws:sqs:eu-west-1:123456789012:jobs").as_deref(),
            Some("https://sqs.eu-west-1.amazonaws.com/123456789012/jobs")
        );
        assert_eq!(
            queue_url_from_arn("arn:aws:sqs:us-east-1:123456789012:orders.fifo").as_deref(),
            Some("https://sqs.us-east-1.amazonaws.com/123456789012/orders.fifo")
        );
        assert_eq!(
            queue_url_from_arn("arn:aws-cn:sqs:cn-north-1:123456789012:jobs").as_deref(),
            Some("https://sqs.cn-north-1.amazonaws.com.cn/123456789012/jobs")
        );
    }

    #[test]
    fn test_queue_url_from_invalid_arn() {
        assert_eq!(queue_url_from_arn("arn:aws:sns:eu-west-1:123456789012:topic"), None);
        assert_eq!(queue_url_from_arn("arn:aws:sqs:eu-west-1:123456789012"), None);
        assert_eq!(queue_url_from_arn("arn:aws:sqs::123456789012:jobs"), None);
        assert_eq!(queue_url_from_arn("jobs"), None);
    }

    fn offline_client() -> Client {
        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(aws_sdk_sqs::config::BehaviorVersion::latest())
            .region(aws_sdk_sqs::config::Region::new("us-east-1"))
            .build();
        Client::from_conf(config)
    }

    #[test]
    fn test_queue_url_for_record() {
        let acknowledger = SqsAcknowledger::new(offline_client());
        let message = RawMessage::new("m-1", "{}", "rh-1")
            .with_event_source_arn("arn:aws:sqs:eu-west-1:123456789012:jobs");

        assert_eq!(
            acknowledger.queue_url_for(&message).unwrap(),
            "https://sqs.eu-west-1.amazonaws.com/123456789012/jobs"
        );

        let fixed =
            acknowledger.with_queue_url(Some("http://localhost:4566/000000000000/jobs".into()));
        assert_eq!(
            fixed.queue_url_for(&RawMessage::new("m-2", "{}", "rh-2")).unwrap(),
            "http://localhost:4566/000000000000/jobs"
        );
    }

    #[test]
    fn test_queue_url_for_record_without_usable_arn() {
        let acknowledger = SqsAcknowledger::new(offline_client());

        let err = acknowledger
            .queue_url_for(&RawMessage::new("m-1", "{}", "rh-1"))
            .unwrap_err();
        assert!(matches!(err, AckError::QueueUrl { ref message_id, .. } if message_id == "m-1"));

        let foreign = RawMessage::new("m-2", "{}", "rh-2")
            .with_event_source_arn("arn:aws:sns:eu-west-1:123456789012:topic");
        let err = acknowledger.queue_url_for(&foreign).unwrap_err();
        assert!(matches!(
            err,
            AckError::QueueUrl { ref details, .. } if details.contains("is not an SQS queue ARN")
        ));
    }

    #[tokio::test]
    async fn test_recording_acknowledger_shares_state() {
        let recorder = RecordingAcknowledger::new();
        let clone = recorder.clone();

        clone.acknowledge(&RawMessage::new("a", "{}", "rh-a")).await.unwrap();
        clone.acknowledge(&RawMessage::new("b", "{}", "rh-b")).await.unwrap();

        assert_eq!(recorder.acknowledged_ids(), ["a", "b"]);
        assert_eq!(recorder.receipt_handles(), ["rh-a", "rh-b"]);
        assert_eq!(recorder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_acknowledger_selected_ids() {
        let acker = FailingAcknowledger::for_messages(["b"], "throttled");

        assert!(acker.acknowledge(&RawMessage::new("a", "{}", "rh-a")).await.is_ok());
        let err = acker
            .acknowledge(&RawMessage::new("b", "{}", "rh-b"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AckError::DeleteFailed {
                message_id: "b".to_string(),
                details: "throttled".to_string()
            }
        );
        assert_eq!(acker.attempted_ids(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_arc_acknowledger_delegates() {
        let recorder = RecordingAcknowledger::new();
        let shared: Arc<dyn Acknowledger> = Arc::new(recorder.clone());

        shared.acknowledge(&RawMessage::new("a", "{}", "rh-a")).await.unwrap();

        assert_eq!(shared.name(), "recording");
        assert_eq!(recorder.acknowledged_ids(), ["a"]);
    }
}
