//! Raw SQS message as delivered inside a Lambda batch.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub use aws_lambda_events::sqs::SqsMessageAttribute;

/// System attribute holding the delivery count
pub const APPROXIMATE_RECEIVE_COUNT: &str = "ApproximateReceiveCount";

/// System attribute holding the FIFO message group
pub const MESSAGE_GROUP_ID: &str = "MessageGroupId";

/// System attribute holding the send time in epoch milliseconds
pub const SENT_TIMESTAMP: &str = "SentTimestamp";

/// One message of a batch, immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// SQS message id, unique within the batch
    pub id: String,

    /// Message body, the serialized job payload
    pub body: String,

    /// Token required to delete the message
    pub receipt_handle: String,

    /// SQS system attributes (`ApproximateReceiveCount`, `SentTimestamp`, ...)
    pub attributes: HashMap<String, String>,

    /// User-defined message attributes
    pub message_attributes: HashMap<String, SqsMessageAttribute>,

    /// Number of times this message has been delivered, including this one
    pub approximate_receive_count: u32,

    /// ARN of the queue the message came from
    pub event_source_arn: Option<String>,
}

impl RawMessage {
    /// Create a message with no attributes and a receive count of 1
    pub fn new(
        id: impl Into<String>,
        body: impl Into<String>,
        receipt_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            receipt_handle: receipt_handle.into(),
            attributes: HashMap::new(),
            message_attributes: HashMap::new(),
            approximate_receive_count: 1,
            event_source_arn: None,
        }
    }

    /// Set the receive count
    pub fn with_receive_count(mut self, count: u32) -> Self {
        self.approximate_receive_count = count;
        self
    }

    /// Set a system attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the source queue ARN
    pub fn with_event_source_arn(mut self, arn: impl Into<String>) -> Self {
        self.event_source_arn = Some(arn.into());
        self
    }

    /// FIFO message group, if the message came from a FIFO queue
    pub fn message_group_id(&self) -> Option<&str> {
        self.attributes.get(MESSAGE_GROUP_ID).map(String::as_str)
    }

    /// Check if this is a redelivery
    pub fn is_redelivery(&self) -> bool {
        self.approximate_receive_count > 1
    }

    /// String value of a user-defined message attribute
    pub fn message_attribute(&self, name: &str) -> Option<&str> {
        self.message_attributes
            .get(name)
            .and_then(|attr| attr.string_value.as_deref())
    }

    /// When the message was sent, parsed from `SentTimestamp`
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.attributes
            .get(SENT_TIMESTAMP)
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Time the message spent in the queue before this delivery, in milliseconds
    pub fn queue_latency_ms(&self) -> Option<i64> {
        self.sent_at()
            .map(|sent| (Utc::now() - sent).num_milliseconds())
    }
}
