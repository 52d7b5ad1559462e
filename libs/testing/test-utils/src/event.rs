//! Lambda SQS event builder
//!
//! Produces the JSON Lambda hands to a function bound to an SQS event source
//! mapping. Timestamps are fixed so events are reproducible.

use serde_json::{json, Map, Value};

/// Queue ARN used when none is given
pub const DEFAULT_QUEUE_ARN: &str = "arn:aws:sqs:us-east-1:000000000000:test-queue";

/// `SentTimestamp` attribute stamped on every built record (2024-01-01T00:00:00Z)
pub const SENT_TIMESTAMP_MS: i64 = 1_704_067_200_000;

/// Builder for `{"Records": [...]}` events
///
/// # Example
///
/// ```
/// use test_utils::SqsEventBuilder;
///
/// let event = SqsEventBuilder::for_queue("arn:aws:sqs:eu-west-1:123456789012:orders.fifo")
///     .fifo_message("m-1", "{}", "customer-1")
///     .build();
///
/// assert_eq!(event["Records"][0]["attributes"]["MessageGroupId"], "customer-1");
/// ```
#[derive(Debug, Clone)]
pub struct SqsEventBuilder {
    queue_arn: String,
    records: Vec<Value>,
}

impl Default for SqsEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SqsEventBuilder {
    /// Create a builder for the default test queue
    pub fn new() -> Self {
        Self::for_queue(DEFAULT_QUEUE_ARN)
    }

    /// Create a builder for a specific queue ARN
    pub fn for_queue(queue_arn: impl Into<String>) -> Self {
        Self {
            queue_arn: queue_arn.into(),
            records: Vec::new(),
        }
    }

    /// Add a first-delivery message; the receipt handle is derived from the id
    pub fn message(self, id: &str, body: &str) -> Self {
        let receipt = format!("receipt-{id}");
        self.push(id, body, &receipt, 1, None)
    }

    /// Add a message with an explicit receipt handle
    pub fn message_with_receipt(self, id: &str, body: &str, receipt_handle: &str) -> Self {
        self.push(id, body, receipt_handle, 1, None)
    }

    /// Add a message that SQS has delivered `receive_count` times
    pub fn redelivered_message(self, id: &str, body: &str, receive_count: u32) -> Self {
        let receipt = format!("receipt-{id}");
        self.push(id, body, &receipt, receive_count, None)
    }

    /// Add a FIFO message belonging to `group_id`
    pub fn fifo_message(self, id: &str, body: &str, group_id: &str) -> Self {
        let receipt = format!("receipt-{id}");
        self.push(id, body, &receipt, 1, Some(group_id))
    }

    /// Add a record as-is (for malformed input)
    pub fn raw_record(mut self, record: Value) -> Self {
        self.records.push(record);
        self
    }

    /// Number of records added so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build the event JSON
    pub fn build(self) -> Value {
        json!({ "Records": self.records })
    }

    /// Build the event as raw bytes
    pub fn build_bytes(self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }

    fn push(
        mut self,
        id: &str,
        body: &str,
        receipt_handle: &str,
        receive_count: u32,
        group_id: Option<&str>,
    ) -> Self {
        let mut attributes = Map::new();
        attributes.insert(
            "ApproximateReceiveCount".to_string(),
            Value::String(receive_count.to_string()),
        );
        attributes.insert(
            "SentTimestamp".to_string(),
            Value::String(SENT_TIMESTAMP_MS.to_string()),
        );
        attributes.insert(
            "SenderId".to_string(),
            Value::String("AIDAIENQZJOLO23YVJ4VO".to_string()),
        );
        attributes.insert(
            "ApproximateFirstReceiveTimestamp".to_string(),
            Value::String((SENT_TIMESTAMP_MS + 50).to_string()),
        );
        if let Some(group_id) = group_id {
            attributes.insert(
                "MessageGroupId".to_string(),
                Value::String(group_id.to_string()),
            );
            attributes.insert(
                "MessageDeduplicationId".to_string(),
                Value::String(id.to_string()),
            );
        }

        let record = json!({
            "messageId": id,
            "receiptHandle": receipt_handle,
            "body": body,
            "attributes": attributes,
            "messageAttributes": {},
            "eventSource": "aws:sqs",
            "eventSourceARN": self.queue_arn,
            "awsRegion": region_of(&self.queue_arn),
        });

        self.records.push(record);
        self
    }
}

fn region_of(arn: &str) -> &str {
    arn.split(':').nth(3).unwrap_or("us-east-1")
}
