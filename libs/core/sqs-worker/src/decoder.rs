//! Decodes the SQS Lambda event into raw messages.
//!
//! Pure transformation: no I/O, delivery order preserved, and the same input
//! always yields the same sequence.

use crate::error::MalformedBatchError;
use crate::message::{RawMessage, APPROXIMATE_RECEIVE_COUNT};
use aws_lambda_events::sqs::SqsMessage;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// `eventSource` value carried by SQS records
pub const SQS_EVENT_SOURCE: &str = "aws:sqs";

/// Decode a raw event payload.
pub fn decode(payload: &[u8]) -> Result<Vec<RawMessage>, MalformedBatchError> {
    let event: Value = serde_json::from_slice(payload)?;
    decode_value(&event)
}

/// Decode an already parsed event.
///
/// Records are read one at a time as [`SqsMessage`] so a shape error can name
/// the offending record.
pub fn decode_value(event: &Value) -> Result<Vec<RawMessage>, MalformedBatchError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or(MalformedBatchError::MissingRecords)?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut messages = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let record = SqsMessage::deserialize(record).map_err(|e| {
            MalformedBatchError::InvalidField {
                index,
                field: "record",
                details: e.to_string(),
            }
        })?;

        let message = into_raw_message(index, record)?;
        if !seen.insert(message.id.clone()) {
            return Err(MalformedBatchError::DuplicateMessageId(message.id));
        }
        messages.push(message);
    }

    Ok(messages)
}

fn into_raw_message(index: usize, record: SqsMessage) -> Result<RawMessage, MalformedBatchError> {
    if let Some(source) = record.event_source {
        if source != SQS_EVENT_SOURCE {
            return Err(MalformedBatchError::UnsupportedEventSource {
                index,
                event_source: source,
            });
        }
    }

    let missing = |field| MalformedBatchError::MissingField { index, field };
    let id = record.message_id.ok_or_else(|| missing("messageId"))?;
    let receipt_handle = record.receipt_handle.ok_or_else(|| missing("receiptHandle"))?;
    let body = record.body.ok_or_else(|| missing("body"))?;

    let approximate_receive_count = match record.attributes.get(APPROXIMATE_RECEIVE_COUNT) {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|e| MalformedBatchError::InvalidField {
                index,
                field: "attributes.ApproximateReceiveCount",
                details: format!("'{raw}' is not a receive count: {e}"),
            })?,
        None => 1,
    };

    Ok(RawMessage {
        id,
        body,
        receipt_handle,
        attributes: record.attributes,
        message_attributes: record.message_attributes,
        approximate_receive_count,
        event_source_arn: record.event_source_arn,
    })
}
