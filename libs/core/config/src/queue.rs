use crate::{env_optional, env_or_default, env_parse_or, env_required, ConfigError, FromEnv};

/// Connection name used when `QUEUE_CONNECTION` is not set
pub const DEFAULT_CONNECTION: &str = "sqs";

/// Queue binding for the function.
///
/// Loaded once at cold start and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Job-system connection profile used to interpret message bodies
    pub connection_name: String,
    /// Logical queue name the function is bound to
    pub queue_name: String,
    /// Explicit queue URL for deletes; derived from the event source ARN when absent
    pub queue_url: Option<String>,
    /// Report messages whose delete call failed as failed instead of succeeded
    pub report_ack_failures: bool,
    /// Skip later messages of a FIFO message group once one of them failed
    pub preserve_group_order: bool,
}

impl QueueConfig {
    pub fn new(connection_name: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            queue_name: queue_name.into(),
            queue_url: None,
            report_ack_failures: false,
            preserve_group_order: false,
        }
    }
}

impl FromEnv for QueueConfig {
    /// Reads:
    /// - QUEUE_CONNECTION: defaults to "sqs"
    /// - SQS_QUEUE: required
    /// - SQS_QUEUE_URL: optional
    /// - SQS_REPORT_ACK_FAILURES: defaults to false
    /// - SQS_PRESERVE_GROUP_ORDER: defaults to false
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            connection_name: env_or_default("QUEUE_CONNECTION", DEFAULT_CONNECTION),
            queue_name: env_required("SQS_QUEUE")?,
            queue_url: env_optional("SQS_QUEUE_URL"),
            report_ack_failures: env_parse_or("SQS_REPORT_ACK_FAILURES", false)?,
            preserve_group_order: env_parse_or("SQS_PRESERVE_GROUP_ORDER", false)?,
        })
    }
}
