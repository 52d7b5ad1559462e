//! SQS Worker Framework
//!
//! Runs background jobs delivered by an SQS event source mapping inside a
//! Lambda function, with partial batch failure reporting.
//!
//! ## Features
//!
//! - **Typed jobs**: `JobHandler<J>` implementations registered by job type in a `JobRegistry`
//! - **Per-message accounting**: each message succeeds or fails on its own
//! - **Immediate deletes**: a successful message is deleted before the next one runs
//! - **Partial batch response**: only failed message ids go back to Lambda
//! - **Panic isolation**: a panicking job fails its message, not the batch
//! - **FIFO aware**: optional per-group ordering after a failure
//! - **Metrics**: `metrics` facade counters and histograms
//!
//! ## Example
//!
//! ```ignore
//! use sqs_worker::{BatchRunner, JobRegistry, SqsAcknowledger, SqsHandler, WorkerConfig};
//!
//! let registry = JobRegistry::new()
//!     .register("send_welcome_email", WelcomeEmailHandler::new(mailer));
//!
//! let runner = BatchRunner::new(registry, SqsAcknowledger::new(client), WorkerConfig::new("sqs", "jobs"));
//! let handler = SqsHandler::new(runner)?;
//!
//! lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
//!     let handler = &handler;
//!     async move { handler.handle(&event.payload).await }
//! }))
//! .await?;
//! ```

mod ack;
mod adapter;
mod config;
mod decoder;
mod error;
mod handler;
mod message;
pub mod metrics;
mod outcome;
mod registry;
mod report;
mod runner;

// Re-export main types
pub use ack::{
    queue_url_from_arn, Acknowledger, FailingAcknowledger, NoOpAcknowledger,
    RecordingAcknowledger, SqsAcknowledger,
};
pub use adapter::{JobAdapter, JobContext, JobDelivery, JobMetadata, JobPayload, PAYLOAD_VERSION};
pub use config::{AckFailurePolicy, WorkerConfig};
pub use decoder::{decode, decode_value, SQS_EVENT_SOURCE};
pub use error::{AckError, DeserializationError, JobError, MalformedBatchError, WorkerError};
pub use handler::SqsHandler;
pub use message::{
    RawMessage, SqsMessageAttribute, APPROXIMATE_RECEIVE_COUNT, MESSAGE_GROUP_ID, SENT_TIMESTAMP,
};
pub use metrics::SqsMetrics;
pub use outcome::{FailureDetail, FailureKind, MessageOutcome, Outcome};
pub use registry::{JobHandler, JobRegistry, PreparedJob};
pub use report::{report, BatchItemFailure, BatchResponse, BatchResponseExt, BatchSummary};
pub use runner::BatchRunner;
