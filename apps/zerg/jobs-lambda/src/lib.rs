//! Jobs Lambda
//!
//! Runs background jobs delivered by an SQS event source mapping with
//! `ReportBatchItemFailures` enabled.
//!
//! ## Architecture
//!
//! ```text
//! SQS queue
//!   ↓ (event source mapping, one batch per invocation)
//! SqsHandler
//!   ↓ decode → BatchRunner (one job at a time, delete on success)
//! JobRegistry
//!   ↓ (job type → handler)
//! WelcomeEmailHandler / GenerateReportHandler
//!   ↓
//! {"batchItemFailures": [...]}  → Lambda redelivers only those
//! ```
//!
//! ## Configuration
//!
//! - `APP_ENV`: `production` switches logs to JSON
//! - `QUEUE_CONNECTION`, `SQS_QUEUE`, `SQS_QUEUE_URL`,
//!   `SQS_REPORT_ACK_FAILURES`, `SQS_PRESERVE_GROUP_ORDER`: see `core_config::queue`
//! - `MAIL_FROM_ADDRESS`: sender of job emails

pub mod jobs;

use aws_config::BehaviorVersion;
use core_config::queue::QueueConfig;
use core_config::{Environment, FromEnv};
use eyre::{Result, WrapErr};
use jobs::JobDependencies;
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use sqs_worker::{AckFailurePolicy, BatchRunner, SqsAcknowledger, SqsHandler, WorkerConfig};
use tracing::info;

/// Map the loaded queue binding onto the runner configuration
pub fn worker_config(queue: &QueueConfig) -> WorkerConfig {
    let policy = if queue.report_ack_failures {
        AckFailurePolicy::ReportFailed
    } else {
        AckFailurePolicy::ReportSucceeded
    };

    WorkerConfig::new(queue.connection_name.clone(), queue.queue_name.clone())
        .with_ack_failure_policy(policy)
        .with_preserve_group_order(queue.preserve_group_order)
}

/// Run the jobs Lambda
///
/// This is the main entry point for the function. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Loads the queue binding from the environment
/// 3. Builds the SQS client, job registry and handler once per cold start
/// 4. Hands every invocation to the handler until the runtime shuts down
///
/// # Errors
///
/// Returns an error if:
/// - Queue configuration is missing or invalid
/// - The Lambda runtime API fails
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();

    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        environment = ?environment,
        "Starting jobs lambda"
    );

    let queue_config = QueueConfig::from_env().wrap_err("Failed to load queue configuration")?;

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = aws_sdk_sqs::Client::new(&aws_config);
    let acknowledger = SqsAcknowledger::new(client).with_queue_url(queue_config.queue_url.clone());

    let dependencies = JobDependencies::from_env();
    let registry = jobs::registry(&dependencies);

    let runner = BatchRunner::new(registry, acknowledger, worker_config(&queue_config));
    let handler = SqsHandler::new(runner).wrap_err("Invalid worker configuration")?;

    info!(
        connection = %queue_config.connection_name,
        queue = %queue_config.queue_name,
        queue_url = ?queue_config.queue_url,
        job_types = ?handler.runner().adapter().registry().job_types(),
        "Jobs lambda ready"
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        let handler = &handler;
        async move {
            handler
                .handle(&event.payload)
                .await
                .map_err(lambda_runtime::Error::from)
        }
    }))
    .await
    .map_err(|e| eyre::eyre!("{}", e))?;

    info!("Jobs lambda stopped");
    Ok(())
}
