//! Jobs Lambda - Entry Point
//!
//! Lambda function that runs background jobs delivered by an SQS event source mapping.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    zerg_jobs_lambda::run().await
}
