//! Shared test utilities for SQS worker testing
//!
//! This crate provides reusable test infrastructure:
//! - `SqsEventBuilder`: Lambda SQS event JSON, the way Lambda delivers it (always available)
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `TestSqs`: LocalStack SQS container with automatic cleanup (feature: "sqs")
//!
//! # Features
//!
//! - `sqs`: Enables the LocalStack SQS test infrastructure
//! - `all`: Enables all container test infrastructure
//!
//! # Usage
//!
//! ## Building events
//!
//! ```rust
//! use test_utils::SqsEventBuilder;
//!
//! let event = SqsEventBuilder::new()
//!     .message("m-1", r#"{"job":"send_welcome_email","data":{}}"#)
//!     .redelivered_message("m-2", "{}", 3)
//!     .build();
//!
//! assert_eq!(event["Records"].as_array().unwrap().len(), 2);
//! ```
//!
//! ## SQS Testing
//!
//! Add `features = ["sqs"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["sqs"] }
//! ```
//!
//! Then in your tests:
//!
//! ```rust,ignore
//! use test_utils::TestSqs;
//!
//! #[tokio::test]
//! #[ignore] // Requires Docker
//! async fn my_sqs_test() {
//!     let sqs = TestSqs::new().await;
//!     let queue_url = sqs.create_queue("jobs").await;
//!
//!     sqs.send(&queue_url, "hello").await;
//!     let messages = sqs.receive(&queue_url, 10, 30).await;
//!     assert_eq!(messages.len(), 1);
//! }
//! ```

use uuid::Uuid;

mod event;

#[cfg(feature = "sqs")]
mod sqs;

pub use event::{SqsEventBuilder, DEFAULT_QUEUE_ARN, SENT_TIMESTAMP_MS};

#[cfg(feature = "sqs")]
pub use sqs::TestSqs;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_partial_batch");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a deterministic SQS message id
    ///
    /// SQS message ids are UUIDs; `index` tells messages of one test apart.
    pub fn message_id(&self, index: u64) -> String {
        Uuid::from_u64_pair(self.seed, index).to_string()
    }

    /// Generate a receipt handle for a message index
    pub fn receipt_handle(&self, index: u64) -> String {
        format!("AQEB{:016x}{:08x}", self.seed, index)
    }

    /// Generate a unique user ID for job data
    pub fn user_id(&self) -> Uuid {
        let bytes = self.seed.to_le_bytes();
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&bytes);
        uuid_bytes[8..16].copy_from_slice(&bytes);
        Uuid::from_bytes(uuid_bytes)
    }

    /// Generate a unique name for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("my_test");
    /// let name = builder.name("queue", "jobs");
    /// // Returns: "test-queue-12345-jobs"
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}
