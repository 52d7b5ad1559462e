//! SQS test infrastructure
//!
//! Provides a `TestSqs` helper that runs LocalStack with only SQS enabled.

use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::{Credentials, Region};
use aws_sdk_sqs::types::{Message, QueueAttributeName};
use aws_sdk_sqs::Client;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::localstack::LocalStack;

const LOCALSTACK_PORT: u16 = 4566;
const REGION: &str = "us-east-1";

/// Test SQS wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestSqs;
///
/// # async fn example() {
/// let sqs = TestSqs::new().await;
/// let queue_url = sqs.create_queue("jobs").await;
///
/// sqs.send(&queue_url, "hello").await;
/// let messages = sqs.receive(&queue_url, 10, 30).await;
/// assert_eq!(messages.len(), 1);
/// # }
/// ```
pub struct TestSqs {
    #[allow(dead_code)]
    container: ContainerAsync<LocalStack>,
    client: Client,
    pub endpoint_url: String,
}

impl TestSqs {
    /// Create a new LocalStack instance with SQS
    pub async fn new() -> Self {
        let container = LocalStack::default()
            .with_env_var("SERVICES", "sqs")
            .start()
            .await
            .expect("Failed to start LocalStack container");

        let host_port = container
            .get_host_port_ipv4(LOCALSTACK_PORT)
            .await
            .expect("Failed to get LocalStack port");

        let endpoint_url = format!("http://127.0.0.1:{}", host_port);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(REGION))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .endpoint_url(&endpoint_url)
            .load()
            .await;

        let client = Client::new(&config);

        tracing::info!(port = host_port, "Test SQS ready (LocalStack)");

        Self {
            container,
            client,
            endpoint_url,
        }
    }

    /// Get a cloned client (useful for passing to acknowledgers)
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Create a queue and return its URL
    pub async fn create_queue(&self, name: &str) -> String {
        self.client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .expect("Failed to create queue")
            .queue_url
            .expect("CreateQueue returned no queue URL")
    }

    /// Get the ARN of a queue
    pub async fn queue_arn(&self, queue_url: &str) -> String {
        self.client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .expect("Failed to get queue attributes")
            .attributes
            .and_then(|mut attrs| attrs.remove(&QueueAttributeName::QueueArn))
            .expect("Queue has no ARN")
    }

    /// Send a message and return its id
    pub async fn send(&self, queue_url: &str, body: &str) -> String {
        self.client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .expect("Failed to send message")
            .message_id
            .expect("SendMessage returned no message id")
    }

    /// Receive up to `max` messages, hiding them for `visibility_timeout_secs`
    pub async fn receive(
        &self,
        queue_url: &str,
        max: i32,
        visibility_timeout_secs: i32,
    ) -> Vec<Message> {
        self.client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max)
            .visibility_timeout(visibility_timeout_secs)
            .wait_time_seconds(1)
            .send()
            .await
            .expect("Failed to receive messages")
            .messages
            .unwrap_or_default()
    }
}

// Container is automatically cleaned up when TestSqs is dropped
impl Drop for TestSqs {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test LocalStack container");
    }
}
