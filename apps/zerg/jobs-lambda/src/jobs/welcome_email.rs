//! `send_welcome_email` job

use async_trait::async_trait;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use sqs_worker::{JobDelivery, JobError, JobHandler};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Job data for a welcome email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeEmail {
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// An email ready to hand to a [`Mailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Sends emails on behalf of jobs
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> eyre::Result<()>;

    /// Get the mailer name for logging
    fn name(&self) -> &'static str;
}

/// Mailer that only logs what it would send
pub struct TracingMailer {
    from: String,
}

impl TracingMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, email: &OutgoingEmail) -> eyre::Result<()> {
        info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "Sending email"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Handler for [`WelcomeEmail`] jobs
pub struct WelcomeEmailHandler {
    mailer: Arc<dyn Mailer>,
}

impl WelcomeEmailHandler {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl JobHandler<WelcomeEmail> for WelcomeEmailHandler {
    async fn handle(&self, job: WelcomeEmail, delivery: &JobDelivery<'_>) -> Result<(), JobError> {
        if !is_plausible_email(&job.email) {
            return Err(JobError::invalid_input(format!(
                "'{}' is not an email address",
                job.email
            )));
        }

        if delivery.attempt() > 1 {
            debug!(
                user_id = %job.user_id,
                attempt = delivery.attempt(),
                "Welcome email redelivered, sending again"
            );
        }

        let greeting = job.name.as_deref().unwrap_or("there");
        let email = OutgoingEmail {
            to: job.email.clone(),
            subject: "Welcome to Zerg!".to_string(),
            body: format!("Hi {greeting},\n\nyour account {} is ready.\n", job.user_id),
        };

        self.mailer
            .send(&email)
            .await
            .wrap_err_with(|| format!("failed to send welcome email via {}", self.mailer.name()))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "WelcomeEmailHandler"
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqs_worker::{JobMetadata, RawMessage};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> eyre::Result<()> {
            if self.fail {
                return Err(eyre::eyre!("connection refused"));
            }
            self.sent.lock().await.push(email.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    async fn run(handler: &WelcomeEmailHandler, job: WelcomeEmail) -> Result<(), JobError> {
        let message = RawMessage::new("m-1", "{}", "rh-1");
        let metadata = JobMetadata::for_type("send_welcome_email");
        let delivery = JobDelivery {
            connection_name: "sqs",
            queue_name: "jobs",
            message: &message,
            metadata: &metadata,
        };
        handler.handle(job, &delivery).await
    }

    fn job(email: &str) -> WelcomeEmail {
        WelcomeEmail {
            user_id: Uuid::nil(),
            email: email.to_string(),
            name: Some("Ada".to_string()),
        }
    }

    #[tokio::test]
    async fn test_sends_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let handler = WelcomeEmailHandler::new(mailer.clone());

        run(&handler, job("ada@example.com")).await.unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert!(sent[0].body.starts_with("Hi Ada,"));
    }

    #[tokio::test]
    async fn test_rejects_invalid_address() {
        let mailer = Arc::new(RecordingMailer::default());
        let handler = WelcomeEmailHandler::new(mailer.clone());

        let err = run(&handler, job("not-an-email")).await.unwrap_err();

        assert_eq!(err.error_type(), "InvalidInput");
        assert!(mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_mailer_failure_keeps_context() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let handler = WelcomeEmailHandler::new(mailer);

        let err = run(&handler, job("ada@example.com")).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to send welcome email via recording: connection refused"
        );
    }

    #[test]
    fn test_is_plausible_email() {
        assert!(is_plausible_email("a@b.io"));
        assert!(!is_plausible_email("@b.io"));
        assert!(!is_plausible_email("a@localhost"));
        assert!(!is_plausible_email("a@b@c.io"));
    }
}
