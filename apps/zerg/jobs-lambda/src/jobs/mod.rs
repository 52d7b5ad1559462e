//! Jobs this function knows how to run.
//!
//! Each job type has a data struct (deserialized from the payload's `data`
//! field) and a handler that owns its dependencies.

mod report;
mod welcome_email;

pub use report::{
    GenerateReport, GenerateReportHandler, InMemoryReportStore, ReportFormat, ReportStore,
};
pub use welcome_email::{Mailer, OutgoingEmail, TracingMailer, WelcomeEmail, WelcomeEmailHandler};

use core_config::env_or_default;
use sqs_worker::JobRegistry;
use std::sync::Arc;

/// Job type id of [`WelcomeEmail`]
pub const SEND_WELCOME_EMAIL: &str = "send_welcome_email";

/// Job type id of [`GenerateReport`]
pub const GENERATE_REPORT: &str = "generate_report";

/// Shared dependencies handed to job handlers
#[derive(Clone)]
pub struct JobDependencies {
    pub mailer: Arc<dyn Mailer>,
    pub reports: Arc<dyn ReportStore>,
}

impl JobDependencies {
    /// Reads:
    /// - MAIL_FROM_ADDRESS: defaults to "no-reply@example.com"
    pub fn from_env() -> Self {
        let from = env_or_default("MAIL_FROM_ADDRESS", "no-reply@example.com");

        Self {
            mailer: Arc::new(TracingMailer::new(from)),
            reports: Arc::new(InMemoryReportStore::new()),
        }
    }
}

/// Build the registry of every job type this function runs
pub fn registry(dependencies: &JobDependencies) -> JobRegistry {
    JobRegistry::new()
        .register(
            SEND_WELCOME_EMAIL,
            WelcomeEmailHandler::new(Arc::clone(&dependencies.mailer)),
        )
        .register(
            GENERATE_REPORT,
            GenerateReportHandler::new(Arc::clone(&dependencies.reports)),
        )
}
