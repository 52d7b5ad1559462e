//! `generate_report` job
//!
//! Reports are written under a key derived from the report id, so a
//! redelivered job overwrites its own output instead of duplicating it.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqs_worker::{JobDelivery, JobError, JobHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

impl ReportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Job data for a usage report over an inclusive date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReport {
    pub report_id: Uuid,
    pub user_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[serde(default)]
    pub format: ReportFormat,
}

/// Where generated reports are stored
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Store a report, replacing any previous one under the same key
    async fn put(&self, key: &str, contents: String) -> eyre::Result<()>;

    async fn get(&self, key: &str) -> eyre::Result<Option<String>>;
}

/// In-process report store
#[derive(Debug, Clone, Default)]
pub struct InMemoryReportStore {
    reports: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn put(&self, key: &str, contents: String) -> eyre::Result<()> {
        self.reports.write().await.insert(key.to_string(), contents);
        Ok(())
    }

    async fn get(&self, key: &str) -> eyre::Result<Option<String>> {
        Ok(self.reports.read().await.get(key).cloned())
    }
}

/// Handler for [`GenerateReport`] jobs
pub struct GenerateReportHandler {
    store: Arc<dyn ReportStore>,
}

impl GenerateReportHandler {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Storage key of a report
    pub fn key(job: &GenerateReport) -> String {
        format!(
            "reports/{}/{}.{}",
            job.user_id,
            job.report_id,
            job.format.extension()
        )
    }

    fn render(job: &GenerateReport, days: i64) -> String {
        match job.format {
            ReportFormat::Json => json!({
                "report_id": job.report_id,
                "user_id": job.user_id,
                "period_start": job.period_start,
                "period_end": job.period_end,
                "days": days,
                "generated_at": Utc::now().to_rfc3339(),
            })
            .to_string(),
            ReportFormat::Csv => format!(
                "report_id,user_id,period_start,period_end,days\n{},{},{},{},{}\n",
                job.report_id, job.user_id, job.period_start, job.period_end, days
            ),
        }
    }
}

#[async_trait]
impl JobHandler<GenerateReport> for GenerateReportHandler {
    async fn handle(
        &self,
        job: GenerateReport,
        delivery: &JobDelivery<'_>,
    ) -> Result<(), JobError> {
        if job.period_end < job.period_start {
            return Err(JobError::invalid_input(format!(
                "period ends ({}) before it starts ({})",
                job.period_end, job.period_start
            )));
        }

        let days = (job.period_end - job.period_start).num_days() + 1;
        let key = Self::key(&job);

        debug!(
            report_id = %job.report_id,
            days,
            attempt = delivery.attempt(),
            key = %key,
            "Generating report"
        );

        self.store
            .put(&key, Self::render(&job, days))
            .await
            .wrap_err_with(|| format!("failed to store report {}", job.report_id))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "GenerateReportHandler"
    }
}
