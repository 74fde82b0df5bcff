//! Report row type and the sink trait rows are written through

use crate::state::ReportStatus;
use crate::storage::InputRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while writing the report
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One report line; exactly one is written per task
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub input_url: String,
    pub normalized_url: String,
    pub status: ReportStatus,
    pub status_detail: String,
    pub timestamp: DateTime<Utc>,
    pub page_title: String,

    /// Emails found on the page, before MX filtering
    pub emails: Vec<String>,

    /// The subset never seen earlier in the run
    pub new_emails: Vec<String>,

    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub worker_id: Option<usize>,

    /// Input row the task traces back to
    pub original: Arc<InputRecord>,
}

impl ReportRow {
    /// A row with no page data, stamped now
    pub fn new(
        input_url: impl Into<String>,
        normalized_url: impl Into<String>,
        status: ReportStatus,
        status_detail: impl Into<String>,
        original: Arc<InputRecord>,
    ) -> Self {
        Self {
            input_url: input_url.into(),
            normalized_url: normalized_url.into(),
            status,
            status_detail: status_detail.into(),
            timestamp: Utc::now(),
            page_title: String::new(),
            emails: Vec::new(),
            new_emails: Vec::new(),
            user_agent: None,
            proxy: None,
            worker_id: None,
            original,
        }
    }
}

/// Destination of report rows
///
/// Implementations serialize concurrent writers so rows never interleave.
pub trait ReportSink: Send + Sync {
    fn write_row(&self, row: &ReportRow) -> OutputResult<()>;

    /// Rows successfully written so far
    fn rows_written(&self) -> u64;
}
