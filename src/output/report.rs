//! CSV/TSV report writer
//!
//! Rows go through one lock and are flushed immediately, so a crash loses at
//! most the row being written.

use crate::config::OutputConfig;
use crate::output::traits::{OutputResult, ReportRow, ReportSink};
use csv::{QuoteStyle, Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Fixed report columns, in order
pub const REPORT_COLUMNS: &[&str] = &[
    "InputURL",
    "NormalizedURL",
    "Status",
    "StatusDetail",
    "Timestamp",
    "PageTitle",
    "EmailsFoundRaw",
    "NewUniqueEmailsAdded",
    "UserAgentUsed",
    "ProxyUsed",
    "WorkerID",
];

/// Report file shared by every task of a run
pub struct ReportWriter {
    path: PathBuf,
    writer: Mutex<Writer<File>>,
    email_separator: String,
    original_columns: Vec<String>,
    rows: AtomicU64,
}

impl ReportWriter {
    /// Opens the report and writes the header when needed
    ///
    /// # Arguments
    ///
    /// * `path` - Report file
    /// * `config` - Output settings (delimiter, append mode, separator)
    /// * `input_columns` - Input headers, echoed as `Original_` columns when enabled
    ///
    /// # Returns
    ///
    /// * `Ok(ReportWriter)` - Ready for rows
    /// * `Err(OutputError)` - The file could not be opened or the header written
    pub fn create(path: &Path, config: &OutputConfig, input_columns: &[String]) -> OutputResult<Self> {
        let existing_len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let file = if config.append_to_report {
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            File::create(path)?
        };

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .delimiter(config.format.delimiter())
            .quote_style(QuoteStyle::Always)
            .from_writer(file);

        let original_columns = if config.include_original_data {
            input_columns.to_vec()
        } else {
            Vec::new()
        };

        if !config.append_to_report || existing_len == 0 {
            let mut header: Vec<String> = REPORT_COLUMNS.iter().map(|c| c.to_string()).collect();
            header.extend(original_columns.iter().map(|c| format!("Original_{}", c)));
            writer.write_record(&header)?;
            writer.flush()?;
        }

        tracing::info!("Writing report to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
            email_separator: config.email_separator.clone(),
            original_columns,
            rows: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fields(&self, row: &ReportRow) -> Vec<String> {
        let mut fields = vec![
            row.input_url.clone(),
            row.normalized_url.clone(),
            row.status.as_str().to_string(),
            row.status_detail.clone(),
            row.timestamp.to_rfc3339(),
            row.page_title.clone(),
            row.emails.join(&self.email_separator),
            row.new_emails.join(&self.email_separator),
            row.user_agent.clone().unwrap_or_else(|| "N/A".to_string()),
            row.proxy.clone().unwrap_or_else(|| "None".to_string()),
            row.worker_id.map(|id| id.to_string()).unwrap_or_else(|| "N/A".to_string()),
        ];
        fields.extend(
            self.original_columns
                .iter()
                .map(|column| row.original.get(column).unwrap_or_default().to_string()),
        );

        fields.iter().map(|field| single_line(field)).collect()
    }
}

impl ReportSink for ReportWriter {
    fn write_row(&self, row: &ReportRow) -> OutputResult<()> {
        let fields = self.fields(row);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_record(&fields)?;
        writer.flush()?;
        self.rows.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows.load(Ordering::Acquire)
    }
}

fn single_line(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
