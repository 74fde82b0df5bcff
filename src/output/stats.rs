//! Run statistics and the end-of-run summary

use crate::state::ReportStatus;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Counters updated by every task
#[derive(Debug)]
pub struct RunStats {
    processed: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    abandoned: AtomicU64,
    recent_errors: Mutex<VecDeque<String>>,
    recent_capacity: usize,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Tasks that produced a report row
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,

    /// Tasks dropped at shutdown before they started
    pub abandoned: u64,

    /// Most recent failures, oldest first
    pub recent_errors: Vec<String>,
}

impl RunStats {
    /// Creates counters keeping the last `recent_capacity` errors
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            processed: AtomicU64::new(0),
            success: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            recent_errors: Mutex::new(VecDeque::with_capacity(recent_capacity)),
            recent_capacity,
        }
    }

    /// Counts one finished task
    ///
    /// # Arguments
    ///
    /// * `status` - Status written to the report
    /// * `url` - The task URL
    /// * `detail` - Status detail, kept for failures
    pub fn record(&self, status: ReportStatus, url: &str, detail: &str) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        match status {
            ReportStatus::Success => {
                self.success.fetch_add(1, Ordering::Relaxed);
            }
            ReportStatus::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.push_error(format!("[{}] {}: {}", status, url, detail));
            }
        }
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            recent_errors: self
                .recent_errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect(),
        }
    }

    fn push_error(&self, message: String) {
        if self.recent_capacity == 0 {
            return;
        }
        let mut errors = self.recent_errors.lock().unwrap_or_else(PoisonError::into_inner);
        if errors.len() == self.recent_capacity {
            errors.pop_front();
        }
        errors.push_back(message);
    }
}

/// Prints the end-of-run summary to stdout
///
/// # Arguments
///
/// * `stats` - Final counters
/// * `unique_emails` - Size of the run's email registry
/// * `report_path` - Where the report was written
/// * `error_log` - Where warnings and errors were logged
pub fn print_summary(stats: &StatsSnapshot, unique_emails: usize, report_path: &Path, error_log: &Path) {
    println!("=== Harvest Summary ===\n");

    println!("Tasks:");
    println!("  Processed: {}", stats.processed);
    println!("  Success: {}", stats.success);
    println!("  Failed: {}", stats.failed);
    println!("  Skipped: {}", stats.skipped);
    if stats.abandoned > 0 {
        println!("  Abandoned at shutdown: {}", stats.abandoned);
    }
    println!();

    println!("Unique emails found: {}", unique_emails);
    println!("Report: {}", report_path.display());
    println!();

    if !stats.recent_errors.is_empty() {
        println!("Recent Errors ({}):", stats.recent_errors.len());
        for error in &stats.recent_errors {
            println!("  - {}", error);
        }
        println!();
        println!("Full error log: {}", error_log.display());
    }

    let success_rate = if stats.processed > 0 {
        (stats.success as f64 / stats.processed as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} tasks)",
        success_rate, stats.success, stats.processed
    );
}
