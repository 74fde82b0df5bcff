//! Output module for run results
//!
//! This module handles:
//! - Writing one report row per task to a CSV/TSV file
//! - Counting outcomes and keeping the most recent errors
//! - Printing the end-of-run summary

mod report;
pub mod stats;
mod traits;

pub use report::{ReportWriter, REPORT_COLUMNS};
pub use stats::{print_summary, RunStats, StatsSnapshot};
pub use traits::{OutputError, OutputResult, ReportRow, ReportSink};
