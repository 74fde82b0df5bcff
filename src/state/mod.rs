//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Frontier`: the run's visited-URL set with atomic claims
//! - `EmailRegistry`: every unique email seen in the run
//! - `DomainState`: per-host pacing state
//! - `ScrapeOutcome` / `TaskError`: how a task ended

mod domain_state;
mod emails;
mod frontier;
mod outcome;

// Re-export main types
pub use domain_state::DomainState;
pub use emails::EmailRegistry;
pub use frontier::Frontier;
pub use outcome::{ExtractionPhase, PageHarvest, ReportStatus, ScrapeOutcome, SkipReason, TaskError};
