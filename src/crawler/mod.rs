//! Crawler module: the orchestration engine
//!
//! This module contains the core crawl logic, including:
//! - Politeness (robots.txt, per-host pacing, global rate limit, blocklist)
//! - The fetch & extraction pipeline run for every task
//! - Email scanning, validation and optional MX confirmation
//! - The session pool and its recycling policy
//! - Task scheduling and overall run coordination

mod coordinator;
pub mod detection;
pub mod emails;
mod fetcher;
pub mod mx;
pub mod politeness;
mod scheduler;
pub mod sessions;
mod task;

pub use coordinator::{load_seeds, Coordinator, RunEnd, RunReport, Seeds};
pub use detection::BlockDetector;
pub use emails::EmailScanner;
pub use fetcher::PageFetcher;
pub use mx::{DnsMxResolver, MxLookup, MxResolver, MxValidator};
pub use politeness::PolitenessController;
pub use scheduler::Scheduler;
pub use sessions::{SessionPool, Worker};
pub use task::Task;
