//! Task outcome definitions
//!
//! Every task ends in exactly one `ScrapeOutcome`, which maps to exactly one
//! report row. Failures carry a closed `TaskError` with structured fields
//! rather than a message to be parsed later.

use crate::browser::NavigationErrorKind;
use crate::url::CanonicalUrl;
use std::fmt;
use thiserror::Error;

/// Status column of a report row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    Success,
    Error,
    Skipped,
    Blocked,
    ProxyError,
    NavigationError,
    ScrapeError,
}

impl ReportStatus {
    /// The exact text written to the report
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
            Self::Skipped => "Skipped",
            Self::Blocked => "Blocked",
            Self::ProxyError => "Proxy Error",
            Self::NavigationError => "Navigation Error",
            Self::ScrapeError => "Scrape Error",
        }
    }

    /// Returns true for statuses counted as failures in the run summary
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success | Self::Skipped)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task finished without navigating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    RobotsDisallowed,
    AlreadyVisited,
    DomainBlocked(String),
    ExcludedDomain(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RobotsDisallowed => f.write_str("robots.txt"),
            Self::AlreadyVisited => f.write_str("Already Visited"),
            Self::DomainBlocked(host) => write!(f, "Domain Blocked: {}", host),
            Self::ExcludedDomain(host) => write!(f, "Excluded Domain: {}", host),
        }
    }
}

/// Which extraction step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPhase {
    Content,
    Links,
}

impl fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => f.write_str("content"),
            Self::Links => f.write_str("links"),
        }
    }
}

/// Per-task failure, contained by the scheduler and turned into a report row
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("Blocked on {domain}: {reason}")]
    Blocked { domain: String, reason: String },

    #[error("Proxy error on {domain} (attempt {attempt}): {message}")]
    Proxy {
        domain: String,
        attempt: u32,
        message: String,
    },

    #[error("Navigation failed on {domain} after {attempt} attempt(s): {kind}: {message}")]
    Navigation {
        domain: String,
        attempt: u32,
        kind: NavigationErrorKind,
        message: String,
    },

    #[error("Extraction of {phase} failed on {domain}: {message}")]
    Extraction {
        domain: String,
        phase: ExtractionPhase,
        message: String,
    },

    #[error("{message}")]
    Internal { message: String },
}

impl TaskError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Maps the failure to its report status
    pub fn status(&self) -> ReportStatus {
        match self {
            Self::Blocked { .. } => ReportStatus::Blocked,
            Self::Proxy { .. } => ReportStatus::ProxyError,
            Self::Navigation { .. } => ReportStatus::NavigationError,
            Self::Extraction { .. } => ReportStatus::ScrapeError,
            Self::Internal { .. } => ReportStatus::Error,
        }
    }
}

/// What a successful page visit produced
#[derive(Debug, Clone, Default)]
pub struct PageHarvest {
    pub title: String,
    /// Emails that passed pattern validation, before MX filtering
    pub raw_emails: Vec<String>,
    /// Emails reported for the page
    pub emails: Vec<String>,
    /// Links accepted for the next depth
    pub links: Vec<CanonicalUrl>,
}

/// Terminal result of one task
#[derive(Debug, Clone)]
pub enum ScrapeOutcome {
    Success(PageHarvest),
    Skipped(SkipReason),
    Failed(TaskError),
}

impl ScrapeOutcome {
    pub fn status(&self) -> ReportStatus {
        match self {
            Self::Success(_) => ReportStatus::Success,
            Self::Skipped(_) => ReportStatus::Skipped,
            Self::Failed(e) => e.status(),
        }
    }
}
