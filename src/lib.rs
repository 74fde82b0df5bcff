//! Contact Harvester: a polite concurrent email crawler
//!
//! This crate visits a list of seed websites, follows a bounded number of link
//! hops, and harvests contact email addresses while respecting robots.txt,
//! per-domain pacing, and bot-challenge detection. Progress is checkpointed so
//! a long run can be resumed.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for run-level operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Report error: {0}")]
    Output(#[from] output::OutputError),

    #[error("No browser sessions could be created")]
    NoSessions,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Column '{column}' not found in {path}")]
    MissingColumn { column: String, path: String },
}

/// URL-specific errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Empty URL")]
    Empty,

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Errors raised by the browser collaborator outside of navigation
#[derive(Debug, Error, Clone)]
pub enum BrowserError {
    #[error("Failed to create browser session: {0}")]
    SessionCreate(String),

    #[error("Failed to open page: {0}")]
    PageOpen(String),

    #[error("Page operation '{operation}' failed: {message}")]
    Evaluate {
        operation: &'static str,
        message: String,
    },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("No document loaded")]
    NoDocument,

    #[error("Timed out waiting for selector '{0}'")]
    WaitTimeout(String),

    #[error("Browser session is closed")]
    Closed,
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunEnd, RunReport};
pub use state::{EmailRegistry, Frontier, ScrapeOutcome, TaskError};
pub use url::{canonicalize, CanonicalUrl};
