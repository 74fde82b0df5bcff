//! Configuration module
//!
//! This module handles loading, merging, and validating the TOML
//! configuration. Every section is optional and falls back to documented
//! defaults.
//!
//! # Example
//!
//! ```no_run
//! use contact_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Workers: {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, ExtractionMethod, InputConfig, OutputConfig,
    OutputFormat, PolitenessConfig, SessionConfig, WaitUntil,
};

// Re-export parser functions
pub use parser::{build_config, compute_config_hash, load_config, read_list_file, ConfigOverrides};
