use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Values given on the command line, applied over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<PathBuf>,
    pub concurrency: Option<u32>,
    pub max_depth: Option<u32>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.input.file = Some(input.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.crawler.concurrency = concurrency;
        }
        if let Some(max_depth) = self.max_depth {
            config.crawler.max_depth = max_depth;
        }
    }
}

/// Loads and parses a configuration file from the given path
///
/// List files referenced by the configuration are resolved relative to the
/// directory holding `path` and merged into their lists.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use contact_harvester::config::load_config;
///
/// let config = load_config(Path::new("harvester.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut config = parse_config_file(path)?;
    merge_list_files(&mut config, base_dir(Some(path)));
    validate(&config)?;
    Ok(config)
}

/// Builds the run's configuration from an optional file plus CLI overrides
///
/// # Returns
///
/// * `Ok((Config, Option<String>))` - The validated configuration and the file hash, if a file was used
/// * `Err(ConfigError)` - Failed to load, parse, or validate
pub fn build_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<(Config, Option<String>), ConfigError> {
    let (mut config, hash) = match path {
        Some(path) => (parse_config_file(path)?, Some(compute_config_hash(path)?)),
        None => (Config::default(), None),
    };

    overrides.apply(&mut config);
    merge_list_files(&mut config, base_dir(path));
    validate(&config)?;

    Ok((config, hash))
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Reads a list file: one entry per line, blank lines and `#` comments ignored
pub fn read_list_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn parse_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

fn base_dir(path: Option<&Path>) -> &Path {
    path.and_then(Path::parent).unwrap_or_else(|| Path::new(""))
}

/// Merges every configured list file into its list
fn merge_list_files(config: &mut Config, base: &Path) {
    let session = &mut config.session;
    merge_from(&mut session.user_agents, session.user_agents_file.as_deref(), base);
    merge_from(&mut session.proxies, session.proxies_file.as_deref(), base);
    merge_from(
        &mut session.block_url_patterns,
        session.block_url_patterns_file.as_deref(),
        base,
    );

    let politeness = &mut config.politeness;
    merge_from(
        &mut politeness.excluded_domains,
        politeness.excluded_domains_file.as_deref(),
        base,
    );
    merge_from(
        &mut politeness.excluded_extensions,
        politeness.excluded_extensions_file.as_deref(),
        base,
    );
    merge_from(
        &mut politeness.excluded_patterns,
        politeness.excluded_patterns_file.as_deref(),
        base,
    );

    let extraction = &mut config.extraction;
    merge_from(&mut extraction.email_filter, extraction.email_filter_file.as_deref(), base);
}

/// Appends entries from a list file that are not already present
///
/// A missing or unreadable list file keeps the current list and logs a warning.
fn merge_from(target: &mut Vec<String>, file: Option<&Path>, base: &Path) {
    let Some(file) = file else {
        return;
    };
    let path = if file.is_absolute() { file.to_path_buf() } else { base.join(file) };

    match read_list_file(&path) {
        Ok(entries) => {
            let before = target.len();
            for entry in entries {
                if !target.contains(&entry) {
                    target.push(entry);
                }
            }
            tracing::debug!("Merged {} entries from {}", target.len() - before, path.display());
        }
        Err(e) => {
            tracing::warn!("Could not read list file {}: {}; keeping existing list", path.display(), e);
        }
    }
}
