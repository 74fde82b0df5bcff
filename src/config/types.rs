use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

const DEFAULT_BLOCK_RESOURCE_TYPES: &[&str] = &[
    "image",
    "stylesheet",
    "font",
    "media",
    "other",
    "websocket",
    "fetch",
    "eventsource",
];

const DEFAULT_BLOCK_URL_PATTERNS: &[&str] = &[
    "google-analytics.com",
    "googletagmanager.com",
    "doubleclick.net",
    "googlesyndication.com",
    "facebook.net",
    "connect.facebook.net",
    "hotjar.com",
    "scorecardresearch.com",
    "adservice.google.com",
    "analytics",
    "tracking",
    "pixel",
];

const DEFAULT_BLOCK_KEYWORDS: &[&str] = &[
    "just a moment",
    "checking your browser",
    "captcha",
    "access denied",
    "error 403",
    "verify you are human",
    "challenge-platform",
];

const DEFAULT_BLOCK_SELECTORS: &[&str] = &[
    "iframe[src*='recaptcha']",
    "#cf-challenge-form",
    "#challenge-stage",
];

const DEFAULT_EXCLUDED_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "linkedin.com",
    "youtube.com",
    "instagram.com",
    "pinterest.com",
    "google.com",
    "maps.google.com",
    "docs.google.com",
    "javascript:",
    "tel:",
    "mailto:",
];

const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".zip", ".rar", ".exe", ".dmg", ".mp4",
    ".mp3", ".avi", ".mov", ".css", ".js", ".webp", ".woff", ".woff2", ".ttf", ".eot",
];

const DEFAULT_EXCLUDED_PATTERNS: &[&str] = &[
    "/wp-content/",
    "/wp-includes/",
    "/cart/",
    "/checkout/",
    "/login",
    "/register",
    "/account",
    "/policy",
    "/terms",
    "/privacy",
    "blog",
    "event",
    "/events/",
    "/news/",
    "/uploads/",
    "/assets/",
    "/static/",
];

const DEFAULT_EMAIL_FILTER: &[&str] = &[
    "example.com",
    "domain.com",
    "sentry.io",
    "wixpress.com",
    "smblogin.com",
    "@example.",
    "@email.",
    "@domain.",
    "localhost",
    "example.org",
    "img",
    "image",
    "logo",
    "icon",
    "sprite",
    "info@",
    "support@",
    "contact@",
    "sales@",
    "hello@",
    "no-reply@",
    "noreply@",
    "wix.com",
    "godaddy.com",
    "squarespace.com",
    "automattic.com",
    "google-analytics.com",
    "googletagmanager.com",
    "facebook.net",
    "fbcdn.net",
    "user@localhost",
];

const DEFAULT_INVALID_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".css", ".js", ".woff", ".woff2", ".ttf",
    ".eot", ".json", ".xml", ".yaml", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
    ".zip", ".rar", ".mp4", ".mov", ".avi", ".mp3",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Default worker count: one less than the available CPUs, or 4 on a single core
fn default_concurrency() -> u32 {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = if cpus > 1 { cpus - 1 } else { 4 };
    workers.min(100) as u32
}

/// Main configuration structure
///
/// Built once at startup (defaults, then the TOML file, then CLI overrides)
/// and shared read-only for the rest of the run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub input: InputConfig,
    pub crawler: CrawlerConfig,
    pub session: SessionConfig,
    pub politeness: PolitenessConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

/// Seed input configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InputConfig {
    /// CSV file holding one website per row
    pub file: Option<PathBuf>,

    /// Header of the column holding the website reference
    pub website_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            file: None,
            website_column: "Website".to_string(),
        }
    }
}

/// Page load condition passed to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
    Commit,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of workers and the bound on concurrent navigations
    pub concurrency: u32,

    /// Link hops followed from each seed (0 visits seeds only)
    pub max_depth: u32,

    pub page_load_timeout_ms: u64,
    pub wait_until: WaitUntil,

    /// Navigation attempts beyond the first for timeout/network failures
    pub navigation_retries: u32,

    /// Base of the linear navigation backoff
    pub retry_delay_ms: u64,

    /// Retries for content and link extraction
    pub element_action_retries: u32,
    pub element_action_retry_delay_ms: u64,

    /// Fixed pause after a page has loaded
    pub post_load_delay_ms: u64,
    pub wait_for_selector: Option<String>,
    pub wait_for_selector_timeout_ms: u64,

    pub strip_www: bool,
    pub strip_query: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_depth: 0,
            page_load_timeout_ms: 15_000,
            wait_until: WaitUntil::default(),
            navigation_retries: 2,
            retry_delay_ms: 2_000,
            element_action_retries: 1,
            element_action_retry_delay_ms: 500,
            post_load_delay_ms: 500,
            wait_for_selector: None,
            wait_for_selector_timeout_ms: 5_000,
            strip_www: false,
            strip_query: true,
        }
    }
}

impl CrawlerConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn element_action_retry_delay(&self) -> Duration {
        Duration::from_millis(self.element_action_retry_delay_ms)
    }

    pub fn post_load_delay(&self) -> Duration {
        Duration::from_millis(self.post_load_delay_ms)
    }

    pub fn wait_for_selector_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_for_selector_timeout_ms)
    }
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Replace a session after this many tasks (0 disables)
    pub context_max_tasks: u32,

    /// Replace a session after this many minutes (0 disables)
    pub context_max_time_minutes: u64,

    pub use_user_agents: bool,
    pub user_agents: Vec<String>,
    pub user_agents_file: Option<PathBuf>,

    pub use_proxies: bool,
    pub proxies: Vec<String>,
    pub proxies_file: Option<PathBuf>,

    pub ignore_https_errors: bool,

    /// Sub-resource types aborted by the request filter
    pub block_resource_types: Vec<String>,

    /// URL substrings aborted by the request filter
    pub block_url_patterns: Vec<String>,
    pub block_url_patterns_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_max_tasks: 200,
            context_max_time_minutes: 60,
            use_user_agents: true,
            user_agents: strings(DEFAULT_USER_AGENTS),
            user_agents_file: None,
            use_proxies: false,
            proxies: Vec::new(),
            proxies_file: None,
            ignore_https_errors: true,
            block_resource_types: strings(DEFAULT_BLOCK_RESOURCE_TYPES),
            block_url_patterns: strings(DEFAULT_BLOCK_URL_PATTERNS),
            block_url_patterns_file: None,
        }
    }
}

impl SessionConfig {
    /// Identity string for a worker slot, rotated round-robin
    pub fn user_agent_for(&self, worker_index: usize) -> Option<&str> {
        if !self.use_user_agents || self.user_agents.is_empty() {
            return None;
        }
        Some(self.user_agents[worker_index % self.user_agents.len()].as_str())
    }

    /// Proxy endpoint for a worker slot, rotated round-robin
    pub fn proxy_for(&self, worker_index: usize) -> Option<&str> {
        if !self.use_proxies || self.proxies.is_empty() {
            return None;
        }
        Some(self.proxies[worker_index % self.proxies.len()].as_str())
    }
}

/// Robots, pacing, and block-detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PolitenessConfig {
    pub respect_robots_txt: bool,
    pub user_agent_identifier: String,
    pub robots_timeout_ms: u64,

    /// Honor robots.txt Crawl-delay when it exceeds the minimum delay
    pub respect_crawl_delay: bool,

    pub min_delay_per_domain_ms: u64,

    /// Global token bucket sized to the concurrency, refilled every second
    pub use_rate_limiting: bool,

    pub detect_blocks: bool,
    pub block_keywords: Vec<String>,
    pub block_selectors: Vec<String>,

    pub excluded_domains: Vec<String>,
    pub excluded_domains_file: Option<PathBuf>,
    pub excluded_extensions: Vec<String>,
    pub excluded_extensions_file: Option<PathBuf>,
    pub excluded_patterns: Vec<String>,
    pub excluded_patterns_file: Option<PathBuf>,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            respect_robots_txt: true,
            user_agent_identifier: "EmailScraperBot/1.1 (+http://example.com/bot-info)".to_string(),
            robots_timeout_ms: 5_000,
            respect_crawl_delay: true,
            min_delay_per_domain_ms: 500,
            use_rate_limiting: false,
            detect_blocks: true,
            block_keywords: strings(DEFAULT_BLOCK_KEYWORDS),
            block_selectors: strings(DEFAULT_BLOCK_SELECTORS),
            excluded_domains: strings(DEFAULT_EXCLUDED_DOMAINS),
            excluded_domains_file: None,
            excluded_extensions: strings(DEFAULT_EXCLUDED_EXTENSIONS),
            excluded_extensions_file: None,
            excluded_patterns: strings(DEFAULT_EXCLUDED_PATTERNS),
            excluded_patterns_file: None,
        }
    }
}

impl PolitenessConfig {
    pub fn min_delay_per_domain(&self) -> Duration {
        Duration::from_millis(self.min_delay_per_domain_ms)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_millis(self.robots_timeout_ms)
    }
}

/// Which page text the email scan runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    #[default]
    InnerText,
    Content,
    Both,
}

/// Content and email extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    pub method: ExtractionMethod,

    /// When set and non-empty, only text inside these selectors is scanned
    pub email_location_selectors: Vec<String>,

    /// Attribute read for explicitly declared addresses
    pub email_attribute: String,

    pub scan_shadow_dom: bool,
    pub scan_iframes: bool,
    pub max_iframe_scan_depth: u32,

    pub validate_domain_mx: bool,

    /// Emails containing any of these substrings are dropped
    pub email_filter: Vec<String>,
    pub email_filter_file: Option<PathBuf>,

    /// Emails ending with any of these are file names, not addresses
    pub invalid_extensions: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            method: ExtractionMethod::default(),
            email_location_selectors: Vec::new(),
            email_attribute: "data-email".to_string(),
            scan_shadow_dom: false,
            scan_iframes: false,
            max_iframe_scan_depth: 1,
            validate_domain_mx: false,
            email_filter: strings(DEFAULT_EMAIL_FILTER),
            email_filter_file: None,
            invalid_extensions: strings(DEFAULT_INVALID_EXTENSIONS),
        }
    }
}

/// Report field separator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
}

impl OutputFormat {
    pub fn delimiter(&self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Appended to the input file stem when `report-path` is not set
    pub report_file_suffix: String,
    pub report_path: Option<PathBuf>,
    pub append_to_report: bool,
    pub include_original_data: bool,
    pub email_separator: String,
    pub format: OutputFormat,

    /// Checkpoint file holding the visited-URL set
    pub state_file: PathBuf,

    /// Append-only log of warnings and errors
    pub error_log: PathBuf,

    /// Seconds between periodic checkpoint saves (0 disables)
    pub checkpoint_interval_secs: u64,

    /// Seconds in-flight tasks get to finish after an interrupt
    pub shutdown_grace_secs: u64,

    /// Errors echoed in the end-of-run summary
    pub recent_errors: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_file_suffix: "_report.csv".to_string(),
            report_path: None,
            append_to_report: false,
            include_original_data: false,
            email_separator: "; ".to_string(),
            format: OutputFormat::default(),
            state_file: PathBuf::from("scraper_state.json"),
            error_log: PathBuf::from("errors.log"),
            checkpoint_interval_secs: 60,
            shutdown_grace_secs: 10,
            recent_errors: 15,
        }
    }
}

impl OutputConfig {
    /// Resolves where the report is written for a given input file
    ///
    /// `contacts.csv` with the default suffix becomes `contacts_report.csv`
    /// in the same directory.
    pub fn report_path_for(&self, input: &std::path::Path) -> PathBuf {
        if let Some(path) = &self.report_path {
            return path.clone();
        }
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        input.with_file_name(format!("{}{}", stem, self.report_file_suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.input.website_column, "Website");
        assert_eq!(config.crawler.max_depth, 0);
        assert_eq!(config.crawler.page_load_timeout(), Duration::from_secs(15));
        assert_eq!(config.crawler.navigation_retries, 2);
        assert!(config.crawler.concurrency >= 1);
        assert_eq!(config.session.context_max_tasks, 200);
        assert_eq!(config.politeness.min_delay_per_domain(), Duration::from_millis(500));
        assert!(config.politeness.respect_robots_txt);
        assert_eq!(config.extraction.method, ExtractionMethod::InnerText);
        assert_eq!(config.output.email_separator, "; ");
        assert_eq!(config.output.state_file, PathBuf::from("scraper_state.json"));
    }

    #[test]
    fn test_identity_rotation() {
        let mut session = SessionConfig {
            user_agents: vec!["ua-0".to_string(), "ua-1".to_string()],
            proxies: vec!["http://p0:8080".to_string()],
            ..SessionConfig::default()
        };
        assert_eq!(session.user_agent_for(0), Some("ua-0"));
        assert_eq!(session.user_agent_for(3), Some("ua-1"));
        assert_eq!(session.proxy_for(1), None);

        session.use_proxies = true;
        assert_eq!(session.proxy_for(5), Some("http://p0:8080"));

        session.use_user_agents = false;
        assert_eq!(session.user_agent_for(0), None);
    }

    #[test]
    fn test_report_path_from_input() {
        let output = OutputConfig::default();
        assert_eq!(
            output.report_path_for(Path::new("/data/leads.csv")),
            PathBuf::from("/data/leads_report.csv")
        );

        let output = OutputConfig {
            report_path: Some(PathBuf::from("out.tsv")),
            ..OutputConfig::default()
        };
        assert_eq!(output.report_path_for(Path::new("leads.csv")), PathBuf::from("out.tsv"));
    }

    #[test]
    fn test_output_delimiter() {
        assert_eq!(OutputFormat::Csv.delimiter(), b',');
        assert_eq!(OutputFormat::Tsv.delimiter(), b'\t');
    }
}
