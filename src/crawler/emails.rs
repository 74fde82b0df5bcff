//! Email pattern scanning and validation

use crate::config::ExtractionConfig;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Plain `local@domain.tld` plus the `[at]` / `[dot]` obfuscations
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[a-z0-9._%+-]+(?:@|\s*\[\s*at\s*\]\s*)[a-z0-9.-]+(?:\.|\s*\[\s*dot\s*\]\s*)[a-z]{2,}",
    )
    .expect("email pattern is valid")
});

static AT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\[\s*at\s*\]\s*").expect("at pattern is valid"));

static DOT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\[\s*dot\s*\]\s*").expect("dot pattern is valid"));

const MAX_EMAIL_LEN: usize = 254;

/// Finds and validates email addresses in page text
#[derive(Debug, Clone)]
pub struct EmailScanner {
    filters: Vec<String>,
    invalid_extensions: Vec<String>,
}

impl EmailScanner {
    pub fn new(filters: &[String], invalid_extensions: &[String]) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            filters: lower(filters),
            invalid_extensions: lower(invalid_extensions),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(&config.email_filter, &config.invalid_extensions)
    }

    /// Extracts every valid email from `text`, deduplicated in first-seen order
    pub fn scan(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        EMAIL_PATTERN
            .find_iter(text)
            .filter_map(|m| self.validate(m.as_str()))
            .filter(|email| seen.insert(email.clone()))
            .collect()
    }

    /// Validates explicitly declared addresses read from a DOM attribute
    pub fn scan_attributes(&self, values: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        values
            .iter()
            .filter(|value| value.contains('@') && value.contains('.'))
            .filter_map(|value| self.validate(value))
            .filter(|email| seen.insert(email.clone()))
            .collect()
    }

    /// Normalizes a candidate and applies the validation rules
    ///
    /// # Returns
    ///
    /// * `Some(String)` - The normalized address
    /// * `None` - The candidate is not a usable email
    pub fn validate(&self, candidate: &str) -> Option<String> {
        let email = normalize(candidate);

        if self.invalid_extensions.iter().any(|ext| email.ends_with(ext.as_str())) {
            return None;
        }
        if self.filters.iter().any(|f| email.contains(f.as_str())) {
            return None;
        }

        let mut parts = email.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => return None,
        };
        if local.is_empty() || domain.len() < 3 || !domain.contains('.') {
            return None;
        }

        let tld = domain.rsplit('.').next().unwrap_or_default();
        if !(2..=10).contains(&tld.len()) {
            return None;
        }
        if email.len() > MAX_EMAIL_LEN {
            return None;
        }

        Some(email)
    }
}

/// Lower-cases, de-obfuscates, and strips whitespace and a trailing dot
fn normalize(candidate: &str) -> String {
    let lower = candidate.trim().to_lowercase();
    let lower = AT_TOKEN.replace_all(&lower, "@");
    let lower = DOT_TOKEN.replace_all(&lower, ".");
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    compact.trim_end_matches('.').to_string()
}

/// Domain part of a normalized address
pub fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}
