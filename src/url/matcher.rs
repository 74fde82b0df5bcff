use crate::url::CanonicalUrl;

/// Why a discovered link was excluded from the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Host contains an excluded-domain entry
    Domain(String),
    /// Path ends with an excluded file extension
    Extension(String),
    /// Path contains an excluded pattern
    Pattern(String),
}

/// Substring-based exclusion rules for hosts and paths
///
/// All entries are compared lower-cased:
/// - domains match as a substring of the host (`google.com` also excludes `maps.google.com`)
/// - extensions match as a suffix of the path
/// - patterns match as a substring of the path
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    domains: Vec<String>,
    extensions: Vec<String>,
    patterns: Vec<String>,
}

impl ExclusionRules {
    pub fn new(domains: &[String], extensions: &[String], patterns: &[String]) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            domains: lower(domains),
            extensions: lower(extensions),
            patterns: lower(patterns),
        }
    }

    /// Returns the first excluded-domain entry contained in `host`
    pub fn excluded_domain(&self, host: &str) -> Option<&str> {
        let host = host.to_lowercase();
        self.domains
            .iter()
            .find(|d| host.contains(d.as_str()))
            .map(String::as_str)
    }

    /// Checks a link against every rule, domain first
    ///
    /// # Arguments
    ///
    /// * `url` - The canonical link
    ///
    /// # Returns
    ///
    /// * `Some(Exclusion)` - The rule that excluded the link
    /// * `None` - The link may be followed
    pub fn check(&self, url: &CanonicalUrl) -> Option<Exclusion> {
        if let Some(domain) = self.excluded_domain(url.host()) {
            return Some(Exclusion::Domain(domain.to_string()));
        }

        let path = url.path().to_lowercase();
        if let Some(ext) = self.extensions.iter().find(|e| path.ends_with(e.as_str())) {
            return Some(Exclusion::Extension(ext.clone()));
        }
        if let Some(pattern) = self.patterns.iter().find(|p| path.contains(p.as_str())) {
            return Some(Exclusion::Pattern(pattern.clone()));
        }

        None
    }
}
