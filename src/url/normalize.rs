use crate::UrlError;
use std::fmt;
use url::Url;

/// Tracking query parameters removed when the query string is kept
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Pseudo-schemes that never identify a crawlable page
const REJECTED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "data:"];

/// Knobs for the stricter or looser canonical forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalizeOptions {
    /// Strip a leading "www." from the host
    pub strip_www: bool,
    /// Drop the query string entirely
    pub strip_query: bool,
}

impl Default for CanonicalizeOptions {
    fn default() -> Self {
        Self {
            strip_www: false,
            strip_query: true,
        }
    }
}

/// A URL in canonical form, used as the dedup key for the whole run
///
/// Always has an http(s) scheme and a non-empty lower-case host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// The canonical string form
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The lower-cased hostname
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// The path component (never empty)
    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// Scheme, host and port, e.g. `http://example.com:8080`
    pub fn origin(&self) -> String {
        self.0.origin().ascii_serialization()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Canonicalizes a raw URL string into the run's dedup key
///
/// # Canonicalization Steps
///
/// 1. Trim whitespace; reject empty input and `mailto:`/`tel:`/`javascript:`/`data:`
/// 2. Default to `http://` when no scheme is present; reject non-http(s) schemes
/// 3. Lowercase the host (done by the URL parser)
/// 4. Optionally remove a leading `www.`
/// 5. Strip trailing slashes from the path (an empty path becomes `/`)
/// 6. Remove the fragment
/// 7. Remove the query string, or when kept, drop tracking parameters and sort the rest
///
/// # Arguments
///
/// * `raw` - The URL string as found in input data or an anchor
/// * `options` - Which optional rules apply
///
/// # Returns
///
/// * `Ok(CanonicalUrl)` - Canonical URL
/// * `Err(UrlError)` - The input does not identify a crawlable page
///
/// # Examples
///
/// ```
/// use contact_harvester::url::{canonicalize, CanonicalizeOptions};
///
/// let url = canonicalize("Example-Biz.com", &CanonicalizeOptions::default()).unwrap();
/// assert_eq!(url.as_str(), "http://example-biz.com/");
/// ```
pub fn canonicalize(raw: &str, options: &CanonicalizeOptions) -> Result<CanonicalUrl, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let lower = trimmed.to_ascii_lowercase();
    if let Some(scheme) = REJECTED_SCHEMES.iter().find(|s| lower.starts_with(*s)) {
        return Err(UrlError::InvalidScheme(scheme.trim_end_matches(':').to_string()));
    }

    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if let Some(scheme) = explicit_scheme(trimmed) {
        return Err(UrlError::InvalidScheme(scheme.to_string()));
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("http://{}", rest)
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_lowercase(),
        _ => return Err(UrlError::MissingDomain),
    };

    if options.strip_www {
        if let Some(bare) = host.strip_prefix("www.") {
            if !bare.is_empty() {
                url.set_host(Some(bare))
                    .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
            }
        }
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(if path.is_empty() { "/" } else { &path });

    url.set_fragment(None);

    if options.strip_query {
        url.set_query(None);
    } else if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(CanonicalUrl(url))
}

/// Returns the scheme of `raw` if it spells one out explicitly (`ftp://...`)
fn explicit_scheme(raw: &str) -> Option<&str> {
    let (scheme, _) = raw.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
        Some(scheme)
    } else {
        None
    }
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()) && !key.starts_with("utm_"))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}
