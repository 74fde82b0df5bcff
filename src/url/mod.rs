//! URL handling module
//!
//! This module provides the canonical URL form used as the dedup key and the
//! exclusion rules applied to discovered links.

mod matcher;
mod normalize;

pub use matcher::{Exclusion, ExclusionRules};
pub use normalize::{canonicalize, CanonicalUrl, CanonicalizeOptions};

/// Checks whether an absolute link uses a scheme the crawler can follow
///
/// # Examples
///
/// ```
/// use contact_harvester::url::is_web_link;
///
/// assert!(is_web_link("https://example.com/about"));
/// assert!(!is_web_link("mailto:team@example.com"));
/// ```
pub fn is_web_link(raw: &str) -> bool {
    let lower = raw.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
