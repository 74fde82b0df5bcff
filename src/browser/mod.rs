//! Browser automation collaborator
//!
//! The crawler never renders pages itself. It consumes a navigate / extract /
//! intercept capability through three traits:
//!
//! - `BrowserDriver`: creates isolated sessions and reports disconnects
//! - `BrowserSession`: one long-lived browsing context owned by a worker
//! - `BrowserPage`: a single page used for exactly one task
//!
//! `HttpBrowser` is the bundled implementation: it fetches documents with
//! reqwest and answers DOM queries with scraper. A JavaScript-capable engine
//! plugs in by implementing the same traits.

mod dom;
mod http;

pub use http::HttpBrowser;

use crate::config::WaitUntil;
use crate::BrowserError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Settings for one isolated browsing session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Identity string (user agent); `None` keeps the engine default
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub ignore_https_errors: bool,
}

/// Requests a page must abort, by resource type or URL substring
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    resource_types: Vec<String>,
    url_patterns: Vec<String>,
}

impl RequestFilter {
    pub fn new(resource_types: &[String], url_patterns: &[String]) -> Self {
        Self {
            resource_types: resource_types.iter().map(|t| t.to_lowercase()).collect(),
            url_patterns: url_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Returns true if a request of this type to this URL should be aborted
    pub fn blocks(&self, resource_type: &str, url: &str) -> bool {
        let resource_type = resource_type.to_lowercase();
        if self.resource_types.iter().any(|t| *t == resource_type) {
            return true;
        }
        let url = url.to_lowercase();
        self.url_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.resource_types.is_empty() && self.url_patterns.is_empty()
    }
}

/// Classification of a failed navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationErrorKind {
    Timeout,
    Network,
    Proxy,
    Other,
}

impl fmt::Display for NavigationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Network => f.write_str("network error"),
            Self::Proxy => f.write_str("proxy error"),
            Self::Other => f.write_str("navigation error"),
        }
    }
}

/// A navigation failure as reported by the browser
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct NavigationError {
    pub kind: NavigationErrorKind,
    pub message: String,
}

impl NavigationError {
    pub fn new(kind: NavigationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Timeouts and network failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, NavigationErrorKind::Timeout | NavigationErrorKind::Network)
    }
}

/// What a successful navigation returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    pub status: u16,
    /// URL after redirects
    pub url: String,
}

/// Entry point of a browser engine
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Creates an isolated session with its own identity, proxy and cookies
    async fn new_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Arc<dyn BrowserSession>, BrowserError>;

    /// Flips to `true` when the engine disconnects; a disconnect ends the run
    fn disconnected(&self) -> watch::Receiver<bool>;

    async fn close(&self);
}

/// One isolated browsing context
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    /// False once the session has been closed or has crashed
    fn is_alive(&self) -> bool;

    async fn close(&self);
}

/// A single page
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Installs the filter applied to every later request of this page
    async fn set_request_filter(&mut self, filter: RequestFilter) -> Result<(), BrowserError>;

    async fn goto(
        &mut self,
        url: &str,
        timeout: Duration,
        wait_until: WaitUntil,
    ) -> Result<NavigationResponse, NavigationError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// Rendered text of every element matching `selector`, one per line
    async fn inner_text(&self, selector: &str) -> Result<String, BrowserError>;

    /// Full document markup
    async fn content(&self) -> Result<String, BrowserError>;

    async fn count(&self, selector: &str) -> Result<usize, BrowserError>;

    async fn attribute_values(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<String>, BrowserError>;

    /// `href` of every anchor, resolved to absolute form
    async fn anchor_hrefs(&self) -> Result<Vec<String>, BrowserError>;

    async fn shadow_root_text(&self) -> Result<String, BrowserError>;

    /// Text of nested frames down to `max_depth` levels
    async fn frame_texts(&self, max_depth: u32) -> Result<Vec<String>, BrowserError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    async fn close(&mut self);
}
