//! HTTP-backed browser
//!
//! Each session owns a reqwest client carrying its identity string, proxy and
//! TLS tolerance. Pages fetch the document once per navigation and answer DOM
//! queries from the static markup; no JavaScript runs.

use crate::browser::dom;
use crate::browser::{
    BrowserDriver, BrowserPage, BrowserSession, NavigationError, NavigationErrorKind,
    NavigationResponse, RequestFilter, SessionOptions,
};
use crate::config::WaitUntil;
use crate::BrowserError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Proxy};
use scraper::Html;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("contact-harvester/", env!("CARGO_PKG_VERSION"));

/// Driver creating reqwest-backed sessions
///
/// It has no external engine process, so it never reports a disconnect.
pub struct HttpBrowser {
    disconnect_tx: watch::Sender<bool>,
}

impl HttpBrowser {
    pub fn new() -> Self {
        let (disconnect_tx, _) = watch::channel(false);
        Self { disconnect_tx }
    }
}

impl Default for HttpBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for HttpBrowser {
    async fn new_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        Ok(Arc::new(HttpSession::new(options)?))
    }

    fn disconnected(&self) -> watch::Receiver<bool> {
        self.disconnect_tx.subscribe()
    }

    async fn close(&self) {
        tracing::debug!("HTTP browser closed");
    }
}

struct HttpSession {
    client: Client,
    proxied: bool,
    alive: AtomicBool,
}

impl HttpSession {
    fn new(options: &SessionOptions) -> Result<Self, BrowserError> {
        let mut builder = Client::builder()
            .user_agent(options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .redirect(Policy::limited(10))
            .danger_accept_invalid_certs(options.ignore_https_errors)
            .gzip(true)
            .brotli(true);

        if let Some(proxy) = &options.proxy {
            let proxy = Proxy::all(proxy).map_err(|e| {
                BrowserError::SessionCreate(format!("invalid proxy '{}': {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| BrowserError::SessionCreate(e.to_string()))?;

        Ok(Self {
            client,
            proxied: options.proxy.is_some(),
            alive: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        if !self.is_alive() {
            return Err(BrowserError::Closed);
        }
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            proxied: self.proxied,
            filter: RequestFilter::default(),
            timeout: Duration::from_secs(15),
            document: None,
        }))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

struct LoadedDocument {
    url: Url,
    html: String,
}

struct HttpPage {
    client: Client,
    proxied: bool,
    filter: RequestFilter,
    /// Timeout of the last navigation, reused for frame fetches
    timeout: Duration,
    document: Option<LoadedDocument>,
}

impl HttpPage {
    /// Runs a query against the loaded document
    ///
    /// The parsed tree is not `Send`, so it lives only inside this call.
    fn with_document<T>(
        &self,
        query: impl FnOnce(&Html, &Url) -> Result<T, BrowserError>,
    ) -> Result<T, BrowserError> {
        let loaded = self.document.as_ref().ok_or(BrowserError::NoDocument)?;
        let html = Html::parse_document(&loaded.html);
        query(&html, &loaded.url)
    }

    async fn fetch_document(&self, url: &Url) -> Result<(Url, String), NavigationError> {
        if self.filter.blocks("document", url.as_str()) {
            return Err(NavigationError::new(
                NavigationErrorKind::Other,
                format!("net::ERR_BLOCKED_BY_CLIENT at {}", url),
            ));
        }

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_error(&e, self.proxied))?;
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&e, self.proxied))?;
        Ok((final_url, body))
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn set_request_filter(&mut self, filter: RequestFilter) -> Result<(), BrowserError> {
        self.filter = filter;
        Ok(())
    }

    async fn goto(
        &mut self,
        url: &str,
        timeout: Duration,
        _wait_until: WaitUntil,
    ) -> Result<NavigationResponse, NavigationError> {
        let target = Url::parse(url)
            .map_err(|e| NavigationError::new(NavigationErrorKind::Other, e.to_string()))?;

        if self.filter.blocks("document", target.as_str()) {
            return Err(NavigationError::new(
                NavigationErrorKind::Other,
                format!("net::ERR_BLOCKED_BY_CLIENT at {}", target),
            ));
        }

        let response = self
            .client
            .get(target)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(&e, self.proxied))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| classify_error(&e, self.proxied))?;

        self.timeout = timeout;
        self.document = Some(LoadedDocument {
            url: final_url.clone(),
            html,
        });

        Ok(NavigationResponse {
            status,
            url: final_url.into(),
        })
    }

    async fn title(&self) -> Result<String, BrowserError> {
        self.with_document(|html, _| Ok(dom::page_title(html)))
    }

    async fn inner_text(&self, selector: &str) -> Result<String, BrowserError> {
        let selector = dom::parse_selector(selector)?;
        self.with_document(|html, _| Ok(dom::selector_text(html, &selector)))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.document
            .as_ref()
            .map(|loaded| loaded.html.clone())
            .ok_or(BrowserError::NoDocument)
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        let selector = dom::parse_selector(selector)?;
        self.with_document(|html, _| Ok(html.select(&selector).count()))
    }

    async fn attribute_values(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<String>, BrowserError> {
        let selector = dom::parse_selector(selector)?;
        self.with_document(|html, _| {
            Ok(html
                .select(&selector)
                .filter_map(|element| element.value().attr(attribute))
                .map(str::to_string)
                .collect())
        })
    }

    async fn anchor_hrefs(&self) -> Result<Vec<String>, BrowserError> {
        self.with_document(|html, url| Ok(dom::anchor_hrefs(html, url)))
    }

    async fn shadow_root_text(&self) -> Result<String, BrowserError> {
        self.with_document(|html, _| Ok(dom::shadow_root_text(html)))
    }

    async fn frame_texts(&self, max_depth: u32) -> Result<Vec<String>, BrowserError> {
        let mut pending = self.with_document(|html, url| Ok(dom::iframe_sources(html, url)))?;
        let body = dom::parse_selector("body")?;
        let mut texts = Vec::new();

        for _ in 0..max_depth {
            if pending.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for frame_url in pending {
                match self.fetch_document(&frame_url).await {
                    Ok((final_url, markup)) => {
                        let html = Html::parse_document(&markup);
                        let text = dom::selector_text(&html, &body);
                        if !text.is_empty() {
                            texts.push(text);
                        }
                        next.extend(dom::iframe_sources(&html, &final_url));
                    }
                    Err(e) => {
                        tracing::debug!("Skipping frame {}: {}", frame_url, e);
                    }
                }
            }
            pending = next;
        }

        Ok(texts)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        // Static markup cannot change, so the answer is immediate
        if self.count(selector).await? > 0 {
            Ok(())
        } else {
            Err(BrowserError::WaitTimeout(selector.to_string()))
        }
    }

    async fn close(&mut self) {
        self.document = None;
    }
}

/// Maps a reqwest failure onto the navigation error taxonomy
fn classify_error(error: &reqwest::Error, proxied: bool) -> NavigationError {
    let message = error_chain(error);
    let lower = message.to_lowercase();

    let kind = if proxied && (error.is_connect() || lower.contains("proxy") || lower.contains("tunnel")) {
        NavigationErrorKind::Proxy
    } else if error.is_timeout() {
        NavigationErrorKind::Timeout
    } else if error.is_connect() || error.is_request() || error.is_body() {
        NavigationErrorKind::Network
    } else {
        NavigationErrorKind::Other
    };

    NavigationError::new(kind, message)
}

/// Joins an error with all of its sources
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
