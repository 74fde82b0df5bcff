//! Fetch & extraction pipeline
//!
//! This module runs one task against one worker:
//! - admission: blocklist, excluded domains, robots.txt, then the dedup claim
//! - navigation with rate limiting, per-host pacing and bounded retries
//! - post-load waits and challenge detection
//! - content extraction, email scanning and optional MX confirmation
//! - link discovery for the next depth
//!
//! Every failure becomes a `TaskError`; the page is closed on every path.

use crate::browser::{BrowserPage, NavigationErrorKind, RequestFilter};
use crate::config::{Config, ExtractionMethod};
use crate::crawler::detection::BlockDetector;
use crate::crawler::emails::EmailScanner;
use crate::crawler::mx::MxValidator;
use crate::crawler::politeness::PolitenessController;
use crate::crawler::sessions::Worker;
use crate::crawler::task::Task;
use crate::state::{ExtractionPhase, Frontier, PageHarvest, SkipReason, TaskError};
use crate::url::{canonicalize, is_web_link, CanonicalUrl, CanonicalizeOptions};
use crate::BrowserError;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Title written when the page title cannot be read
const TITLE_UNAVAILABLE: &str = "Error Retrieving Title";

/// Runs the per-task pipeline
pub struct PageFetcher {
    config: Arc<Config>,
    frontier: Arc<Frontier>,
    politeness: Arc<PolitenessController>,
    detector: Option<BlockDetector>,
    scanner: EmailScanner,
    mx: Option<MxValidator>,
    request_filter: RequestFilter,
    canonical: CanonicalizeOptions,
}

impl PageFetcher {
    /// Creates the pipeline
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration
    /// * `frontier` - Visited-URL set shared by all tasks
    /// * `politeness` - Robots, pacing and blocklist gate
    /// * `mx` - MX validator, when domain confirmation is enabled
    pub fn new(
        config: Arc<Config>,
        frontier: Arc<Frontier>,
        politeness: Arc<PolitenessController>,
        mx: Option<MxValidator>,
    ) -> Self {
        Self {
            detector: BlockDetector::from_config(&config.politeness),
            scanner: EmailScanner::from_config(&config.extraction),
            request_filter: RequestFilter::new(
                &config.session.block_resource_types,
                &config.session.block_url_patterns,
            ),
            canonical: CanonicalizeOptions {
                strip_www: config.crawler.strip_www,
                strip_query: config.crawler.strip_query,
            },
            config,
            frontier,
            politeness,
            mx,
        }
    }

    /// Decides whether a task may run, claiming its URL if so
    ///
    /// # Returns
    ///
    /// * `None` - The URL is now claimed by this task
    /// * `Some(SkipReason)` - The task ends without navigating
    pub async fn admit(&self, task: &Task) -> Option<SkipReason> {
        let host = task.host();

        if self.politeness.is_blocked(host) {
            return Some(SkipReason::DomainBlocked(host.to_string()));
        }

        if task.depth == 0 && self.politeness.exclusions().excluded_domain(host).is_some() {
            return Some(SkipReason::ExcludedDomain(host.to_string()));
        }

        if !self.politeness.is_allowed(&task.url).await {
            tracing::info!(url = %task.url, "Disallowed by robots.txt");
            self.frontier.mark_invalid_link(task.url.as_str());
            return Some(SkipReason::RobotsDisallowed);
        }

        if !self.frontier.claim(task.url.as_str()) {
            return Some(SkipReason::AlreadyVisited);
        }

        None
    }

    /// Visits an admitted task's URL with the worker's session
    pub async fn fetch(&self, task: &Task, worker: &Worker) -> Result<PageHarvest, TaskError> {
        let mut page = worker
            .session
            .new_page()
            .await
            .map_err(|e| TaskError::internal(format!("Failed to open page: {}", e)))?;

        let result = self.visit(task, worker, page.as_mut()).await;
        page.close().await;
        tracing::debug!(worker = worker.id, phase = "idle", "Page closed");
        result
    }

    async fn visit(
        &self,
        task: &Task,
        worker: &Worker,
        page: &mut dyn BrowserPage,
    ) -> Result<PageHarvest, TaskError> {
        let host = task.host().to_string();

        if !self.request_filter.is_empty() {
            if let Err(e) = page.set_request_filter(self.request_filter.clone()).await {
                tracing::warn!(worker = worker.id, url = %task.url, "Request filter not installed: {}", e);
            }
        }

        self.navigate(task, worker, page).await?;
        let page: &dyn BrowserPage = page;

        let post_load_delay = self.config.crawler.post_load_delay();
        if !post_load_delay.is_zero() {
            tokio::time::sleep(post_load_delay).await;
        }
        if let Some(selector) = &self.config.crawler.wait_for_selector {
            let timeout = self.config.crawler.wait_for_selector_timeout();
            if let Err(e) = page.wait_for_selector(selector, timeout).await {
                tracing::warn!(url = %task.url, "Wait for selector failed, continuing: {}", e);
            }
        }

        let title = page.title().await.unwrap_or_else(|e| {
            tracing::warn!(url = %task.url, "Failed to read title: {}", e);
            TITLE_UNAVAILABLE.to_string()
        });

        if let Some(detector) = &self.detector {
            if let Some(reason) = detector.detect(page, &title).await {
                tracing::warn!(url = %task.url, domain = %host, "Block page detected: {}", reason);
                self.politeness.block(&host);
                return Err(TaskError::Blocked { domain: host, reason });
            }
        }

        tracing::debug!(worker = worker.id, phase = "extracting", url = %task.url);
        let text = self.extract_text(page).await.map_err(|e| TaskError::Extraction {
            domain: host.clone(),
            phase: ExtractionPhase::Content,
            message: e.to_string(),
        })?;

        let raw_emails = self.scan_emails(page, &text).await;
        let emails = match &self.mx {
            Some(mx) if !raw_emails.is_empty() => mx.filter(&raw_emails).await,
            _ => raw_emails.clone(),
        };

        let links = if task.depth < self.config.crawler.max_depth {
            self.discover_links(task, page).await.map_err(|e| TaskError::Extraction {
                domain: host.clone(),
                phase: ExtractionPhase::Links,
                message: e.to_string(),
            })?
        } else {
            Vec::new()
        };

        Ok(PageHarvest {
            title,
            raw_emails,
            emails,
            links,
        })
    }

    /// Navigation retry loop
    ///
    /// Proxy failures end the task at once; timeouts and network failures
    /// are retried with a linear backoff; anything else fails immediately.
    async fn navigate(
        &self,
        task: &Task,
        worker: &Worker,
        page: &mut dyn BrowserPage,
    ) -> Result<(), TaskError> {
        let crawler = &self.config.crawler;
        let max_attempts = crawler.navigation_retries + 1;
        let host = task.host();

        for attempt in 1..=max_attempts {
            self.politeness.acquire_rate_token().await;
            self.politeness.wait_for_turn(host).await;

            tracing::debug!(worker = worker.id, phase = "navigating", attempt, url = %task.url);
            let error = match page
                .goto(task.url.as_str(), crawler.page_load_timeout(), crawler.wait_until)
                .await
            {
                Ok(response) => {
                    if response.status >= 400 {
                        tracing::debug!(url = %task.url, "Page answered HTTP {}", response.status);
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            if error.kind == NavigationErrorKind::Proxy {
                return Err(TaskError::Proxy {
                    domain: host.to_string(),
                    attempt,
                    message: error.message,
                });
            }

            if error.is_retryable() && attempt < max_attempts {
                let backoff = crawler.retry_delay() * attempt;
                tracing::warn!(
                    worker = worker.id,
                    url = %task.url,
                    "Navigation attempt {} failed ({}), retrying in {}ms",
                    attempt,
                    error,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return Err(TaskError::Navigation {
                domain: host.to_string(),
                attempt,
                kind: error.kind,
                message: error.message,
            });
        }

        Err(TaskError::internal("navigation loop ended without an attempt"))
    }

    /// Collects the text the email scan runs over
    async fn extract_text(&self, page: &dyn BrowserPage) -> Result<String, BrowserError> {
        let extraction = &self.config.extraction;

        let scoped = self.scoped_text(page).await;
        let mut text = match scoped {
            Some(text) => text,
            None => {
                let method = extraction.method;
                self.with_retries(move || page_text(page, method)).await?
            }
        };

        if extraction.scan_shadow_dom {
            match page.shadow_root_text().await {
                Ok(shadow) if !shadow.is_empty() => {
                    text.push('\n');
                    text.push_str(&shadow);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Shadow DOM scan failed: {}", e),
            }
        }

        if extraction.scan_iframes {
            match page.frame_texts(extraction.max_iframe_scan_depth).await {
                Ok(frames) => {
                    for frame in frames {
                        text.push('\n');
                        text.push_str(&frame);
                    }
                }
                Err(e) => tracing::warn!("Frame scan failed: {}", e),
            }
        }

        Ok(text)
    }

    /// Text inside the configured location selectors, if any of them matched
    async fn scoped_text(&self, page: &dyn BrowserPage) -> Option<String> {
        let selectors = &self.config.extraction.email_location_selectors;
        if selectors.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        for selector in selectors {
            match page.inner_text(selector).await {
                Ok(text) if !text.trim().is_empty() => parts.push(text),
                Ok(_) => {}
                Err(e) => tracing::debug!("Location selector {} failed: {}", selector, e),
            }
        }

        if parts.is_empty() {
            tracing::debug!("No location selector matched, falling back to the full page");
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Pattern scan of the text plus the declared-address attribute pass
    async fn scan_emails(&self, page: &dyn BrowserPage, text: &str) -> Vec<String> {
        let mut emails = self.scanner.scan(text);

        let attribute = &self.config.extraction.email_attribute;
        match page.attribute_values(&format!("[{}]", attribute), attribute).await {
            Ok(values) => {
                for email in self.scanner.scan_attributes(&values) {
                    if !emails.contains(&email) {
                        emails.push(email);
                    }
                }
            }
            Err(e) => tracing::debug!("Attribute scan for {} failed: {}", attribute, e),
        }

        emails
    }

    /// Links accepted for the next depth
    async fn discover_links(
        &self,
        task: &Task,
        page: &dyn BrowserPage,
    ) -> Result<Vec<CanonicalUrl>, BrowserError> {
        let hrefs = self.with_retries(move || page.anchor_hrefs()).await?;

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for href in hrefs {
            if !is_web_link(&href) {
                continue;
            }
            let Ok(link) = canonicalize(&href, &self.canonical) else {
                continue;
            };
            if link == task.url || self.frontier.contains(link.as_str()) {
                continue;
            }
            if self.politeness.is_blocked(link.host()) {
                continue;
            }
            if let Some(exclusion) = self.politeness.exclusions().check(&link) {
                tracing::trace!("Excluded link {}: {:?}", link, exclusion);
                continue;
            }
            if !seen.insert(link.as_str().to_string()) {
                continue;
            }
            if !self.politeness.is_allowed(&link).await {
                tracing::debug!("Link {} disallowed by robots.txt", link);
                self.frontier.mark_invalid_link(link.as_str());
                continue;
            }
            links.push(link);
        }

        tracing::debug!(url = %task.url, "Discovered {} link(s)", links.len());
        Ok(links)
    }

    /// Runs a page operation with the element-action retry policy
    async fn with_retries<T, F, Fut>(&self, mut operation: F) -> Result<T, BrowserError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BrowserError>>,
    {
        let retries = self.config.crawler.element_action_retries;
        let delay: Duration = self.config.crawler.element_action_retry_delay();

        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    tracing::debug!("Page operation failed ({}), retry {}/{}", e, attempt, retries);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn page_text(page: &dyn BrowserPage, method: ExtractionMethod) -> Result<String, BrowserError> {
    match method {
        ExtractionMethod::InnerText => page.inner_text("body").await,
        ExtractionMethod::Content => page.content().await,
        ExtractionMethod::Both => {
            let inner = page.inner_text("body").await?;
            let content = page.content().await?;
            Ok(format!("{}\n{}", inner, content))
        }
    }
}
