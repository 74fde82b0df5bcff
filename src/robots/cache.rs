//! Per-host robots.txt cache
//!
//! Each host gets one `OnceCell`. The first task to ask about a host performs
//! the fetch; every concurrent task for the same host awaits that same
//! in-flight fetch instead of issuing its own. Entries live for the whole
//! run.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::CanonicalUrl;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;

type RobotsCell = Arc<OnceCell<ParsedRobots>>;

/// Host-keyed robots.txt cache with shared in-flight fetches
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    entries: Mutex<HashMap<String, RobotsCell>>,
}

impl RobotsCache {
    /// Creates a cache that fetches with the given client
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests (carries the timeout)
    /// * `user_agent` - Identifier whose product token is matched against groups
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched, fetching robots.txt on first use
    pub async fn is_allowed(&self, url: &CanonicalUrl) -> bool {
        let cell = self.cell_for(url);
        let origin = url.origin();
        let robots = cell
            .get_or_init(|| fetch_robots(&self.client, &origin))
            .await;
        robots.is_allowed(url.as_str(), &self.user_agent)
    }

    /// Returns the Crawl-delay for a host if its robots.txt is already cached
    pub fn crawl_delay(&self, host: &str) -> Option<Duration> {
        let cell = self.lock().get(host).cloned()?;
        cell.get()?.crawl_delay(&self.user_agent)
    }

    /// Number of hosts with a cache entry
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn cell_for(&self, url: &CanonicalUrl) -> RobotsCell {
        let mut entries = self.lock();
        let cell = entries
            .entry(url.host().to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()));
        Arc::clone(cell)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RobotsCell>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::{canonicalize, CanonicalizeOptions};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BOT: &str = "EmailScraperBot/1.1";

    fn url(raw: &str) -> CanonicalUrl {
        canonicalize(raw, &CanonicalizeOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), BOT);
        assert!(cache.is_allowed(&url(&format!("{}/about", server.uri()))).await);
        assert!(!cache.is_allowed(&url(&format!("{}/admin", server.uri()))).await);
        assert!(cache.is_allowed(&url(&format!("{}/team", server.uri()))).await);
    }

    #[tokio::test]
    async fn test_concurrent_checks_share_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(RobotsCache::new(Client::new(), BOT));
        let allowed = url(&format!("{}/contact", server.uri()));
        let denied = url(&format!("{}/private", server.uri()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            let target = if i % 2 == 0 { allowed.clone() } else { denied.clone() };
            handles.push(tokio::spawn(async move { cache.is_allowed(&target).await }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i % 2 == 0);
        }
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), BOT);
        assert!(cache.is_allowed(&url(&format!("{}/anything", server.uri()))).await);
    }

    #[tokio::test]
    async fn test_unreachable_robots_fails_open() {
        let cache = RobotsCache::new(Client::new(), BOT);
        // Port 9 (discard) is not expected to accept connections
        assert!(cache.is_allowed(&url("http://127.0.0.1:9/page")).await);
    }

    #[tokio::test]
    async fn test_crawl_delay_available_after_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 1"))
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), BOT);
        let target = url(&format!("{}/", server.uri()));
        assert_eq!(cache.crawl_delay(target.host()), None);
        assert!(cache.is_allowed(&target).await);
        assert_eq!(cache.crawl_delay(target.host()), Some(Duration::from_secs(1)));
    }
}
