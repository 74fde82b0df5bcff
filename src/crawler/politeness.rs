//! Politeness controller
//!
//! This module gates every navigation:
//! - robots.txt checks through the shared per-host cache
//! - per-host minimum interval between requests, serialized by a host-scoped lock
//! - an optional global token bucket sized to the worker count
//! - the run-scoped blocklist of hosts that served a challenge page

use crate::config::PolitenessConfig;
use crate::robots::RobotsCache;
use crate::state::DomainState;
use crate::url::{CanonicalUrl, ExclusionRules};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

type DomainSlot = Arc<tokio::sync::Mutex<DomainState>>;

/// Shared politeness state for one run
pub struct PolitenessController {
    config: PolitenessConfig,
    robots: RobotsCache,
    domains: Mutex<HashMap<String, DomainSlot>>,
    limiter: Option<GlobalRateLimiter>,
    blocked: RwLock<HashSet<String>>,
    exclusions: ExclusionRules,
}

impl PolitenessController {
    /// Creates the controller
    ///
    /// # Arguments
    ///
    /// * `config` - Politeness settings
    /// * `concurrency` - Worker count; sizes the token bucket
    ///
    /// # Returns
    ///
    /// * `Ok(PolitenessController)` - Ready to gate requests
    /// * `Err(reqwest::Error)` - The robots.txt client could not be built
    pub fn new(config: &PolitenessConfig, concurrency: u32) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent_identifier.as_str())
            .timeout(config.robots_timeout())
            .build()?;

        let limiter = if config.use_rate_limiting {
            let per_second = NonZeroU32::new(concurrency.max(1)).unwrap_or(NonZeroU32::MIN);
            Some(RateLimiter::direct(Quota::per_second(per_second)))
        } else {
            None
        };

        Ok(Self {
            robots: RobotsCache::new(client, config.user_agent_identifier.clone()),
            domains: Mutex::new(HashMap::new()),
            limiter,
            blocked: RwLock::new(HashSet::new()),
            exclusions: ExclusionRules::new(
                &config.excluded_domains,
                &config.excluded_extensions,
                &config.excluded_patterns,
            ),
            config: config.clone(),
        })
    }

    /// Checks robots.txt for a URL; always true when robots are not respected
    pub async fn is_allowed(&self, url: &CanonicalUrl) -> bool {
        if !self.config.respect_robots_txt {
            return true;
        }
        self.robots.is_allowed(url).await
    }

    /// Consumes one token of the global bucket, waiting for a refill if needed
    pub async fn acquire_rate_token(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Waits until a request to `host` respects the minimum interval, then
    /// records the request
    ///
    /// The host lock is held across the wait, so two workers targeting the
    /// same host can never observe the same last-request time.
    pub async fn wait_for_turn(&self, host: &str) {
        let slot = self.domain_slot(host);
        let mut state = slot.lock().await;

        let delay = self.delay_for(host);
        if let Some(wait) = state.time_until_next_request(delay, Instant::now()) {
            tracing::debug!("Pacing {}: waiting {}ms", host, wait.as_millis());
            tokio::time::sleep(wait).await;
        }
        state.record_request(Instant::now());
    }

    /// Effective interval for a host: the configured minimum or a larger Crawl-delay
    pub fn delay_for(&self, host: &str) -> Duration {
        let min_delay = self.config.min_delay_per_domain();
        if !self.config.respect_crawl_delay {
            return min_delay;
        }
        match self.robots.crawl_delay(host) {
            Some(crawl_delay) if crawl_delay > min_delay => crawl_delay,
            _ => min_delay,
        }
    }

    /// Number of requests released to a host so far
    pub async fn request_count(&self, host: &str) -> u32 {
        self.domain_slot(host).lock().await.request_count
    }

    /// Quarantines a host for the rest of the run
    pub fn block(&self, host: &str) {
        let inserted = self
            .blocked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string());
        if inserted {
            tracing::warn!(domain = host, "Domain added to the blocklist");
        }
    }

    pub fn is_blocked(&self, host: &str) -> bool {
        self.blocked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(host)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn exclusions(&self) -> &ExclusionRules {
        &self.exclusions
    }

    fn domain_slot(&self, host: &str) -> DomainSlot {
        let mut domains = self.domains.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(domains.entry(host.to_string()).or_default())
    }
}
