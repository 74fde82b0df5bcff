//! Optional DNS MX confirmation of email domains
//!
//! Each unique domain is resolved at most once per run. Concurrent tasks
//! asking about the same domain share one lookup.

use crate::crawler::emails::email_domain;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// Result of one MX lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MxLookup {
    Found,
    NotFound,
    Failed(String),
}

/// DNS seam used by `MxValidator`
#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> MxLookup;
}

/// System resolver backed by trust-dns
pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
}

impl DnsMxResolver {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

impl Default for DnsMxResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MxResolver for DnsMxResolver {
    async fn lookup_mx(&self, domain: &str) -> MxLookup {
        match self.resolver.mx_lookup(domain).await {
            Ok(records) if records.iter().next().is_some() => MxLookup::Found,
            Ok(_) => MxLookup::NotFound,
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => MxLookup::NotFound,
                _ => MxLookup::Failed(e.to_string()),
            },
        }
    }
}

/// Keeps only emails whose domain has MX records
pub struct MxValidator {
    resolver: Arc<dyn MxResolver>,
    cache: Mutex<HashMap<String, Arc<OnceCell<bool>>>>,
}

impl MxValidator {
    pub fn new(resolver: Arc<dyn MxResolver>) -> Self {
        Self {
            resolver,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Filters `emails`, preserving order
    ///
    /// Domains that fail to resolve for any reason are treated as invalid.
    pub async fn filter(&self, emails: &[String]) -> Vec<String> {
        let mut verdicts: HashMap<&str, bool> = HashMap::new();
        for email in emails {
            let Some(domain) = email_domain(email) else {
                continue;
            };
            if !verdicts.contains_key(domain) {
                let valid = self.domain_has_mx(domain).await;
                verdicts.insert(domain, valid);
            }
        }

        emails
            .iter()
            .filter(|email| {
                email_domain(email)
                    .and_then(|domain| verdicts.get(domain).copied())
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Resolves a domain once and caches the verdict for the run
    pub async fn domain_has_mx(&self, domain: &str) -> bool {
        let cell = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(domain.to_string()).or_default())
        };

        *cell
            .get_or_init(|| async {
                match self.resolver.lookup_mx(domain).await {
                    MxLookup::Found => true,
                    MxLookup::NotFound => {
                        tracing::debug!("No MX records for {}", domain);
                        false
                    }
                    MxLookup::Failed(message) => {
                        tracing::warn!(domain, "MX lookup failed, treating as invalid: {}", message);
                        false
                    }
                }
            })
            .await
    }

    /// Number of domains resolved so far
    pub fn cached_domains(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
