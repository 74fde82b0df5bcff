//! Visited-URL set shared by every task in a run
//!
//! The set is monotonic: entries are added when a task claims a URL (or when a
//! link is rejected by robots.txt) and never removed. Membership test and
//! insert happen under one lock acquisition with no suspension point between
//! them, so two concurrent tasks can never both claim the same URL.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The run's visited-URL set
#[derive(Debug, Default)]
pub struct Frontier {
    visited: Mutex<HashSet<String>>,
    dirty: AtomicBool,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims a canonical URL
    ///
    /// # Returns
    ///
    /// * `true` - The caller is the exclusive claimant and may fetch the URL
    /// * `false` - The URL was already visited or claimed by another task
    pub fn claim(&self, url: &str) -> bool {
        let inserted = self.lock().insert(url.to_string());
        if inserted {
            self.dirty.store(true, Ordering::Release);
        }
        inserted
    }

    /// Records a link that must never be fetched (e.g. disallowed by robots.txt)
    pub fn mark_invalid_link(&self, url: &str) {
        self.claim(url);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains(url)
    }

    /// Loads URLs visited by a previous run
    ///
    /// Restored entries do not mark the set as changed.
    ///
    /// # Returns
    ///
    /// The number of URLs that were not already present
    pub fn restore<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut visited = self.lock();
        let before = visited.len();
        visited.extend(urls);
        visited.len() - before
    }

    /// Returns a sorted copy of the set for checkpointing
    pub fn snapshot(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.lock().iter().cloned().collect();
        urls.sort();
        urls
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clears and returns the changed-since-last-save flag
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Re-raises the changed flag after a failed save
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.visited.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
