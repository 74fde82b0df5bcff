use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Normalized email addresses seen anywhere in the run
///
/// Only used to tell which emails in a report row are new; it never
/// suppresses extraction.
#[derive(Debug, Default)]
pub struct EmailRegistry {
    seen: Mutex<HashSet<String>>,
}

impl EmailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers emails and returns those not seen before, in input order
    ///
    /// # Arguments
    ///
    /// * `emails` - Normalized email addresses found on one page
    ///
    /// # Returns
    ///
    /// The subset that was new to the registry
    pub fn register<'a, I>(&self, emails: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut seen = self.lock();
        emails
            .into_iter()
            .filter(|email| seen.insert((*email).clone()))
            .cloned()
            .collect()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.lock().contains(email)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
