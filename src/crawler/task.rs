use crate::storage::InputRecord;
use crate::url::CanonicalUrl;
use std::sync::Arc;

/// One URL to visit
///
/// Seeds come from input rows at depth 0; discovered links become children
/// one level deeper. A task never changes after it is created.
#[derive(Debug, Clone)]
pub struct Task {
    /// Input row the task traces back to (the seed's row for children)
    pub record: Arc<InputRecord>,

    /// The URL as written in the input or found on the page
    pub input_url: String,

    pub url: CanonicalUrl,
    pub depth: u32,
}

impl Task {
    pub fn seed(record: Arc<InputRecord>, input_url: impl Into<String>, url: CanonicalUrl) -> Self {
        Self {
            record,
            input_url: input_url.into(),
            url,
            depth: 0,
        }
    }

    /// Creates the task for a link discovered on this task's page
    pub fn child(&self, url: CanonicalUrl) -> Self {
        Self {
            record: Arc::clone(&self.record),
            input_url: url.as_str().to_string(),
            url,
            depth: self.depth + 1,
        }
    }

    pub fn host(&self) -> &str {
        self.url.host()
    }
}
