//! Challenge and block page detection

use crate::browser::BrowserPage;
use crate::config::PolitenessConfig;

/// Characters of body text sampled for keyword signatures
const TEXT_SAMPLE_CHARS: usize = 500;

/// Keyword and selector signatures of anti-bot challenge pages
#[derive(Debug, Clone, Default)]
pub struct BlockDetector {
    keywords: Vec<String>,
    selectors: Vec<String>,
}

impl BlockDetector {
    pub fn new(keywords: &[String], selectors: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            selectors: selectors.to_vec(),
        }
    }

    /// Builds the detector, or `None` when detection is disabled
    pub fn from_config(config: &PolitenessConfig) -> Option<Self> {
        config
            .detect_blocks
            .then(|| Self::new(&config.block_keywords, &config.block_selectors))
    }

    /// Matches the title and a sample of body text against the keywords
    pub fn keyword_in(&self, title: &str, body_text: &str) -> Option<&str> {
        let sample: String = body_text.chars().take(TEXT_SAMPLE_CHARS).collect();
        let haystack = format!("{} {}", title, sample).to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| haystack.contains(keyword.as_str()))
            .map(String::as_str)
    }

    /// Inspects a loaded page
    ///
    /// # Returns
    ///
    /// * `Some(reason)` - The page looks like a challenge or block page
    /// * `None` - No signature matched
    pub async fn detect(&self, page: &dyn BrowserPage, title: &str) -> Option<String> {
        let body_text = match page.inner_text("body").await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Block detection could not read body text: {}", e);
                String::new()
            }
        };

        if let Some(keyword) = self.keyword_in(title, &body_text) {
            return Some(format!("keyword '{}'", keyword));
        }

        for selector in &self.selectors {
            match page.count(selector).await {
                Ok(count) if count > 0 => return Some(format!("selector '{}'", selector)),
                Ok(_) => {}
                Err(e) => tracing::debug!("Block selector {} failed: {}", selector, e),
            }
        }

        None
    }
}
