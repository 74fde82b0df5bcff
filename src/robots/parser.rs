//! Robots.txt directive matching
//!
//! Allow/Disallow evaluation is delegated to the robotstxt crate; Crawl-delay,
//! which that crate does not expose, is parsed here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Extracts the product token robots.txt groups are matched against
///
/// `EmailScraperBot/1.1 (+http://example.com/bot-info)` becomes `EmailScraperBot`.
pub fn agent_token(user_agent: &str) -> &str {
    let token = user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    if token.is_empty() {
        "*"
    } else {
        token
    }
}

/// Parsed robots.txt for one host
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt body (empty means allow all)
    content: String,
    allow_all: bool,
}

impl ParsedRobots {
    /// Wraps a fetched robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// A permissive policy, used when robots.txt is absent or unreachable
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns true if this policy came from a real robots.txt body
    pub fn has_rules(&self) -> bool {
        !self.allow_all && !self.content.trim().is_empty()
    }

    /// Checks if a URL may be fetched by the given agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check
    /// * `user_agent` - Full user agent identifier; only its product token is matched
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If a matching group disallows it
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if !self.has_rules() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent_token(user_agent), url)
    }

    /// Gets the Crawl-delay that applies to the given agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        if !self.has_rules() {
            return None;
        }

        let token = agent_token(user_agent).to_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_agent_lines = false;
        let mut wildcard_delay: Option<f64> = None;
        let mut agent_delay: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                // Consecutive User-agent lines share one group
                if !in_agent_lines {
                    group_agents.clear();
                }
                group_agents.push(value.to_lowercase());
                in_agent_lines = true;
                continue;
            }
            in_agent_lines = false;

            if key == "crawl-delay" {
                let Ok(delay) = value.parse::<f64>() else {
                    continue;
                };
                if delay.is_sign_negative() || !delay.is_finite() {
                    continue;
                }
                let names_agent = group_agents
                    .iter()
                    .any(|ua| !ua.is_empty() && ua != "*" && token.contains(ua.as_str()));
                if names_agent {
                    agent_delay = Some(delay);
                } else if group_agents.iter().any(|ua| ua == "*") {
                    wildcard_delay = Some(delay);
                }
            }
        }

        agent_delay.or(wildcard_delay).map(Duration::from_secs_f64)
    }
}
