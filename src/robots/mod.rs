//! Robots.txt handling module
//!
//! This module provides fetching, parsing, and per-host caching of robots.txt.
//! Fetch failures fail open: a host whose robots.txt cannot be read is
//! treated as allowing everything, and the failure is logged as a warning.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::{agent_token, ParsedRobots};

use reqwest::Client;

/// Fetches robots.txt for an origin
///
/// # Arguments
///
/// * `client` - HTTP client (its timeout bounds the fetch)
/// * `origin` - Scheme, host and port, e.g. `https://example.com`
///
/// # Returns
///
/// The parsed policy, or an allow-all policy when the file is missing or the
/// fetch fails
pub async fn fetch_robots(client: &Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %robots_url, "Failed to fetch robots.txt, allowing all: {}", e);
            return ParsedRobots::allow_all();
        }
    };

    let status = response.status();
    if status.is_server_error() {
        tracing::warn!(url = %robots_url, "robots.txt returned HTTP {}, allowing all", status.as_u16());
        return ParsedRobots::allow_all();
    }
    if !status.is_success() {
        tracing::debug!("No robots.txt at {} (HTTP {})", robots_url, status.as_u16());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Fetched robots.txt from {} ({} bytes)", robots_url, body.len());
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            tracing::warn!(url = %robots_url, "Failed to read robots.txt body, allowing all: {}", e);
            ParsedRobots::allow_all()
        }
    }
}
