use crate::config::types::{
    Config, CrawlerConfig, ExtractionConfig, InputConfig, OutputConfig, PolitenessConfig,
    SessionConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Fatal problems are returned as errors; questionable but workable settings
/// are logged as warnings.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_input_config(&config.input)?;
    validate_crawler_config(&config.crawler)?;
    validate_session_config(&config.session)?;
    validate_politeness_config(&config.politeness)?;
    validate_extraction_config(&config.extraction)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.website_column.trim().is_empty() {
        return Err(ConfigError::Validation(
            "website-column cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.page_load_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "page-load-timeout-ms must be >= 1000ms, got {}ms",
            config.page_load_timeout_ms
        )));
    }

    if config.retry_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "retry-delay-ms must be >= 100ms, got {}ms",
            config.retry_delay_ms
        )));
    }

    if config.element_action_retry_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "element-action-retry-delay-ms must be >= 100ms, got {}ms",
            config.element_action_retry_delay_ms
        )));
    }

    if config.wait_for_selector_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "wait-for-selector-timeout-ms must be >= 100ms, got {}ms",
            config.wait_for_selector_timeout_ms
        )));
    }

    if let Some(selector) = &config.wait_for_selector {
        validate_selector("wait-for-selector", selector)?;
    }

    Ok(())
}

fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.use_proxies {
        if config.proxies.is_empty() {
            tracing::warn!("use-proxies is enabled but no proxies are configured; running without proxies");
        }
        for proxy in &config.proxies {
            Url::parse(proxy)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
        }
    }

    if config.use_user_agents && config.user_agents.is_empty() {
        tracing::warn!("use-user-agents is enabled but the list is empty; the browser default will be used");
    }

    Ok(())
}

fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.user_agent_identifier.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent-identifier cannot be empty".to_string(),
        ));
    }

    if config.robots_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "robots-timeout-ms must be >= 100ms, got {}ms",
            config.robots_timeout_ms
        )));
    }

    for selector in &config.block_selectors {
        validate_selector("block-selectors", selector)?;
    }

    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    for selector in &config.email_location_selectors {
        validate_selector("email-location-selectors", selector)?;
    }

    if config.email_attribute.trim().is_empty() {
        return Err(ConfigError::Validation(
            "email-attribute cannot be empty".to_string(),
        ));
    }

    if config.validate_domain_mx {
        tracing::warn!("MX validation is enabled; each new email domain costs a DNS lookup");
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.report_file_suffix.is_empty() && config.report_path.is_none() {
        return Err(ConfigError::Validation(
            "report-file-suffix cannot be empty unless report-path is set".to_string(),
        ));
    }

    if config.email_separator.is_empty() {
        return Err(ConfigError::Validation(
            "email-separator cannot be empty".to_string(),
        ));
    }

    if config.state_file.as_os_str().is_empty() {
        return Err(ConfigError::Validation("state-file cannot be empty".to_string()));
    }

    if config.error_log.as_os_str().is_empty() {
        return Err(ConfigError::Validation("error-log cannot be empty".to_string()));
    }

    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
    scraper::Selector::parse(selector).map_err(|e| {
        ConfigError::Validation(format!("Invalid selector '{}' in {}: {:?}", selector, field, e))
    })?;
    Ok(())
}
