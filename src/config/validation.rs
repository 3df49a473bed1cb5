use crate::config::types::{
    Config, CrawlerConfig, LockConfig, OutputConfig, SearchConfig, UserAgentConfig,
    MAX_JOB_INTERVAL_SECS, MAX_LOCK_TTL_SECS, MAX_PROCESSING_TIME_LIMIT_SECS,
};
use crate::url::LinkPatterns;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_search_config(&config.search)?;
    validate_lock_config(&config.lock)?;
    LinkPatterns::new(&config.links.ignore)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.site_batch_size < 1 {
        return Err(ConfigError::Validation(
            "site-batch-size must be >= 1".to_string(),
        ));
    }

    if config.page_batch_size < 1 {
        return Err(ConfigError::Validation(
            "page-batch-size must be >= 1".to_string(),
        ));
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter-min-ms ({}) must not exceed jitter-max-ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    if config.max_concurrent_partitions < 1 || config.max_concurrent_partitions > 256 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-partitions must be between 1 and 256, got {}",
            config.max_concurrent_partitions
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.default_refresh_hours < 1 {
        return Err(ConfigError::Validation(
            "default-refresh-hours must be >= 1".to_string(),
        ));
    }

    if config.processing_time_limit_secs > MAX_PROCESSING_TIME_LIMIT_SECS {
        return Err(ConfigError::Validation(format!(
            "processing-time-limit-secs must be <= {}, got {}",
            MAX_PROCESSING_TIME_LIMIT_SECS, config.processing_time_limit_secs
        )));
    }

    if config.cycle_interval_secs < 1 || config.cycle_interval_secs > MAX_JOB_INTERVAL_SECS {
        return Err(ConfigError::Validation(format!(
            "cycle-interval-secs must be between 1 and {}, got {}",
            MAX_JOB_INTERVAL_SECS, config.cycle_interval_secs
        )));
    }

    if config.background_interval_ms < 10
        || config.background_interval_ms / 1000 > MAX_JOB_INTERVAL_SECS
    {
        return Err(ConfigError::Validation(format!(
            "background-interval-ms must be between 10ms and {}s, got {}ms",
            MAX_JOB_INTERVAL_SECS, config.background_interval_ms
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if matches!(config.link_graph_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "link-graph-path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Discovery needs credentials; without them every tick would fail
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.api_key.as_deref().map_or(true, str::is_empty) {
        return Err(ConfigError::Missing(
            "search.api-key is required when search is enabled".to_string(),
        ));
    }

    if config.engine_id.as_deref().map_or(true, str::is_empty) {
        return Err(ConfigError::Missing(
            "search.engine-id is required when search is enabled".to_string(),
        ));
    }

    Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search api-url: {}", e)))?;

    if config.max_start_index < 1 {
        return Err(ConfigError::Validation(
            "search.max-start-index must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_lock_config(config: &LockConfig) -> Result<(), ConfigError> {
    if config.ttl_secs < 1 || config.ttl_secs > MAX_LOCK_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "lock.ttl-secs must be between 1 and {}, got {}",
            MAX_LOCK_TTL_SECS, config.ttl_secs
        )));
    }

    if matches!(config.instance_name.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "lock.instance-name cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
