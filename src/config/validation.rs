use crate::config::types::{Config, CrawlerConfig, OutputConfig, QueueConfig, TimeoutConfig};
use crate::url::compile_anchored;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_timeouts(&config.timeouts)?;
    validate_queue_config(&config.queue)?;
    validate_output_config(&config.output)?;
    validate_seed_urls(&config.crawler.seed_urls)?;
    validate_patterns(&config.crawler.allowed_domains)?;
    validate_patterns(&config.crawler.exclude_patterns)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be >= 1, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.batch_worker_divisor < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_worker_divisor must be >= 1, got {}",
            config.batch_worker_divisor
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates timeout configuration
fn validate_timeouts(config: &TimeoutConfig) -> Result<(), ConfigError> {
    if config.poll_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "poll_timeout_ms must be >= 1".to_string(),
        ));
    }

    if config.fetch_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms must be >= 1".to_string(),
        ));
    }

    if config.robots_timeout_ms < 1 || config.robots_timeout_ms > config.fetch_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "robots_timeout_ms must be between 1 and fetch_timeout_ms ({}), got {}",
            config.fetch_timeout_ms, config.robots_timeout_ms
        )));
    }

    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates seed URLs: each must parse and use http or https
fn validate_seed_urls(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }
    Ok(())
}

/// Validates that every pattern compiles as a regex
fn validate_patterns(patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        compile_anchored(pattern)?;
    }
    Ok(())
}
