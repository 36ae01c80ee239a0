use crate::config::types::{Config, DatabaseConfig, IndexConfig, UserAgentConfig, WorkerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_worker_config(&config.worker)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_database_config(&config.database)?;
    validate_index_config(&config.index)?;
    Ok(())
}

/// Validates worker loop configuration
fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.default_cache_age == 0 {
        return Err(ConfigError::Validation(
            "default_cache_age must be a positive number of seconds".to_string(),
        ));
    }

    if config.idle_poll_interval < 100 {
        return Err(ConfigError::Validation(format!(
            "idle_poll_interval must be >= 100ms, got {}ms",
            config.idle_poll_interval
        )));
    }

    if config.scheme != "https" && config.scheme != "http" {
        return Err(ConfigError::Validation(format!(
            "scheme must be 'https' or 'http', got '{}'",
            config.scheme
        )));
    }

    if let Some(holder) = &config.holder_id {
        if holder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "holder_id cannot be blank".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates index service configuration
fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    let host = Url::parse(&config.host)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid index host: {}", e)))?;

    if host.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "Index host '{}' cannot be used as a base URL",
            config.host
        )));
    }

    for (field, value) in [("index", &config.index), ("pipeline", &config.pipeline)] {
        if value.is_empty() || value.contains('/') {
            return Err(ConfigError::Validation(format!(
                "index {} must be a non-empty name without '/', got '{}'",
                field, value
            )));
        }
    }

    if config.timeout == 0 {
        return Err(ConfigError::Validation(
            "index timeout must be > 0ms".to_string(),
        ));
    }

    if config.password_env.is_some() && config.username.is_none() {
        return Err(ConfigError::Validation(
            "index password_env requires a username".to_string(),
        ));
    }

    Ok(())
}
