use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream(config)?;
    validate_client(config)?;
    validate_log_level(config)?;
    validate_system_prompt(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    if !is_http_url(&upstream.base_url) {
        return Err(validation_err(
            "upstream.base_url must start with http:// or https://",
        ));
    }
    if upstream.model.trim().is_empty() {
        return Err(validation_err("upstream.model cannot be empty"));
    }
    if upstream.api_key.is_none() && upstream.api_key_env.trim().is_empty() {
        return Err(validation_err(
            "upstream.api_key_env cannot be empty when upstream.api_key is not set",
        ));
    }
    Ok(())
}

fn validate_client(config: &AppConfig) -> Result<(), ConfigError> {
    let client = &config.client;
    if !is_http_url(&client.chat_url) {
        return Err(validation_err(
            "client.chat_url must start with http:// or https://",
        ));
    }
    if client.max_buffered_bytes == 0 {
        return Err(validation_err(
            "client.max_buffered_bytes must be greater than 0",
        ));
    }
    Ok(())
}

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "TRACE", "DISABLED",
];

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level '{}' is invalid. Must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}

fn validate_system_prompt(config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(prompt) = config.features.system_prompt.as_deref() {
        if prompt.trim().is_empty() {
            return Err(validation_err(
                "features.system_prompt cannot be blank when set",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, FeaturesConfig, ServerConfig, UpstreamConfig};

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: UpstreamConfig {
                base_url: "https://gateway.example/v1".to_string(),
                model: "google/gemini-2.5-flash".to_string(),
                api_key: Some("k".to_string()),
                api_key_env: "AI_GATEWAY_API_KEY".to_string(),
            },
            client: ClientConfig {
                chat_url: "http://127.0.0.1:8000/functions/v1/medical-chat".to_string(),
                publishable_key: "pk".to_string(),
                max_buffered_bytes: 1024,
            },
            features: FeaturesConfig::default(),
        }
    }

    fn validation_message(config: &AppConfig) -> String {
        match validate_config(config) {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let mut config = valid_config();
        config.upstream.base_url = "ftp://gateway".to_string();
        assert!(validation_message(&config).contains("upstream.base_url"));

        let mut config = valid_config();
        config.client.chat_url = "gateway/medical-chat".to_string();
        assert!(validation_message(&config).contains("client.chat_url"));
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = valid_config();
        config.client.max_buffered_bytes = 0;
        assert!(validation_message(&config).contains("max_buffered_bytes"));

        let mut config = valid_config();
        config.server.http_pool_max_idle_per_host = 0;
        assert!(validation_message(&config).contains("http_pool_max_idle_per_host"));

        let mut config = valid_config();
        config.server.runtime_worker_threads = Some(0);
        assert!(validation_message(&config).contains("runtime_worker_threads"));
    }

    #[test]
    fn test_rejects_unknown_log_level_and_blank_prompt() {
        let mut config = valid_config();
        config.features.log_level = "verbose".to_string();
        assert!(validation_message(&config).contains("log_level"));

        let mut config = valid_config();
        config.features.log_level = "warning".to_string();
        config.features.system_prompt = Some("  ".to_string());
        assert!(validation_message(&config).contains("system_prompt"));
    }
}
