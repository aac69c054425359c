//! Configuration validation with aggregated errors.
//! Every issue is collected so that a broken config is reported once, in full.

use crate::config::settings::{KeeperConfig, RetryConfig, ServiceConfig, SettingsConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_keeper(&cfg.keeper, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' is not one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }

    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }

    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host is empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' is not a valid port",
            settings.server.port
        ));
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts() == 0 {
        errors.push("settings.retry.attempts must be at least 1".to_string());
    }
    if retry.max_delay_ms() < retry.base_delay_ms() {
        errors.push(format!(
            "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
            retry.max_delay_ms(),
            retry.base_delay_ms()
        ));
    }
}

fn validate_keeper(keeper: &KeeperConfig, errors: &mut Vec<String>) {
    if keeper.name.trim().is_empty() {
        errors.push("keeper.name is empty".to_string());
    }

    if keeper.interval_ms == Some(0) {
        errors.push(
            "keeper.interval_ms must be positive (use -1 or omit it for a one-shot timer)".to_string(),
        );
    }

    if keeper.expires_after_seconds == Some(0) {
        errors.push("keeper.expires_after_seconds must be positive".to_string());
    }

    let source = &keeper.source;
    if source.url.trim().is_empty() {
        errors.push("keeper.source.url is empty".to_string());
    } else if !(source.url.starts_with("http://") || source.url.starts_with("https://")) {
        errors.push(format!(
            "keeper.source.url '{}' must be an http(s) URL",
            source.url
        ));
    }

    if source.timeout_ms == Some(0) {
        errors.push("keeper.source.timeout_ms must be positive".to_string());
    }
}
