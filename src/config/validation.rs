//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. Every problem is reported, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GateConfig, QuotaConfig, HEALTH_PATH, PLACEHOLDER_API_KEY};

/// Longest window, lookback or retention the gate accepts.
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 3600;

/// A single semantic problem in a config.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a parsed config.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.upstream.address.trim().is_empty() {
        errors.push(ValidationError::new("upstream.address", "must not be empty"));
    } else if config.upstream.address.contains('/') {
        errors.push(ValidationError::new(
            "upstream.address",
            "expected host:port without scheme or path",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    check_quota(&mut errors, "rate_limit.auth", &config.rate_limit.auth);
    check_quota(&mut errors, "rate_limit.search", &config.rate_limit.search);
    check_quota(&mut errors, "rate_limit.api", &config.rate_limit.api);

    let routes = &config.routes;
    for (field, paths) in [
        ("routes.auth_prefixes", &routes.auth_prefixes),
        ("routes.search_prefixes", &routes.search_prefixes),
        ("routes.exempt_paths", &routes.exempt_paths),
    ] {
        for path in paths {
            check_path(&mut errors, field, path);
        }
    }
    check_path(&mut errors, "routes.registration_path", &routes.registration_path);
    check_path(&mut errors, "routes.form_token_path", &routes.form_token_path);
    // Both are served by the gate's own router and must not collide.
    if routes.form_token_path == routes.registration_path || routes.form_token_path == HEALTH_PATH {
        errors.push(ValidationError::new(
            "routes.form_token_path",
            "must differ from registration_path and /health",
        ));
    }
    if routes.registration_path == HEALTH_PATH {
        errors.push(ValidationError::new("routes.registration_path", "must not be /health"));
    }

    let bot = &config.bot_protection;
    if bot.min_fill_secs < 0.0 {
        errors.push(ValidationError::new("bot_protection.min_fill_secs", "must not be negative"));
    }
    if bot.max_fill_secs <= bot.min_fill_secs {
        errors.push(ValidationError::new(
            "bot_protection.max_fill_secs",
            "must be greater than min_fill_secs",
        ));
    }
    if bot.block_threshold == 0 {
        errors.push(ValidationError::new("bot_protection.block_threshold", "must be greater than 0"));
    }
    if bot.block_window_secs == 0 {
        errors.push(ValidationError::new("bot_protection.block_window_secs", "must be greater than 0"));
    }
    check_max_window(&mut errors, "bot_protection.block_window_secs", bot.block_window_secs);

    let headers = &config.security_headers;
    for (field, sources) in [
        ("security_headers.script_sources", &headers.script_sources),
        ("security_headers.connect_sources", &headers.connect_sources),
        ("security_headers.frame_sources", &headers.frame_sources),
    ] {
        for source in sources {
            if source.is_empty()
                || source.contains(';')
                || source.chars().any(|c| c.is_whitespace() || c.is_control())
            {
                errors.push(ValidationError::new(
                    field,
                    format!("invalid CSP source {:?}", source),
                ));
            }
        }
    }

    if config.maintenance.enabled && config.maintenance.interval_secs == 0 {
        errors.push(ValidationError::new("maintenance.interval_secs", "must be greater than 0"));
    }
    check_max_window(
        &mut errors,
        "maintenance.violation_retention_secs",
        config.maintenance.violation_retention_secs,
    );
    if config.maintenance.violation_retention_secs < bot.block_window_secs {
        errors.push(ValidationError::new(
            "maintenance.violation_retention_secs",
            "must cover bot_protection.block_window_secs",
        ));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address {:?}", value)));
    }
}

fn check_quota(errors: &mut Vec<ValidationError>, field: &str, quota: &QuotaConfig) {
    if quota.max_requests == 0 {
        errors.push(ValidationError::new(field, "max_requests must be greater than 0"));
    }
    if quota.window_secs == 0 {
        errors.push(ValidationError::new(field, "window_secs must be greater than 0"));
    }
    if quota.window_secs > MAX_WINDOW_SECS {
        errors.push(ValidationError::new(field, format!("window_secs must not exceed {}", MAX_WINDOW_SECS)));
    }
}

fn check_max_window(errors: &mut Vec<ValidationError>, field: &str, secs: u64) {
    if secs > MAX_WINDOW_SECS {
        errors.push(ValidationError::new(field, format!("must not exceed {}", MAX_WINDOW_SECS)));
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: &str, path: &str) {
    if !path.starts_with('/') {
        errors.push(ValidationError::new(field, format!("path {:?} must start with '/'", path)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GateConfig::default();
        config.rate_limit.search.max_requests = 0;
        config.rate_limit.api.window_secs = 0;
        config.bot_protection.max_fill_secs = 1.0;
        config.routes.registration_path = "api/register".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"rate_limit.search"));
        assert!(fields.contains(&"rate_limit.api"));
        assert!(fields.contains(&"bot_protection.max_fill_secs"));
        assert!(fields.contains(&"routes.registration_path"));
    }

    #[test]
    fn test_gate_owned_paths_must_not_collide() {
        let mut config = GateConfig::default();
        config.routes.form_token_path = config.routes.registration_path.clone();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "routes.form_token_path");
    }

    #[test]
    fn test_windows_are_bounded() {
        let mut config = GateConfig::default();
        config.rate_limit.auth.window_secs = MAX_WINDOW_SECS + 1;
        config.bot_protection.block_window_secs = 10_000_000_000_000;
        config.maintenance.violation_retention_secs = 10_000_000_000_000;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "rate_limit.auth",
                "bot_protection.block_window_secs",
                "maintenance.violation_retention_secs",
            ]
        );

        config.rate_limit.auth.window_secs = MAX_WINDOW_SECS;
        config.bot_protection.block_window_secs = MAX_WINDOW_SECS;
        config.maintenance.violation_retention_secs = MAX_WINDOW_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_requires_real_key() {
        let mut config = GateConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");

        config.admin.api_key = "s3cret".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_header_injection_in_csp() {
        let mut config = GateConfig::default();
        config.security_headers.script_sources.push("https://a.example; script-src *".into());
        assert!(validate_config(&config).is_err());
    }
}
