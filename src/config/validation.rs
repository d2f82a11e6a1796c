//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! rules. Every failing rule is reported, not just the first.

use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::security::cors::normalize_origin;

/// Mount points owned by the HTTP pipeline.
const RESERVED_PREFIXES: [&str; 2] = ["/api", "/uploads"];

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::new(
            "listener.host",
            format!("'{}' is not an IP address", config.listener.host),
        ));
    }
    if config.listener.max_in_flight == 0 {
        errors.push(ValidationError::new("listener.max_in_flight", "must be greater than 0"));
    }

    if config.uploads.dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("uploads.dir", "must not be empty"));
    }

    if let Some(url) = &config.cors.frontend_url {
        if let Err(reason) = normalize_origin(url) {
            errors.push(ValidationError::new("cors.frontend_url", reason));
        }
    }

    if config.limits.json_body_bytes == 0 {
        errors.push(ValidationError::new("limits.json_body_bytes", "must be greater than 0"));
    }
    if config.limits.form_body_bytes == 0 {
        errors.push(ValidationError::new("limits.form_body_bytes", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let frame = config.security.frame_options.to_ascii_uppercase();
    if frame != "DENY" && frame != "SAMEORIGIN" {
        errors.push(ValidationError::new(
            "security.frame_options",
            "must be DENY or SAMEORIGIN",
        ));
    }

    let path = config.realtime.path.as_str();
    if !path.starts_with('/') || path == "/" {
        errors.push(ValidationError::new(
            "realtime.path",
            "must start with '/' and name a path",
        ));
    } else if RESERVED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
    {
        errors.push(ValidationError::new(
            "realtime.path",
            format!("'{path}' overlaps a pipeline mount point"),
        ));
    }
    if config.realtime.session_buffer == 0 {
        errors.push(ValidationError::new("realtime.session_buffer", "must be greater than 0"));
    }
    if config.realtime.max_message_bytes == 0 {
        errors.push(ValidationError::new(
            "realtime.max_message_bytes",
            "must be greater than 0",
        ));
    }
    if config.realtime.max_subscriptions == 0 {
        errors.push(ValidationError::new(
            "realtime.max_subscriptions",
            "must be greater than 0",
        ));
    }

    if config.scheduler.upload_retention_secs > 0 && config.scheduler.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "scheduler.sweep_interval_secs",
            "must be greater than 0 when upload_retention_secs is set",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }
    if tracing_subscriber::EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("'{}' is not a valid filter", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_failing_rule() {
        let mut config = AppConfig::default();
        config.listener.host = "not an ip".into();
        config.limits.json_body_bytes = 0;
        config.cors.frontend_url = Some("ftp://files.example.com".into());
        config.realtime.path = "/api/socket".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.host",
                "cors.frontend_url",
                "limits.json_body_bytes",
                "realtime.path"
            ]
        );
    }

    #[test]
    fn realtime_path_may_share_a_prefix_spelling() {
        let mut config = AppConfig::default();
        config.realtime.path = "/apisocket".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn subscription_cap_must_be_positive() {
        let mut config = AppConfig::default();
        config.realtime.max_subscriptions = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "realtime.max_subscriptions");
    }

    #[test]
    fn sweeper_needs_an_interval() {
        let mut config = AppConfig::default();
        config.scheduler.upload_retention_secs = 60;
        config.scheduler.sweep_interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "scheduler.sweep_interval_secs");
    }
}
