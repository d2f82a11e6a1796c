//! Environment variable overlay.
//!
//! Environment values win over file values. The lookup is injected so tests
//! never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use crate::config::loader::ConfigError;
use crate::config::schema::AppConfig;

pub const APP_CONFIG: &str = "APP_CONFIG";
pub const FRONTEND_URL: &str = "FRONTEND_URL";
pub const UPLOAD_DIR: &str = "UPLOAD_DIR";
pub const PORT: &str = "PORT";
pub const HOST: &str = "HOST";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const METRICS_ADDRESS: &str = "METRICS_ADDRESS";

/// Apply recognised environment variables on top of `config`.
///
/// Empty values are treated as unset.
pub fn apply_env<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(FRONTEND_URL) {
        config.cors.frontend_url = Some(url);
    }
    if let Some(dir) = get(UPLOAD_DIR) {
        config.uploads.dir = PathBuf::from(dir);
    }
    if let Some(port) = get(PORT) {
        config.listener.port = parse(PORT, &port)?;
    }
    if let Some(host) = get(HOST) {
        config.listener.host = host;
    }
    if let Some(level) = get(LOG_LEVEL) {
        config.observability.log_level = level;
    }
    if let Some(secs) = get(REQUEST_TIMEOUT_SECS) {
        config.timeouts.request_secs = parse(REQUEST_TIMEOUT_SECS, &secs)?;
    }
    if let Some(addr) = get(METRICS_ADDRESS) {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = addr;
    }

    Ok(config)
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        reason: e.to_string(),
    })
}
