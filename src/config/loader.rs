//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::env::{apply_env, APP_CONFIG};
use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the process configuration.
///
/// Defaults, then the TOML file named by `APP_CONFIG` (if any), then the
/// environment overlay. Validation runs once on the merged result.
pub fn load_from_env<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match lookup(APP_CONFIG).filter(|p| !p.trim().is_empty()) {
        Some(path) => read_file(Path::new(&path))?,
        None => AppConfig::default(),
    };

    let config = apply_env(base, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("app-server-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn env_overrides_file_values() {
        let path = scratch_file("[listener]\nport = 7000\n\n[uploads]\ndir = \"/srv/files\"\n");
        let file = path.to_string_lossy().to_string();

        let config = load_from_env(|name| match name {
            "APP_CONFIG" => Some(file.clone()),
            "PORT" => Some("7100".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.listener.port, 7100);
        assert_eq!(config.uploads.dir, PathBuf::from("/srv/files"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_merged_config_is_rejected() {
        let err = load_from_env(|name| match name {
            "FRONTEND_URL" => Some("not a url".into()),
            _ => None,
        })
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors[0].field, "cors.frontend_url"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
