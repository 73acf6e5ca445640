//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    check_config(&config)?;
    Ok(config)
}

/// Validate a configuration that did not come from [`load_config`], such as
/// the defaults or one edited by command-line overrides.
pub fn check_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    validate_config(config).map_err(ConfigError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [upstream]
            url = "http://127.0.0.1:4000"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.upstream.url, "http://127.0.0.1:4000");
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = parse_config(include_str!("../../latest-proxy.example.toml")).unwrap();
        assert_eq!(config.upstream.url, "http://127.0.0.1:3000");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = parse_config("[listener\nbind_address = 1");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_check_config_catches_overrides() {
        let mut config = ProxyConfig::default();
        assert!(check_config(&config).is_ok());

        config.listener.bind_address = "not-an-address".into();
        let err = check_config(&config).unwrap_err();
        assert!(err.to_string().contains("listener.bind_address"));
    }

    #[test]
    fn test_validation_error_message_lists_fields() {
        let err = parse_config("[timeouts]\nrequest_secs = 0\nresolve_ms = 0").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("timeouts.request_secs"));
        assert!(message.contains("timeouts.resolve_ms"));
    }
}
