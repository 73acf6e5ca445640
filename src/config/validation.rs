//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs parse
//! - Validate value ranges (timeouts > 0)
//! - Check the resolver has what its kind needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, ResolverKind};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid http(s) url {value:?}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("resolver.versions_path is required when resolver.kind = \"static\"")]
    MissingVersionsPath,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    check_url(&mut errors, "upstream.url", &config.upstream.url);

    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.resolve_ms", config.timeouts.resolve_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout { field });
        }
    }

    match config.resolver.kind {
        ResolverKind::GoProxy => {
            check_url(&mut errors, "resolver.proxy_url", &config.resolver.proxy_url)
        }
        ResolverKind::Static => {
            if config.resolver.versions_path.as_deref().map_or(true, str::is_empty) {
                errors.push(ValidationError::MissingVersionsPath);
            }
        }
        ResolverKind::Disabled => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let ok = Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false);
    if !ok {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}
