//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the latest-version proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Page renderer the proxy forwards to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Latest-version resolver selection.
    pub resolver: ResolverConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream page renderer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the renderer (e.g., "http://127.0.0.1:3000").
    pub url: String,

    /// Drop `Accept-Encoding` on forwarded requests so pages come back
    /// uncompressed and can be inspected.
    pub strip_accept_encoding: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            strip_accept_encoding: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for a single latest-version lookup in milliseconds.
    pub resolve_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            resolve_ms: 2000,
        }
    }
}

/// Which resolver answers "what is the latest version".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// Query a Go module proxy.
    #[default]
    GoProxy,
    /// Look versions up in a local TOML table.
    Static,
    /// Never resolve; every badge renders as unknown.
    Disabled,
}

/// Resolver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub kind: ResolverKind,

    /// Base URL of the module proxy (kind = "go_proxy").
    pub proxy_url: String,

    /// Path of the versions table (kind = "static").
    pub versions_path: Option<String>,

    /// Reload the versions table when the file changes.
    pub watch: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            kind: ResolverKind::GoProxy,
            proxy_url: crate::resolver::go_proxy::DEFAULT_BASE_URL.to_string(),
            versions_path: None,
            watch: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.resolver.kind, ResolverKind::GoProxy);
        assert_eq!(config.timeouts.resolve_ms, 2000);
        assert!(config.upstream.strip_accept_encoding);
    }

    #[test]
    fn test_partial_sections() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [resolver]
            kind = "static"
            versions_path = "versions.toml"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.resolver.kind, ResolverKind::Static);
        assert_eq!(config.resolver.versions_path.as_deref(), Some("versions.toml"));
        assert_eq!(config.resolver.proxy_url, "https://proxy.golang.org");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
