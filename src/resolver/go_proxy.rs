//! Go module proxy resolver.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::resolver::error::ResolveError;
use crate::resolver::LatestResolver;

/// Default base URL for Go proxy
pub const DEFAULT_BASE_URL: &str = "https://proxy.golang.org";

/// Response from the `@latest` endpoint.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(rename = "Version")]
    version: String,
}

/// Resolves the latest version of a module through `GET $base/$module/@latest`.
///
/// The proxy only knows about modules, so the package path is ignored.
pub struct GoProxyResolver {
    client: reqwest::Client,
    base_url: String,
}

impl GoProxyResolver {
    /// Creates a new GoProxyResolver with a custom base URL
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("latest-proxy/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the latest version the proxy reports for `module_path`.
    pub async fn fetch_latest(&self, module_path: &str) -> Result<String, ResolveError> {
        let url = format!("{}/{}/@latest", self.base_url, encode_module_path(module_path));

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        // Go proxy returns 404 or 410 for modules that don't exist
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(ResolveError::NotFound(module_path.to_string()));
        }

        if !status.is_success() {
            return Err(ResolveError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let latest: LatestResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::InvalidResponse(e.to_string()))?;

        Ok(latest.version)
    }
}

#[async_trait::async_trait]
impl LatestResolver for GoProxyResolver {
    async fn latest(&self, module_path: &str, _package_path: &str) -> String {
        if module_path.is_empty() {
            return String::new();
        }

        match self.fetch_latest(module_path).await {
            Ok(version) => version,
            Err(ResolveError::NotFound(module)) => {
                debug!(module_path = %module, "Module unknown to proxy");
                String::new()
            }
            Err(e) => {
                warn!(module_path = %module_path, error = %e, "Latest version lookup failed");
                String::new()
            }
        }
    }
}

/// Encodes a Go module path for use in proxy URLs.
/// Uppercase letters are escaped as !{lowercase}.
fn encode_module_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn resolver(url: &str) -> GoProxyResolver {
        GoProxyResolver::new(url, Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn latest_returns_version_from_proxy() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/golang.org/x/text/@latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Version":"v0.14.0","Time":"2023-10-11T18:14:32Z"}"#)
            .create_async()
            .await;

        let version = resolver(&server.url())
            .latest("golang.org/x/text", "golang.org/x/text/language")
            .await;

        mock.assert_async().await;
        assert_eq!(version, "v0.14.0");
    }

    #[tokio::test]
    async fn latest_escapes_uppercase_module_paths() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/github.com/!azure/azure-sdk-for-go/@latest")
            .with_status(200)
            .with_body(r#"{"Version":"v68.0.0+incompatible"}"#)
            .create_async()
            .await;

        let version = resolver(&server.url())
            .latest("github.com/Azure/azure-sdk-for-go", "github.com/Azure/azure-sdk-for-go")
            .await;

        mock.assert_async().await;
        assert_eq!(version, "v68.0.0+incompatible");
    }

    #[tokio::test]
    async fn fetch_latest_returns_not_found_for_gone_module() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/nonexistent/module/@latest")
            .with_status(410)
            .with_body("not found: module nonexistent/module: no matching versions")
            .create_async()
            .await;

        let resolver = resolver(&server.url());
        let result = resolver.fetch_latest("nonexistent/module").await;
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn latest_is_empty_on_server_error_and_bad_json() {
        let mut server = Server::new_async().await;

        let _broken = server
            .mock("GET", "/broken/mod/@latest")
            .with_status(500)
            .create_async()
            .await;
        let _garbled = server
            .mock("GET", "/garbled/mod/@latest")
            .with_status(200)
            .with_body("v1.0.0")
            .create_async()
            .await;

        let resolver = resolver(&server.url());
        assert_eq!(resolver.latest("broken/mod", "broken/mod").await, "");
        assert_eq!(resolver.latest("garbled/mod", "garbled/mod").await, "");
    }

    #[tokio::test]
    async fn latest_skips_lookup_for_empty_module() {
        let resolver = resolver("http://127.0.0.1:9");
        assert_eq!(resolver.latest("", "").await, "");
    }

    #[test]
    fn encode_module_path_escapes_uppercase() {
        assert_eq!(
            encode_module_path("github.com/BurntSushi/toml"),
            "github.com/!burnt!sushi/toml"
        );
        assert_eq!(encode_module_path("golang.org/x/text"), "golang.org/x/text");
    }
}
