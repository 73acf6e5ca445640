//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (latest-version badge, timeout, request ID, tracing)
//! - Forward page requests to the upstream renderer
//! - Serve until the shutdown signal fires

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::latest::LatestVersionLayer;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::resolver::LatestResolver;

/// Hop-by-hop headers, dropped in both directions.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// State shared by the upstream forwarding handler.
#[derive(Clone)]
pub struct UpstreamState {
    pub client: Client<HttpConnector, Body>,
    /// Renderer base URL without a trailing slash.
    pub base_url: Arc<str>,
    pub strip_accept_encoding: bool,
}

impl UpstreamState {
    pub fn new(config: &ProxyConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));

        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            base_url: Arc::from(config.upstream.url.trim_end_matches('/')),
            strip_accept_encoding: config.upstream.strip_accept_encoding,
        }
    }

    /// Renderer URI for the incoming request's path and query.
    fn target(&self, uri: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        Uri::from_str(&format!("{}{}", self.base_url, path_and_query))
    }
}

/// HTTP server fronting the page renderer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and resolver.
    pub fn new(config: ProxyConfig, resolver: Arc<dyn LatestResolver>) -> Self {
        let router = Self::build_router(&config, UpstreamState::new(&config), resolver);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ProxyConfig,
        state: UpstreamState,
        resolver: Arc<dyn LatestResolver>,
    ) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .fallback(forward_upstream)
            .with_state(state)
            .layer(
                LatestVersionLayer::new(resolver)
                    .resolve_timeout(Duration::from_millis(config.timeouts.resolve_ms)),
            )
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Forward a request to the page renderer and return its response as-is.
async fn forward_upstream(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    let request_id = request
        .request_id()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    let (mut parts, body) = request.into_parts();
    let target = match state.target(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                uri = %parts.uri,
                error = %e,
                "Bad upstream URI"
            );
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        target = %target,
        "Forwarding to renderer"
    );

    parts.uri = target;
    parts.headers.remove(header::HOST);
    strip_hop_by_hop(&mut parts.headers);
    if state.strip_accept_encoding {
        parts.headers.remove(header::ACCEPT_ENCODING);
    }

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(mut response) => {
            strip_hop_by_hop(response.headers_mut());
            response.map(Body::new)
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in listed.into_iter().chain(HOP_BY_HOP) {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NoopResolver;
    use tower::ServiceExt;

    #[test]
    fn test_target_keeps_path_and_query() {
        let mut config = ProxyConfig::default();
        config.upstream.url = "http://renderer:3000/".into();
        let state = UpstreamState::new(&config);

        let uri: Uri = "/golang.org/x/text?tab=versions".parse().unwrap();
        assert_eq!(
            state.target(&uri).unwrap(),
            "http://renderer:3000/golang.org/x/text?tab=versions"
        );
        assert_eq!(
            state.target(&Uri::from_static("http://proxy.local")).unwrap(),
            "http://renderer:3000/"
        );
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "close, X-Debug-Token".parse().unwrap());
        headers.insert("x-debug-token", "1".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::TRAILER, "x-checksum".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "text/html".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn test_healthz() {
        let server = HttpServer::new(ProxyConfig::default(), Arc::new(NoopResolver));
        let response = server
            .router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_unreachable_renderer_is_bad_gateway() {
        let mut config = ProxyConfig::default();
        // Port 9 (discard) is never listening in test environments.
        config.upstream.url = "http://127.0.0.1:9".into();
        let server = HttpServer::new(config, Arc::new(NoopResolver));

        let response = server
            .router()
            .oneshot(Request::get("/golang.org/x/text").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
