//! Latest-version badge middleware.
//!
//! # Data Flow
//! ```text
//! request
//!     → inner service renders the page
//!     → capture.rs buffers the whole body
//!     → rewrite.rs looks for version metadata
//!         no match → body forwarded unchanged
//!         match    → resolver → classify → substitute placeholders
//!     → final body handed to the client once
//! ```
//!
//! # Design Decisions
//! - Rewriting only starts after the inner body is fully read
//! - Each lookup is bounded by a deadline; a late answer counts as unknown
//! - Failures while reading the body are logged and the partial body is
//!   delivered; the status line was already decided by the inner service
//! - The final body is wrapped in a `DeliveryBody`, so a client that goes
//!   away mid-write is logged too (HEAD responses carry no body to watch)

use std::borrow::Cow;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{Method, Request, Response};
use axum::BoxError;
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::http::capture::CapturedResponse;
use crate::http::delivery::DeliveryBody;
use crate::http::request::{RequestId, RequestIdExt};
use crate::http::rewrite::{substitute, LatestClass, LatestInfo};
use crate::observability::metrics;
use crate::resolver::LatestResolver;

const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Layer that applies [`LatestVersion`].
#[derive(Clone)]
pub struct LatestVersionLayer {
    resolver: Arc<dyn LatestResolver>,
    resolve_timeout: Duration,
}

impl LatestVersionLayer {
    pub fn new(resolver: Arc<dyn LatestResolver>) -> Self {
        Self {
            resolver,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Deadline for a single resolver call.
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }
}

impl<S> Layer<S> for LatestVersionLayer {
    type Service = LatestVersion<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LatestVersion {
            inner,
            resolver: self.resolver.clone(),
            resolve_timeout: self.resolve_timeout,
        }
    }
}

/// Fills in the latest-version badge of every page the inner service renders.
#[derive(Clone)]
pub struct LatestVersion<S> {
    inner: S,
    resolver: Arc<dyn LatestResolver>,
    resolve_timeout: Duration,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LatestVersion<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let resolver = self.resolver.clone();
        let resolve_timeout = self.resolve_timeout;
        let request_id = request.request_id().cloned();
        let watch_delivery = request.method() != Method::HEAD;

        Box::pin(async move {
            let response = inner.call(request).await?.map(Body::new);
            let response = rewrite_response(
                response,
                resolver.as_ref(),
                resolve_timeout,
                request_id.as_ref(),
            )
            .await;
            if !watch_delivery {
                return Ok(response);
            }
            let request_id = request_id.as_ref().map(RequestId::as_str).unwrap_or("-");
            Ok(response.map(|body| Body::new(DeliveryBody::new(body, request_id))))
        })
    }
}

/// Capture `response`, fill in the badge placeholders and rebuild it.
pub async fn rewrite_response(
    response: Response<Body>,
    resolver: &dyn LatestResolver,
    resolve_timeout: Duration,
    request_id: Option<&RequestId>,
) -> Response<Body> {
    let request_id = request_id.map(RequestId::as_str).unwrap_or("-");
    let captured = CapturedResponse::capture(response).await;

    if let Some(e) = captured.error() {
        tracing::error!(
            request_id = %request_id,
            captured_bytes = captured.bytes().len(),
            error = %e,
            "LatestVersion, reading response body"
        );
        metrics::record_capture_error();
    }

    let Some(info) = LatestInfo::extract(captured.bytes()) else {
        metrics::record_passthrough();
        return captured.into_response();
    };

    let latest_version = resolve(resolver, &info, resolve_timeout, request_id).await;
    let class = LatestClass::classify(&info.version, &latest_version);

    tracing::debug!(
        request_id = %request_id,
        module_path = %info.module_path,
        package_path = %info.package_path,
        version = %info.version,
        latest_version = %latest_version,
        class = %class,
        "Latest version badge resolved"
    );
    metrics::record_rewrite(class);

    let rewritten = match substitute(captured.bytes(), class, &latest_version) {
        Cow::Owned(body) => Some(body),
        Cow::Borrowed(_) => None,
    };
    match rewritten {
        Some(body) => captured.into_rewritten(body),
        None => captured.into_response(),
    }
}

async fn resolve(
    resolver: &dyn LatestResolver,
    info: &LatestInfo,
    timeout: Duration,
    request_id: &str,
) -> String {
    let start = Instant::now();
    let lookup = resolver.latest(&info.module_path, &info.package_path);
    match tokio::time::timeout(timeout, lookup).await {
        Ok(latest_version) => {
            metrics::record_resolve(start, false);
            latest_version
        }
        Err(_) => {
            metrics::record_resolve(start, true);
            tracing::warn!(
                request_id = %request_id,
                module_path = %info.module_path,
                package_path = %info.package_path,
                timeout_ms = timeout.as_millis() as u64,
                "Latest version lookup timed out"
            );
            String::new()
        }
    }
}
