//! Request ID propagation.
//!
//! # Responsibilities
//! - Keep an incoming `x-request-id`, or generate a UUID v4
//! - Expose the id to inner services through request extensions
//! - Forward the id upstream and echo it on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Ids that are not valid header values are replaced, not rejected

use std::fmt;
use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(HeaderValue);

impl RequestId {
    pub fn generate() -> Self {
        let id = Uuid::new_v4().to_string();
        // A hyphenated UUID is always a valid header value.
        Self(HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("unknown")))
    }

    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or("unknown")
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access to the [`RequestId`] stored on a request.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Layer that applies [`RequestIdService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let id = request
            .headers()
            .get(&X_REQUEST_ID)
            .filter(|v| v.to_str().map(|s| !s.is_empty()).unwrap_or(false))
            .cloned()
            .map(RequestId)
            .unwrap_or_else(RequestId::generate);

        request
            .headers_mut()
            .insert(X_REQUEST_ID, id.header_value().clone());
        request.extensions_mut().insert(id.clone());

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            response
                .headers_mut()
                .insert(X_REQUEST_ID, id.header_value().clone());
            Ok(response)
        })
    }
}
