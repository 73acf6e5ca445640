//! Response capture.
//!
//! # Responsibilities
//! - Buffer the whole body an inner service produces, in order
//! - Keep status and headers as the response head, unbuffered
//! - Rebuild the client-facing response exactly once
//!
//! # Design Decisions
//! - A body stream error stops the capture; bytes read so far are kept and
//!   delivered as-is (best effort, possibly truncated)
//! - A replaced or truncated body gets its framing headers fixed up

use axum::body::{Body, Bytes};
use axum::http::{header, response::Parts, HeaderValue};
use axum::response::Response;
use bytes::BytesMut;
use futures_util::StreamExt;

/// A response whose body has been fully read into memory.
#[derive(Debug)]
pub struct CapturedResponse {
    parts: Parts,
    body: BytesMut,
    error: Option<axum::Error>,
}

impl CapturedResponse {
    /// Create an empty capture for the given response head.
    pub fn new(parts: Parts) -> Self {
        Self {
            parts,
            body: BytesMut::new(),
            error: None,
        }
    }

    /// Drain `response`'s body into a new capture.
    pub async fn capture(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let mut captured = Self::new(parts);

        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => captured.write(&chunk),
                Err(e) => {
                    captured.error = Some(e);
                    break;
                }
            }
        }
        captured
    }

    /// Append body bytes.
    pub fn write(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    /// Everything captured so far.
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Whether the inner body failed before it was fully read.
    pub fn is_truncated(&self) -> bool {
        self.error.is_some()
    }

    /// The error that interrupted the capture, if any.
    pub fn error(&self) -> Option<&axum::Error> {
        self.error.as_ref()
    }

    /// Deliver the captured body unchanged.
    pub fn into_response(mut self) -> Response {
        // The body is fully buffered now; let the server pick the framing.
        self.parts.headers.remove(header::TRANSFER_ENCODING);
        if self.is_truncated() {
            self.parts.headers.remove(header::CONTENT_LENGTH);
        }
        Response::from_parts(self.parts, Body::from(self.body.freeze()))
    }

    /// Deliver `body` in place of the captured one.
    pub fn into_rewritten(mut self, body: impl Into<Bytes>) -> Response {
        let body = body.into();
        self.parts.headers.remove(header::TRANSFER_ENCODING);
        self.parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        Response::from_parts(self.parts, Body::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use futures_util::stream;

    fn response(body: Body) -> Response {
        Response::builder()
            .status(StatusCode::CREATED)
            .header("x-page", "details")
            .header(header::TRANSFER_ENCODING, "chunked")
            .header(header::CONTENT_LENGTH, "11")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_capture_keeps_chunk_order_and_head() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hello")),
            Ok(Bytes::from_static(b" ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let captured =
            CapturedResponse::capture(response(Body::from_stream(stream::iter(chunks)))).await;

        assert_eq!(captured.bytes(), b"hello world");
        assert!(!captured.is_truncated());

        let out = captured.into_response();
        assert_eq!(out.status(), StatusCode::CREATED);
        assert_eq!(out.headers()["x-page"], "details");
        assert_eq!(out.headers()[header::CONTENT_LENGTH], "11");
        assert!(out.headers().get(header::TRANSFER_ENCODING).is_none());
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_capture_stops_at_stream_error() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hello")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"never")),
        ];
        let captured =
            CapturedResponse::capture(response(Body::from_stream(stream::iter(chunks)))).await;

        assert_eq!(captured.bytes(), b"hello");
        assert!(captured.is_truncated());
        assert!(captured.error().is_some());

        let out = captured.into_response();
        assert!(out.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(out.headers()["x-page"], "details");
    }

    #[tokio::test]
    async fn test_rewritten_body_fixes_content_length() {
        let captured = CapturedResponse::capture(response(Body::from("hello world"))).await;
        let out = captured.into_rewritten(b"hi".to_vec());

        assert_eq!(out.status(), StatusCode::CREATED);
        assert_eq!(out.headers()[header::CONTENT_LENGTH], "2");
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hi");
    }
}
