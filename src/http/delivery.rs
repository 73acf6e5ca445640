//! Client-facing body delivery.
//!
//! Once a response leaves the middleware, hyper owns the write. The body
//! handed to it is wrapped so that a connection torn down before the last
//! frame was taken is still reported.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use http_body::{Frame, SizeHint};

use crate::observability::metrics;

/// Body that logs when it is dropped before reaching end of stream.
pub struct DeliveryBody {
    inner: Body,
    request_id: String,
    expected: Option<u64>,
    sent: u64,
    finished: bool,
}

impl DeliveryBody {
    pub fn new(inner: Body, request_id: impl Into<String>) -> Self {
        let expected = inner.size_hint().exact();
        Self {
            inner,
            request_id: request_id.into(),
            expected,
            sent: 0,
            finished: false,
        }
    }
}

impl HttpBody for DeliveryBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let frame = match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(frame) => frame,
        };
        match &frame {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.sent += data.len() as u64;
                }
            }
            Some(Err(e)) => {
                tracing::error!(
                    request_id = %this.request_id,
                    sent_bytes = this.sent,
                    error = %e,
                    "LatestVersion, writing response body"
                );
                metrics::record_delivery_failure();
                this.finished = true;
            }
            None => this.finished = true,
        }
        Poll::Ready(frame)
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for DeliveryBody {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::error!(
            request_id = %self.request_id,
            sent_bytes = self.sent,
            expected_bytes = ?self.expected,
            "LatestVersion, writing response body: client went away before the body was delivered"
        );
        metrics::record_delivery_failure();
    }
}
