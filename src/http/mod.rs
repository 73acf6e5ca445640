//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup)
//!     → request.rs (request ID)
//!     → latest.rs (capture, then badge rewrite on the way back)
//!         → server.rs forward_upstream (page renderer)
//!         ← capture.rs (buffered body)
//!         ← rewrite.rs (extract, classify, substitute)
//!     → delivery.rs (watch the write to the client)
//!     → Send to client
//! ```

pub mod capture;
pub mod delivery;
pub mod latest;
pub mod request;
pub mod rewrite;
pub mod server;

pub use capture::CapturedResponse;
pub use latest::{LatestVersion, LatestVersionLayer};
pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use rewrite::{LatestClass, LatestInfo};
pub use server::HttpServer;
