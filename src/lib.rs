//! Latest-version badge proxy.
//!
//! Sits in front of a page renderer, captures every rendered page, and fills
//! in the "is this the latest version" badge before the page reaches the
//! client. The badge logic is also usable on its own as a tower layer:
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use latest_proxy::http::LatestVersionLayer;
//! use latest_proxy::resolver::StaticResolver;
//!
//! let resolver = Arc::new(StaticResolver::default());
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "<html>...</html>" }))
//!     .layer(LatestVersionLayer::new(resolver));
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resolver;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
