//! Latest-version resolvers.
//!
//! # Data Flow
//! ```text
//! LatestVersion middleware
//!     → LatestResolver::latest(module path, package path)
//!         → go_proxy.rs     (GET $proxy/$module/@latest)
//!         → static_table.rs (TOML table, hot reloaded)
//!         → FnResolver      (embedding / tests)
//!         → NoopResolver    (always unknown)
//!     → version string, "" when unknown
//! ```
//!
//! # Design Decisions
//! - Resolvers never fail: lookup errors are logged and answered with ""
//! - Cancellation is dropping the future; the middleware bounds each call
//!   with a deadline

pub mod error;
pub mod go_proxy;
pub mod static_table;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;

use crate::config::{ProxyConfig, ResolverKind};

pub use error::{ResolveError, SetupError, TableError};
pub use go_proxy::GoProxyResolver;
pub use static_table::{StaticResolver, VersionTable};

/// Answers "what is the latest version of this module or package".
#[async_trait::async_trait]
pub trait LatestResolver: Send + Sync {
    /// Latest version for the given paths, or an empty string if unknown.
    async fn latest(&self, module_path: &str, package_path: &str) -> String;
}

/// Resolver wrapping an async closure.
pub struct FnResolver<F> {
    f: F,
}

/// Build a resolver from `f(module_path, package_path)`.
pub fn from_fn<F, Fut>(f: F) -> FnResolver<F>
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    FnResolver { f }
}

#[async_trait::async_trait]
impl<F, Fut> LatestResolver for FnResolver<F>
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    async fn latest(&self, module_path: &str, package_path: &str) -> String {
        (self.f)(module_path.to_string(), package_path.to_string()).await
    }
}

/// Resolver that never knows the latest version.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait::async_trait]
impl LatestResolver for NoopResolver {
    async fn latest(&self, _module_path: &str, _package_path: &str) -> String {
        String::new()
    }
}

/// A resolver together with whatever must stay alive for it to work.
pub struct ResolverHandle {
    pub resolver: Arc<dyn LatestResolver>,
    _watcher: Option<RecommendedWatcher>,
}

impl ResolverHandle {
    pub fn new(resolver: Arc<dyn LatestResolver>) -> Self {
        Self {
            resolver,
            _watcher: None,
        }
    }
}

/// Build the resolver selected by `config.resolver`.
///
/// A watched static table must be set up from within a Tokio runtime.
pub fn from_config(config: &ProxyConfig) -> Result<ResolverHandle, SetupError> {
    let resolver = &config.resolver;
    match resolver.kind {
        ResolverKind::GoProxy => {
            let go_proxy = GoProxyResolver::new(
                &resolver.proxy_url,
                Duration::from_secs(config.timeouts.connect_secs),
            )?;
            tracing::info!(proxy_url = %resolver.proxy_url, "Using Go module proxy resolver");
            Ok(ResolverHandle::new(Arc::new(go_proxy)))
        }
        ResolverKind::Static => {
            let path = resolver
                .versions_path
                .as_deref()
                .ok_or(SetupError::MissingVersionsPath)?;
            let path = Path::new(path);
            let table = Arc::new(StaticResolver::from_path(path)?);
            let watcher = if resolver.watch {
                Some(table.watch(path)?)
            } else {
                None
            };
            tracing::info!(path = ?path, watch = resolver.watch, "Using static versions table");
            Ok(ResolverHandle {
                resolver: table,
                _watcher: watcher,
            })
        }
        ResolverKind::Disabled => {
            tracing::info!("Latest version resolution disabled");
            Ok(ResolverHandle::new(Arc::new(NoopResolver)))
        }
    }
}
