//! Latest versions from a local TOML table.
//!
//! ```toml
//! [modules]
//! "golang.org/x/text" = "v0.14.0"
//!
//! [packages]
//! "golang.org/x/text/language" = "v0.13.0"
//! ```
//!
//! A package entry takes precedence over its module's entry.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::RecommendedWatcher;
use serde::Deserialize;

use crate::config::watcher::FileWatcher;
use crate::resolver::error::TableError;
use crate::resolver::LatestResolver;

/// Parsed versions table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VersionTable {
    pub modules: HashMap<String, String>,
    pub packages: HashMap<String, String>,
}

impl VersionTable {
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, TableError> {
        Ok(toml::from_str(content)?)
    }

    /// Latest version for a package, falling back to its module.
    pub fn lookup(&self, module_path: &str, package_path: &str) -> Option<&str> {
        self.packages
            .get(package_path)
            .or_else(|| self.modules.get(module_path))
            .map(String::as_str)
    }
}

/// Resolver backed by a [`VersionTable`] that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticResolver {
    table: ArcSwap<VersionTable>,
}

impl StaticResolver {
    pub fn new(table: VersionTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        Ok(Self::new(VersionTable::load(path)?))
    }

    /// Replace the table; lookups already in flight keep the old one.
    pub fn replace(&self, table: VersionTable) {
        tracing::info!(
            modules = table.modules.len(),
            packages = table.packages.len(),
            "Versions table updated"
        );
        self.table.store(Arc::new(table));
    }

    /// Reload the table from `path` whenever it changes.
    ///
    /// Must be called from within a Tokio runtime. Reloading stops when the
    /// returned watcher is dropped.
    pub fn watch(self: &Arc<Self>, path: &Path) -> Result<RecommendedWatcher, notify::Error> {
        let (watcher, mut updates) = FileWatcher::new(path, VersionTable::load);
        let handle = watcher.run()?;

        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(table) = updates.recv().await {
                resolver.replace(table);
            }
        });

        Ok(handle)
    }
}

#[async_trait::async_trait]
impl LatestResolver for StaticResolver {
    async fn latest(&self, module_path: &str, package_path: &str) -> String {
        self.table
            .load()
            .lookup(module_path, package_path)
            .unwrap_or_default()
            .to_string()
    }
}
