use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure to build a resolver from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("versions table: {0}")]
    Table(#[from] TableError),

    #[error("file watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("resolver.versions_path is not set")]
    MissingVersionsPath,
}
