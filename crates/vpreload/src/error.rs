use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors produced by the preload engine.
///
/// Only configuration and catalog errors ever reach callers of
/// [`PreloadCache`](crate::PreloadCache); transport and relocation failures are
/// logged by the coordinator and degrade to a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum PreloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status code {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed asset URL '{url}': {reason}")]
    MalformedKey { url: String, reason: String },

    #[error("Failed to relocate download to {path}: {source}")]
    Relocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid proxy configuration: {0}")]
    Proxy(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Download task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] serde_json::Error),
}

impl PreloadError {
    pub(crate) fn relocation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Relocation {
            path: path.into(),
            source,
        }
    }
}
