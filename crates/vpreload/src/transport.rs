//! # Download Transport
//!
//! The coordinator does not speak HTTP itself. It hands each miss to a
//! [`DownloadTransport`], which fetches the resource into a temporary file and
//! reports where it left it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::PreloadError;
use crate::cache::AssetKey;

#[async_trait]
pub trait DownloadTransport: Send + Sync {
    /// Fetch `key` into a new file inside `staging_dir` and return its path.
    ///
    /// The returned file is owned by the caller, which moves it into the cache.
    async fn fetch(&self, key: &AssetKey, staging_dir: &Path) -> Result<PathBuf, PreloadError>;
}

/// Completion message sent from a download task to the coordinator.
#[derive(Debug)]
pub enum DownloadOutcome {
    Completed { key: AssetKey, location: PathBuf },
    Failed { key: AssetKey, error: PreloadError },
}
