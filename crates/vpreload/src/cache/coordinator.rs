//! # Download Coordinator
//!
//! Issues background downloads for misses and turns their results into
//! registry entries.
//!
//! Each download runs on its own task and reports a [`DownloadOutcome`] over an
//! mpsc channel. A single completion loop consumes those messages, relocates
//! finished files into the cache directory and publishes the handles. Every
//! failure is logged and absorbed: the key simply stays a miss.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::locator::StorageLocator;
use super::registry::AssetRegistry;
use super::types::{AssetHandle, CacheEvent, DownloadSlot, HandleOrigin};
use super::AssetKey;
use crate::PreloadError;
use crate::transport::{DownloadOutcome, DownloadTransport};

pub struct DownloadCoordinator {
    transport: Arc<dyn DownloadTransport>,
    registry: Arc<AssetRegistry>,
    staging_dir: Arc<PathBuf>,
    outcome_tx: mpsc::UnboundedSender<DownloadOutcome>,
    events: broadcast::Sender<CacheEvent>,
}

impl DownloadCoordinator {
    /// Create the coordinator and spawn its completion loop.
    ///
    /// The loop exits once the coordinator and every outstanding download
    /// task are gone.
    pub fn start(
        transport: Arc<dyn DownloadTransport>,
        registry: Arc<AssetRegistry>,
        locator: Arc<StorageLocator>,
        staging_dir: PathBuf,
        events: broadcast::Sender<CacheEvent>,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let completion = CompletionLoop {
            registry: Arc::clone(&registry),
            locator,
            events: events.clone(),
            outcome_rx,
        };
        tokio::spawn(completion.run());

        Self {
            transport,
            registry,
            staging_dir: Arc::new(staging_dir),
            outcome_tx,
            events,
        }
    }

    /// Issue a background download for `key` unless one is already underway.
    ///
    /// Returns immediately; the result is observed through the registry and
    /// [`CacheEvent`]s.
    pub fn start_download(&self, key: &AssetKey) -> DownloadSlot {
        let slot = self.registry.begin_download(key);
        if slot != DownloadSlot::Acquired {
            debug!(url = %key, ?slot, "Download not issued");
            return slot;
        }

        debug!(url = %key, "Starting background download");
        let _ = self.events.send(CacheEvent::DownloadStarted { key: key.clone() });

        let transport = Arc::clone(&self.transport);
        let registry = Arc::clone(&self.registry);
        let staging_dir = Arc::clone(&self.staging_dir);
        let outcome_tx = self.outcome_tx.clone();
        let key = key.clone();

        tokio::spawn(async move {
            // The fetch runs on its own task so a panicking transport still
            // produces an outcome and releases the slot.
            let fetch = {
                let key = key.clone();
                tokio::spawn(async move { transport.fetch(&key, &staging_dir).await })
            };
            let outcome = match fetch.await {
                Ok(Ok(location)) => DownloadOutcome::Completed {
                    key: key.clone(),
                    location,
                },
                Ok(Err(error)) => DownloadOutcome::Failed {
                    key: key.clone(),
                    error,
                },
                Err(join_err) => DownloadOutcome::Failed {
                    key: key.clone(),
                    error: PreloadError::from(join_err),
                },
            };

            if outcome_tx.send(outcome).is_err() {
                warn!(url = %key, "Completion loop is gone, dropping download result");
                registry.finish_download(&key);
            }
        });

        DownloadSlot::Acquired
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }
}

struct CompletionLoop {
    registry: Arc<AssetRegistry>,
    locator: Arc<StorageLocator>,
    events: broadcast::Sender<CacheEvent>,
    outcome_rx: mpsc::UnboundedReceiver<DownloadOutcome>,
}

impl CompletionLoop {
    async fn run(mut self) {
        while let Some(outcome) = self.outcome_rx.recv().await {
            self.handle(outcome).await;
        }
        debug!("Download completion loop exited");
    }

    async fn handle(&self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Completed { key, location } => {
                let destination = self.locator.local_path(&key);

                match relocate(&location, &destination).await {
                    Ok(len) => {
                        let handle =
                            AssetHandle::new(key.clone(), destination, len, HandleOrigin::Download);
                        info!(url = %key, path = ?handle.path(), bytes = len, "Asset cached");
                        self.registry.complete_download(handle.clone());
                        let _ = self.events.send(CacheEvent::Cached { handle });
                    }
                    Err(e) => {
                        warn!(url = %key, error = %e, "Failed to relocate downloaded asset");
                        discard(&location).await;
                        self.fail(key, e);
                    }
                }
            }
            DownloadOutcome::Failed { key, error } => {
                warn!(url = %key, error = %error, "Failed to download asset");
                self.fail(key, error);
            }
        }
    }

    fn fail(&self, key: AssetKey, error: PreloadError) {
        self.registry.finish_download(&key);
        let _ = self.events.send(CacheEvent::DownloadFailed {
            key,
            reason: error.to_string(),
        });
    }
}

/// Move a finished download to its canonical path, replacing any stale file.
///
/// Falls back to copy + remove when the rename crosses filesystems.
pub(crate) async fn relocate(source: &Path, destination: &Path) -> Result<u64, PreloadError> {
    let source_exists = fs::try_exists(source)
        .await
        .map_err(|e| PreloadError::relocation(source, e))?;
    if !source_exists {
        return Err(PreloadError::relocation(
            source,
            io::Error::new(io::ErrorKind::NotFound, "downloaded file is missing"),
        ));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PreloadError::relocation(parent, e))?;
    }

    match fs::remove_file(destination).await {
        Ok(()) => debug!(path = ?destination, "Removed stale cached file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(PreloadError::relocation(destination, e)),
    }

    if let Err(rename_err) = fs::rename(source, destination).await {
        debug!(
            from = ?source,
            to = ?destination,
            error = %rename_err,
            "Rename failed, copying instead"
        );
        if let Err(e) = fs::copy(source, destination).await {
            discard(destination).await;
            return Err(PreloadError::relocation(destination, e));
        }
        discard(source).await;
    }

    let metadata = fs::metadata(destination)
        .await
        .map_err(|e| PreloadError::relocation(destination, e))?;
    Ok(metadata.len())
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = ?path, error = %e, "Failed to remove file");
        }
    }
}
