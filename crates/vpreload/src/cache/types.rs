//! # Cache Types
//!
//! Common types shared by the registry, the download coordinator and the
//! [`PreloadCache`](super::PreloadCache) facade.

use std::path::{Path, PathBuf};

use url::Url;

use super::AssetKey;

/// Where a registered handle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOrigin {
    /// File was already on disk when the key was first looked up
    Disk,
    /// File was produced by a completed download
    Download,
}

/// An asset that is resident on local storage and ready to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    key: AssetKey,
    path: PathBuf,
    len: u64,
    origin: HandleOrigin,
}

impl AssetHandle {
    pub fn new(key: AssetKey, path: impl Into<PathBuf>, len: u64, origin: HandleOrigin) -> Self {
        Self {
            key,
            path: path.into(),
            len,
            origin,
        }
    }

    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    /// Local file backing this asset
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the local file in bytes, as observed when the handle was created
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn origin(&self) -> HandleOrigin {
        self.origin
    }
}

/// What the playback surface should bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableSource {
    /// Play from the local cache
    Local(AssetHandle),
    /// Stream directly from the original URL
    Remote(AssetKey),
}

impl PlayableSource {
    pub fn is_local(&self) -> bool {
        matches!(self, PlayableSource::Local(_))
    }

    /// Local path for cached sources
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            PlayableSource::Local(handle) => Some(handle.path()),
            PlayableSource::Remote(_) => None,
        }
    }

    /// URL to hand to a player: `file://` for cached assets, the remote URL otherwise.
    pub fn playback_url(&self) -> Url {
        match self {
            PlayableSource::Local(handle) => {
                Url::from_file_path(handle.path()).unwrap_or_else(|_| handle.key().url().clone())
            }
            PlayableSource::Remote(key) => key.url().clone(),
        }
    }
}

/// Observable state of a key in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Cached,
    Downloading,
    Absent,
}

/// Result of trying to reserve a download for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadSlot {
    /// The caller owns the download and must release it when done
    Acquired,
    /// Another download for the key is already underway
    InFlight,
    /// The key got registered in the meantime
    Cached,
}

/// What a single `preload` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Registry hit, nothing to do
    AlreadyCached,
    /// Found on disk and registered
    FoundOnDisk,
    /// A background download was issued
    DownloadStarted,
    /// A download for this key was already running
    InFlight,
}

/// Tally of a `preload_many` call.
///
/// Counts describe what was *initiated*; downloads may still be running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub already_cached: usize,
    pub found_on_disk: usize,
    pub downloads_started: usize,
    pub in_flight: usize,
}

impl PreloadReport {
    pub fn record(&mut self, outcome: PreloadOutcome) {
        match outcome {
            PreloadOutcome::AlreadyCached => self.already_cached += 1,
            PreloadOutcome::FoundOnDisk => self.found_on_disk += 1,
            PreloadOutcome::DownloadStarted => self.downloads_started += 1,
            PreloadOutcome::InFlight => self.in_flight += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.already_cached + self.found_on_disk + self.downloads_started + self.in_flight
    }
}

/// Notifications broadcast by the coordinator.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    DownloadStarted { key: AssetKey },
    Cached { handle: AssetHandle },
    DownloadFailed { key: AssetKey, reason: String },
}

impl CacheEvent {
    pub fn key(&self) -> &AssetKey {
        match self {
            CacheEvent::DownloadStarted { key } => key,
            CacheEvent::Cached { handle } => handle.key(),
            CacheEvent::DownloadFailed { key, .. } => key,
        }
    }
}
