//! # vpreload
//!
//! Preloads videos a user is likely to watch next into a local cache and
//! resolves playback requests to a cached file or, failing that, the original
//! URL.
//!
//! ## Features
//!
//! - Three-tier lookup: in-memory registry, cache directory, background download
//! - Concurrent batch preloading with duplicate-download suppression
//! - Collision-free file naming (or the legacy basename layout)
//! - Fail-soft downloads: errors are logged and degrade to remote playback
//! - Pluggable download transport, HTTP(S) by default

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod downloader;
pub mod error;
pub mod proxy;
pub mod transport;

pub use builder::PreloadConfigBuilder;
pub use cache::{
    AssetHandle, AssetKey, AssetRegistry, AssetState, CacheEvent, DownloadCoordinator,
    DownloadSlot, HandleOrigin, NamingScheme, PlayableSource, PreloadCache, PreloadOutcome,
    PreloadReport, StorageLocator,
};
pub use catalog::{VideoDescriptor, load_catalog, video_keys};
pub use config::PreloadConfig;
pub use downloader::{HttpTransport, create_client};
pub use error::PreloadError;
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use transport::{DownloadOutcome, DownloadTransport};
