//! # Cache System
//!
//! Keeps videos a user is likely to watch on local storage and tells playback
//! where to read them from.
//!
//! - [`StorageLocator`] maps a URL to its file in the cache directory
//! - [`AssetRegistry`] remembers which assets are ready and which are downloading
//! - [`DownloadCoordinator`] fetches misses in the background and registers them
//! - [`PreloadCache`] is the facade tying the three together

mod coordinator;
mod key;
mod locator;
mod manager;
mod registry;
mod types;

pub use coordinator::DownloadCoordinator;
pub use key::AssetKey;
pub use locator::{NamingScheme, StorageLocator};
pub use manager::PreloadCache;
pub use registry::AssetRegistry;
pub use types::{
    AssetHandle, AssetState, CacheEvent, DownloadSlot, HandleOrigin, PlayableSource,
    PreloadOutcome, PreloadReport,
};
