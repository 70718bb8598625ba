//! # Video Catalog
//!
//! Reads the list of videos a browsing UI shows and turns it into cache keys.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::PreloadError;
use crate::cache::AssetKey;

/// One entry of a video catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: String,
    #[serde(rename = "videoURL")]
    pub video_url: String,
}

impl VideoDescriptor {
    pub fn key(&self) -> Result<AssetKey, PreloadError> {
        AssetKey::parse(&self.video_url)
    }
}

/// Parse a JSON array of descriptors.
pub fn parse_catalog(json: &[u8]) -> Result<Vec<VideoDescriptor>, PreloadError> {
    Ok(serde_json::from_slice(json)?)
}

pub async fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<VideoDescriptor>, PreloadError> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    let items = parse_catalog(&data)?;
    debug!(path = ?path, count = items.len(), "Loaded video catalog");
    Ok(items)
}

/// Cache keys for every descriptor with a usable video URL, in catalog order.
/// Descriptors with malformed URLs are skipped.
pub fn video_keys(items: &[VideoDescriptor]) -> Vec<AssetKey> {
    items
        .iter()
        .filter_map(|item| match item.key() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(id = %item.id, name = %item.name, error = %e, "Skipping catalog entry");
                None
            }
        })
        .collect()
}
