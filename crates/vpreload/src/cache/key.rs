//! # Asset Keys
//!
//! An [`AssetKey`] is the remote URL of a video. Keys compare by their
//! normalized URL string, so `HTTPS://Example.com:443/a/../v.mp4` and
//! `https://example.com/v.mp4` name the same asset.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use url::Url;

use crate::PreloadError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    url: Url,
}

impl AssetKey {
    /// Parse and normalize a remote URL.
    ///
    /// Only absolute URLs with a host are accepted; anything else is a
    /// [`PreloadError::MalformedKey`].
    pub fn parse(input: &str) -> Result<Self, PreloadError> {
        let url = Url::parse(input.trim()).map_err(|e| PreloadError::MalformedKey {
            url: input.to_string(),
            reason: e.to_string(),
        })?;

        Self::from_url(url)
    }

    pub fn from_url(url: Url) -> Result<Self, PreloadError> {
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(PreloadError::MalformedKey {
                url: url.to_string(),
                reason: "URL has no host".to_string(),
            });
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Last non-empty path segment, e.g. `video.mp4` for
    /// `https://cdn.example.com/a/video.mp4?sig=1`.
    pub fn basename(&self) -> Option<&str> {
        self.url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
    }

    /// Extension of the basename, lower-cased, without the dot.
    pub fn extension(&self) -> Option<String> {
        let basename = self.basename()?;
        let (stem, ext) = basename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Hex SHA-256 of the normalized URL.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl FromStr for AssetKey {
    type Err = PreloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for AssetKey {
    type Error = PreloadError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
