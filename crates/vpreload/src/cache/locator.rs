//! # Storage Locator
//!
//! Maps an [`AssetKey`] to the file it occupies inside the cache directory.
//! Path computation is pure; only [`StorageLocator::exists`] and
//! [`StorageLocator::ensure_root`] touch the filesystem.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use tokio::fs;
use tokio::io;

use super::AssetKey;

/// How cached files are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum NamingScheme {
    /// `<sha256 of the normalized URL>.<ext>`.
    ///
    /// Distinct keys get distinct files unless their URLs collide under SHA-256.
    #[default]
    Hashed,
    /// Last path segment of the URL, percent-decoded.
    ///
    /// Distinct URLs sharing a basename (`/a/video.mp4`, `/b/video.mp4`) map to
    /// the same file and overwrite each other. URLs without a basename use the
    /// hashed name instead.
    Basename,
}

#[derive(Debug, Clone)]
pub struct StorageLocator {
    root: PathBuf,
    naming: NamingScheme,
}

impl StorageLocator {
    pub fn new(root: impl Into<PathBuf>, naming: NamingScheme) -> Self {
        Self {
            root: root.into(),
            naming,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn naming(&self) -> NamingScheme {
        self.naming
    }

    /// File name an asset is stored under.
    pub fn file_name(&self, key: &AssetKey) -> String {
        match self.naming {
            NamingScheme::Basename => match key.basename().and_then(decoded_file_name) {
                Some(name) => name,
                None => hashed_file_name(key),
            },
            NamingScheme::Hashed => hashed_file_name(key),
        }
    }

    pub fn local_path(&self, key: &AssetKey) -> PathBuf {
        self.root.join(self.file_name(key))
    }

    pub async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }
}

fn hashed_file_name(key: &AssetKey) -> String {
    match key.extension() {
        Some(ext) => format!("{}.{ext}", key.digest()),
        None => key.digest(),
    }
}

/// Percent-decoded basename (`My%20Clip.mp4` becomes `My Clip.mp4`), or `None`
/// when the decoded name is not valid UTF-8 or not a plain file name.
fn decoded_file_name(segment: &str) -> Option<String> {
    let name = percent_decode_str(segment).decode_utf8().ok()?;
    is_safe_file_name(&name).then(|| name.into_owned())
}

// Decoding can reintroduce separators (`%2F`), so check the decoded name.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}
