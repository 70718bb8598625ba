use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cache::AssetKey;
use crate::transport::DownloadTransport;
use crate::{PreloadConfig, PreloadError};

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &PreloadConfig) -> Result<Client, PreloadError> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| PreloadError::Tls(e.to_string()))?
        .with_platform_verifier()
        .map_err(|e| PreloadError::Tls(e.to_string()))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        client_builder = client_builder.proxy(proxy_config.to_proxy()?);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for downloads");
    } else if config.use_system_proxy {
        debug!("Using system proxy settings for downloads");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(PreloadError::from)
}

/// Plain HTTP(S) transport: one GET per asset, body streamed to a `.part` file.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &PreloadConfig) -> Result<Self, PreloadError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    async fn stream_to_file(&self, key: &AssetKey, path: &Path) -> Result<u64, PreloadError> {
        let response = self.client.get(key.url().clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreloadError::Status {
                status,
                url: key.to_string(),
            });
        }

        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl DownloadTransport for HttpTransport {
    async fn fetch(&self, key: &AssetKey, staging_dir: &Path) -> Result<PathBuf, PreloadError> {
        fs::create_dir_all(staging_dir).await?;
        let staging = StagingFile::new(staging_dir.join(format!("{}.part", uuid::Uuid::new_v4())));

        let bytes = self.stream_to_file(key, staging.path()).await?;
        debug!(url = %key, bytes, path = ?staging.path(), "Download finished");
        Ok(staging.keep())
    }
}

/// A `.part` file that is removed on drop unless [`keep`](Self::keep) is called.
///
/// Covers both failed fetches and fetch futures dropped mid-download.
struct StagingFile {
    path: PathBuf,
    keep: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = ?self.path, error = %e, "Failed to remove partial download");
            }
        }
    }
}
