use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::cache::NamingScheme;
use crate::proxy::ProxyConfig;

const DEFAULT_USER_AGENT: &str = concat!("vpreload/", env!("CARGO_PKG_VERSION"));

/// Configurable options for the preload cache and its HTTP transport
#[derive(Debug, Clone)]
pub struct PreloadConfig {
    /// Directory holding cached assets. `None` uses `<temp>/vpreload-cache`.
    pub cache_dir: Option<PathBuf>,

    /// Directory transports download into before relocation.
    /// `None` uses `<temp>/vpreload-staging`.
    pub staging_dir: Option<PathBuf>,

    /// How cached files are named
    pub naming: NamingScheme,

    /// Overall timeout for a single download; zero disables it
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    pub follow_redirects: bool,

    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if no explicit proxy is configured
    pub use_system_proxy: bool,

    /// Capacity of the cache event broadcast channel
    pub event_capacity: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            staging_dir: None,
            naming: NamingScheme::default(),
            // Downloads of large videos may legitimately run for a long time
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: PreloadConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
            event_capacity: 64,
        }
    }
}

impl PreloadConfig {
    pub fn builder() -> crate::builder::PreloadConfigBuilder {
        crate::builder::PreloadConfigBuilder::new()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("vpreload-cache"))
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("vpreload-staging"))
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("video/*,application/octet-stream;q=0.9,*/*;q=0.8"),
        );

        default_headers
    }
}
