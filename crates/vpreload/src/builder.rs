//! # Builder for PreloadConfig
//!
//! ```
//! use std::time::Duration;
//! use vpreload_engine::{NamingScheme, PreloadConfig};
//!
//! let config = PreloadConfig::builder()
//!     .with_cache_dir("/var/cache/videos")
//!     .with_naming(NamingScheme::Hashed)
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_header("Referer", "https://example.com")
//!     .build();
//!
//! assert_eq!(config.cache_dir(), std::path::PathBuf::from("/var/cache/videos"));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::cache::NamingScheme;
use crate::proxy::ProxyConfig;
use crate::PreloadConfig;

#[derive(Debug, Clone)]
pub struct PreloadConfigBuilder {
    config: PreloadConfig,
}

impl PreloadConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PreloadConfig::default(),
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn with_naming(mut self, naming: NamingScheme) -> Self {
        self.config.naming = naming;
        self
    }

    /// Set the overall timeout of a download. Zero disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Merge `headers` over the current ones; custom values win.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Explicit proxy, overrides system proxy settings
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self.config.use_system_proxy = false;
        self
    }

    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        if self.config.proxy.is_none() {
            self.config.use_system_proxy = use_system_proxy;
        }
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> PreloadConfig {
        self.config
    }
}

impl Default for PreloadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
