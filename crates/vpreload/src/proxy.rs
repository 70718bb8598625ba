use reqwest::Proxy;

use crate::PreloadError;

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    Http,
    Https,
    Socks5,
    /// Proxy every scheme through the same server
    All,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn to_proxy(&self) -> Result<Proxy, PreloadError> {
        let url = &self.url;
        let invalid = |e: reqwest::Error| PreloadError::Proxy(format!("{url}: {e}"));

        let proxy = match self.proxy_type {
            ProxyType::Http => Proxy::http(url).map_err(invalid)?,
            ProxyType::Https => Proxy::https(url).map_err(invalid)?,
            ProxyType::Socks5 if url.starts_with("socks5://") => {
                Proxy::all(url).map_err(invalid)?
            }
            ProxyType::Socks5 => Proxy::all(format!("socks5://{url}")).map_err(invalid)?,
            ProxyType::All => Proxy::all(url).map_err(invalid)?,
        };

        Ok(match &self.auth {
            Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
            None => proxy,
        })
    }
}
