use clap::Parser;
use std::path::PathBuf;
use vpreload_engine::{NamingScheme, ProxyType};

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "Preload videos into a local playback cache",
    long_about = "Downloads the videos listed in one or more catalogs (or given directly as URLs)\n\
                  into a local cache directory, skipping anything already cached, and reports\n\
                  whether each video would be played from the cache or streamed remotely.\n\
                  \n\
                  A catalog is a JSON array of objects with `id`, `name`, `thumbnailURL`\n\
                  and `videoURL` fields."
)]
pub struct CliArgs {
    /// Catalog files or video URLs
    #[arg(
        required = true,
        help = "Path to catalog JSON file(s) or video URL(s) to preload"
    )]
    pub input: Vec<String>,

    /// Cache directory
    #[arg(
        short = 'o',
        long,
        help = "Directory holding cached videos (default: <temp>/vpreload-cache)"
    )]
    pub cache_dir: Option<PathBuf>,

    /// Staging directory for in-progress downloads
    #[arg(
        long,
        help = "Directory for in-progress downloads (default: <temp>/vpreload-staging)"
    )]
    pub staging_dir: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = NamingScheme::Hashed,
        help = "How cached files are named: hashed (collision-free) or basename (last URL segment)"
    )]
    pub naming: NamingScheme,

    #[arg(
        long,
        help = "Also report playback sources right after downloads are issued (downloads still finish before exit)"
    )]
    pub snapshot: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    #[arg(
        long,
        default_value = "vpreload.log",
        help = "File the log is mirrored to"
    )]
    pub log_file: PathBuf,

    #[arg(
        long,
        default_value = "0",
        help = "Overall timeout in seconds for a single download (0 disables it)"
    )]
    pub timeout: u64,

    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    #[arg(
        long,
        help = "Proxy server URL for downloads (e.g., \"http://proxy.example.com:8080\")"
    )]
    pub proxy: Option<String>,

    #[arg(long, value_enum, default_value_t = ProxyType::Http, help = "Proxy type")]
    pub proxy_type: ProxyType,

    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    #[arg(
        long,
        help = "Disable all proxy settings (including system proxy) for downloads"
    )]
    pub no_proxy: bool,

    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    #[arg(
        short = 'P',
        long = "progress",
        help = "Show a progress spinner per download"
    )]
    pub show_progress: bool,
}
