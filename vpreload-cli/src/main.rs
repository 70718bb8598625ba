use std::time::Duration;

use clap::Parser;
use error::AppError;
use indicatif::MultiProgress;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use vpreload_engine::{PreloadCache, PreloadConfig, ProxyAuth, ProxyConfig};

mod cli;
mod error;
mod processor;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&args.log_file)?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("vpreload {} - video preload cache", env!("CARGO_PKG_VERSION"));
    info!("==================================================================");

    info!(
        "HTTP timeout configuration: overall={}s, connect={}s",
        args.timeout, args.connect_timeout
    );

    // Handle proxy configuration
    let (proxy_config, use_system_proxy) = if args.no_proxy {
        info!("All proxy settings disabled (--no-proxy flag)");
        (None, false)
    } else if let Some(proxy_url) = args.proxy.as_ref() {
        let auth = if let (Some(username), Some(password)) = (&args.proxy_user, &args.proxy_pass) {
            Some(ProxyAuth {
                username: username.clone(),
                password: password.clone(),
            })
        } else {
            None
        };

        info!(
            proxy_url = %proxy_url,
            proxy_type = ?args.proxy_type,
            has_auth = auth.is_some(),
            "Using explicit proxy configuration for downloads"
        );

        let proxy = ProxyConfig {
            url: proxy_url.clone(),
            proxy_type: args.proxy_type,
            auth,
        };
        (Some(proxy), false)
    } else {
        info!("Using system proxy settings for downloads");
        (None, true)
    };

    let config = {
        let mut builder = PreloadConfig::builder()
            .with_naming(args.naming)
            .with_timeout(Duration::from_secs(args.timeout))
            .with_connect_timeout(Duration::from_secs(args.connect_timeout))
            .with_headers(utils::parse_headers(&args.headers))
            .with_system_proxy(use_system_proxy);

        if let Some(dir) = args.cache_dir.as_ref() {
            builder = builder.with_cache_dir(dir);
        }
        if let Some(dir) = args.staging_dir.as_ref() {
            builder = builder.with_staging_dir(dir);
        }
        if let Some(proxy) = proxy_config {
            builder = builder.with_proxy(proxy);
        }
        builder.build()
    };

    info!(
        cache_dir = %config.cache_dir().display(),
        staging_dir = %config.staging_dir().display(),
        naming = ?config.naming,
        "Cache configuration"
    );

    let cache = PreloadCache::new(config).await?;

    let multi = MultiProgress::new();
    let progress_manager = if args.show_progress {
        ProgressManager::new(multi)
    } else {
        ProgressManager::new_disabled(multi)
    };
    let progress_task = (!progress_manager.is_disabled())
        .then(|| tokio::spawn(progress_manager.track(cache.subscribe())));

    let result = processor::process_inputs(&cache, &args.input, args.snapshot).await;

    if let Some(task) = progress_task {
        task.abort();
    }

    result?;
    info!("Done");
    Ok(())
}
