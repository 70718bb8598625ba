use std::path::Path;

use tracing::{info, warn};
use vpreload_engine::{AssetKey, PlayableSource, PreloadCache, load_catalog, video_keys};

use crate::error::AppError;
use crate::utils::format_bytes;

/// Turn the command line inputs into asset keys.
///
/// `http(s)` inputs are taken as video URLs, anything else as a catalog file.
/// Order is preserved; duplicates are left for the cache to collapse.
pub async fn collect_keys(inputs: &[String]) -> Result<Vec<AssetKey>, AppError> {
    let mut keys = Vec::new();

    for input in inputs {
        if input.starts_with("http://") || input.starts_with("https://") {
            match AssetKey::parse(input) {
                Ok(key) => keys.push(key),
                Err(e) => warn!(input = %input, error = %e, "Skipping malformed video URL"),
            }
            continue;
        }

        let path = Path::new(input);
        if !path.is_file() {
            return Err(AppError::InvalidInput(format!(
                "Input is neither a video URL nor a catalog file: {input}"
            )));
        }

        let items = load_catalog(path).await?;
        let catalog_keys = video_keys(&items);
        info!(
            catalog = %path.display(),
            videos = items.len(),
            playable = catalog_keys.len(),
            "Loaded catalog"
        );
        keys.extend(catalog_keys);
    }

    Ok(keys)
}

/// Preload every input, wait for the downloads, then report where each video
/// would be played from.
///
/// With `snapshot`, the sources are also reported right after the downloads
/// are issued. Downloads run on the caller's runtime, so this never returns
/// before they have settled.
pub async fn process_inputs(
    cache: &PreloadCache,
    inputs: &[String],
    snapshot: bool,
) -> Result<(), AppError> {
    let keys = collect_keys(inputs).await?;
    if keys.is_empty() {
        return Err(AppError::InvalidInput(
            "No playable video URLs found in the inputs".to_string(),
        ));
    }

    let report = cache.preload_many(keys.iter().cloned()).await;
    info!(
        already_cached = report.already_cached,
        found_on_disk = report.found_on_disk,
        downloads_started = report.downloads_started,
        in_flight = report.in_flight,
        "Preload issued for {} video(s)",
        report.total()
    );

    if snapshot {
        info!("Playback sources before downloads finish:");
        report_sources(cache, &keys);
    }

    cache.wait_idle().await;
    report_sources(cache, &keys);
    Ok(())
}

fn report_sources(cache: &PreloadCache, keys: &[AssetKey]) {
    let mut local = 0usize;
    for key in keys {
        match cache.lookup(key) {
            PlayableSource::Local(handle) => {
                local += 1;
                info!(
                    "local {} ({}) for {}",
                    handle.path().display(),
                    format_bytes(handle.len()),
                    key
                );
            }
            PlayableSource::Remote(key) => {
                warn!("remote {}", key);
            }
        }
    }
    info!("{}/{} video(s) playable from the local cache", local, keys.len());
}
