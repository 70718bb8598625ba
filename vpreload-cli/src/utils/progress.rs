use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;
use vpreload_engine::{AssetKey, CacheEvent};

use super::format_bytes;

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// One spinner per running download, driven by cache events.
#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<AssetKey, ProgressBar>>>,
    disabled: bool,
}

impl ProgressManager {
    pub fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Arc::new(Mutex::new(HashMap::new())),
            disabled: false,
        }
    }

    pub fn new_disabled(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Arc::new(Mutex::new(HashMap::new())),
            disabled: true,
        }
    }

    pub fn handle_event(&self, event: CacheEvent) {
        if self.disabled {
            return;
        }

        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        match event {
            CacheEvent::DownloadStarted { key } => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(download_style());
                bar.set_message(format!("Downloading {key}"));
                bar.enable_steady_tick(Duration::from_millis(200));
                bars.insert(key, bar);
            }
            CacheEvent::Cached { handle } => {
                if let Some(bar) = bars.remove(handle.key()) {
                    bar.finish_with_message(format!(
                        "Cached {} ({})",
                        handle.key(),
                        format_bytes(handle.len())
                    ));
                }
            }
            CacheEvent::DownloadFailed { key, reason } => {
                if let Some(bar) = bars.remove(&key) {
                    bar.abandon_with_message(format!("Failed {key}: {reason}"));
                }
            }
        }
    }

    /// Feed events from `rx` until the channel closes.
    pub async fn track(self, mut rx: broadcast::Receiver<CacheEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle_event(event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Progress display lagged behind cache events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}
