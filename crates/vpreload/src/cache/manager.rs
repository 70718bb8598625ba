//! # Preload Cache
//!
//! The facade playback and preloading callers talk to. Lookups go through
//! three tiers: the in-memory registry, the cache directory, and finally a
//! background download.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::coordinator::DownloadCoordinator;
use super::locator::StorageLocator;
use super::registry::AssetRegistry;
use super::types::{
    AssetHandle, AssetState, CacheEvent, DownloadSlot, HandleOrigin, PlayableSource,
    PreloadOutcome, PreloadReport,
};
use super::AssetKey;
use crate::downloader::HttpTransport;
use crate::transport::DownloadTransport;
use crate::{PreloadConfig, PreloadError};

/// Cheaply cloneable handle to one cache instance.
///
/// Construct it once at startup and pass clones to every consumer; clones
/// share the registry, the storage layout and the download coordinator.
#[derive(Clone)]
pub struct PreloadCache {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<AssetRegistry>,
    locator: Arc<StorageLocator>,
    coordinator: DownloadCoordinator,
    events: broadcast::Sender<CacheEvent>,
}

impl PreloadCache {
    /// Create a cache that downloads over HTTP.
    pub async fn new(config: PreloadConfig) -> Result<Self, PreloadError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport)).await
    }

    /// Create a cache with a custom download transport.
    pub async fn with_transport(
        config: PreloadConfig,
        transport: Arc<dyn DownloadTransport>,
    ) -> Result<Self, PreloadError> {
        let locator = Arc::new(StorageLocator::new(config.cache_dir(), config.naming));
        locator.ensure_root().await?;

        let registry = Arc::new(AssetRegistry::new());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let coordinator = DownloadCoordinator::start(
            transport,
            Arc::clone(&registry),
            Arc::clone(&locator),
            config.staging_dir(),
            events.clone(),
        );

        debug!(
            cache_dir = ?locator.root(),
            staging_dir = ?coordinator.staging_dir(),
            naming = ?locator.naming(),
            "Preload cache ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                locator,
                coordinator,
                events,
            }),
        })
    }

    /// Make `key` playable from local storage as soon as possible.
    ///
    /// Returns once the asset is registered or its download has been issued;
    /// it never waits for a download to finish.
    pub async fn preload(&self, key: &AssetKey) -> PreloadOutcome {
        let inner = &self.inner;

        match inner.registry.state(key) {
            AssetState::Cached => {
                debug!(url = %key, "Registry hit");
                return PreloadOutcome::AlreadyCached;
            }
            AssetState::Downloading => return PreloadOutcome::InFlight,
            AssetState::Absent => {}
        }

        let path = inner.locator.local_path(key);
        match self.load_from_disk(key, &path).await {
            Ok(Some(handle)) => {
                debug!(url = %key, path = ?path, "Found on disk, registered");
                inner.registry.set(key.clone(), handle);
                return PreloadOutcome::FoundOnDisk;
            }
            Ok(None) => debug!(url = %key, path = ?path, "Not on disk"),
            Err(e) => warn!(url = %key, path = ?path, error = %e, "Disk check failed, downloading"),
        }

        match inner.coordinator.start_download(key) {
            DownloadSlot::Acquired => PreloadOutcome::DownloadStarted,
            DownloadSlot::InFlight => PreloadOutcome::InFlight,
            DownloadSlot::Cached => PreloadOutcome::AlreadyCached,
        }
    }

    /// Preload every key concurrently, one task per key.
    ///
    /// Completes when every preload has been *initiated*; downloads keep
    /// running afterwards. Use [`wait_idle`](Self::wait_idle) to wait for them.
    pub async fn preload_many<I>(&self, keys: I) -> PreloadReport
    where
        I: IntoIterator<Item = AssetKey>,
    {
        let mut tasks = JoinSet::new();
        for key in keys {
            let cache = self.clone();
            tasks.spawn(async move { cache.preload(&key).await });
        }

        let mut report = PreloadReport::default();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) => warn!(error = %e, "Preload task failed"),
            }
        }

        debug!(?report, "Batch preload initiated");
        report
    }

    /// Snapshot of how `key` should be played right now.
    ///
    /// Never blocks and never touches disk or network: a cached handle if the
    /// registry has one, the original URL otherwise.
    pub fn lookup(&self, key: &AssetKey) -> PlayableSource {
        match self.inner.registry.get(key) {
            Some(handle) => PlayableSource::Local(handle),
            None => PlayableSource::Remote(key.clone()),
        }
    }

    pub fn state(&self, key: &AssetKey) -> AssetState {
        self.inner.registry.state(key)
    }

    /// Subscribe to download notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until no download is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.registry.watch_in_flight();
        // The sender lives in the registry we hold, so this cannot fail.
        let _ = rx.wait_for(|in_flight| *in_flight == 0).await;
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.inner.registry
    }

    pub fn locator(&self) -> &StorageLocator {
        &self.inner.locator
    }

    async fn load_from_disk(
        &self,
        key: &AssetKey,
        path: &Path,
    ) -> Result<Option<AssetHandle>, PreloadError> {
        if !self.inner.locator.exists(path).await? {
            return Ok(None);
        }

        let metadata = fs::metadata(path).await?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(AssetHandle::new(
            key.clone(),
            path,
            metadata.len(),
            HandleOrigin::Disk,
        )))
    }
}

impl std::fmt::Debug for PreloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadCache")
            .field("locator", &self.inner.locator)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamingScheme;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[inline]
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    /// Writes the key's URL as the "video" body, optionally waiting on a gate
    /// first or failing outright.
    struct ScriptedTransport {
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
        fail: bool,
    }

    impl ScriptedTransport {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail: false,
            })
        }

        fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(gate),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DownloadTransport for ScriptedTransport {
        async fn fetch(&self, key: &AssetKey, staging_dir: &Path) -> Result<PathBuf, PreloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail {
                return Err(PreloadError::Io(std::io::Error::other("connection reset")));
            }

            fs::create_dir_all(staging_dir).await?;
            let path = staging_dir.join(format!("{}.part", uuid::Uuid::new_v4()));
            fs::write(&path, key.as_str()).await?;
            Ok(path)
        }
    }

    /// Transport whose fetch panics, like a bug deep inside an HTTP stack.
    struct PanickingTransport;

    #[async_trait]
    impl DownloadTransport for PanickingTransport {
        async fn fetch(&self, key: &AssetKey, _staging_dir: &Path) -> Result<PathBuf, PreloadError> {
            panic!("transport blew up fetching {key}");
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        cache: PreloadCache,
    }

    impl Fixture {
        fn cache_dir(&self) -> PathBuf {
            self.dir.path().join("cache")
        }

        fn staging_dir(&self) -> PathBuf {
            self.dir.path().join("staging")
        }
    }

    async fn fixture(naming: NamingScheme, transport: Arc<dyn DownloadTransport>) -> Fixture {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = PreloadConfig::builder()
            .with_cache_dir(dir.path().join("cache"))
            .with_staging_dir(dir.path().join("staging"))
            .with_naming(naming)
            .build();
        let cache = PreloadCache::with_transport(config, transport).await.unwrap();
        Fixture { dir, cache }
    }

    fn key(url: &str) -> AssetKey {
        AssetKey::parse(url).unwrap()
    }

    async fn settle(cache: &PreloadCache) {
        tokio::time::timeout(Duration::from_secs(5), cache.wait_idle())
            .await
            .expect("downloads did not settle");
    }

    async fn next_event(rx: &mut broadcast::Receiver<CacheEvent>) -> CacheEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no cache event")
            .unwrap()
    }

    async fn dir_entries(path: &Path) -> usize {
        let mut entries = fs::read_dir(path).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_unknown_key_streams_remotely() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/never-seen.mp4");

        assert_eq!(f.cache.lookup(&k), PlayableSource::Remote(k.clone()));
        assert_eq!(f.cache.state(&k), AssetState::Absent);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_preload_then_lookup_hits_local_file() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");

        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::DownloadStarted);
        settle(&f.cache).await;

        let PlayableSource::Local(handle) = f.cache.lookup(&k) else {
            panic!("expected a cached handle");
        };
        assert_eq!(handle.path(), f.cache.locator().local_path(&k));
        assert_eq!(handle.origin(), HandleOrigin::Download);
        assert_eq!(handle.len(), k.as_str().len() as u64);
        assert_eq!(fs::read(handle.path()).await.unwrap(), k.as_str().as_bytes());
        assert_eq!(dir_entries(&f.staging_dir()).await, 0);

        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::AlreadyCached);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_preloads_issue_one_download() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(gate.clone());
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");

        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::DownloadStarted);
        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::InFlight);
        assert_eq!(f.cache.state(&k), AssetState::Downloading);
        assert!(!f.cache.lookup(&k).is_local());

        gate.add_permits(1);
        settle(&f.cache).await;

        assert_eq!(transport.calls(), 1);
        assert_eq!(f.cache.registry().len(), 1);
        assert_eq!(f.cache.state(&k), AssetState::Cached);
        assert_eq!(dir_entries(&f.cache_dir()).await, 1);
    }

    #[tokio::test]
    async fn test_preload_many_deduplicates_within_batch() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(gate.clone());
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");

        let report = f
            .cache
            .preload_many(vec![k.clone(), k.clone(), k.clone()])
            .await;

        assert_eq!(report.downloads_started, 1);
        assert_eq!(report.in_flight, 2);

        gate.add_permits(3);
        settle(&f.cache).await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_preload_many_does_not_wait_for_downloads() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(gate.clone());
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let keys: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| key(&format!("https://cdn.example.com/videos/{name}.mp4")))
            .collect();

        // Every download is parked on the gate, so returning at all proves the
        // batch only waited for initiation.
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            f.cache.preload_many(keys.clone()),
        )
        .await
        .expect("preload_many blocked on downloads");

        assert_eq!(report.downloads_started, 3);
        assert_eq!(report.total(), 3);
        assert!(keys.iter().all(|k| !f.cache.lookup(k).is_local()));
        assert_eq!(f.cache.registry().in_flight_count(), 3);

        gate.add_permits(3);
        settle(&f.cache).await;
        assert!(keys.iter().all(|k| f.cache.lookup(k).is_local()));
    }

    #[tokio::test]
    async fn test_preload_many_empty_is_noop() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;

        let report = f.cache.preload_many(Vec::new()).await;

        assert_eq!(report, PreloadReport::default());
        assert!(f.cache.registry().is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_existing_file_is_registered_without_download() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Basename, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");
        let path = f.cache.locator().local_path(&k);
        fs::write(&path, b"cached earlier").await.unwrap();

        assert_eq!(f.cache.lookup(&k), PlayableSource::Remote(k.clone()));
        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::FoundOnDisk);

        let handle = f.cache.registry().get(&k).unwrap();
        assert_eq!(handle.path(), path);
        assert_eq!(handle.origin(), HandleOrigin::Disk);
        assert_eq!(handle.len(), 14);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_relocation_failure_leaves_key_uncached() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");
        let mut events = f.cache.subscribe();

        // Replace the cache directory with a plain file so it cannot be recreated.
        fs::remove_dir_all(f.cache_dir()).await.unwrap();
        fs::write(f.cache_dir(), b"in the way").await.unwrap();

        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::DownloadStarted);
        assert!(matches!(next_event(&mut events).await, CacheEvent::DownloadStarted { .. }));
        match next_event(&mut events).await {
            CacheEvent::DownloadFailed { key: failed, .. } => assert_eq!(failed, k),
            other => panic!("expected failure event, got {other:?}"),
        }
        settle(&f.cache).await;

        assert!(f.cache.registry().get(&k).is_none());
        assert_eq!(f.cache.lookup(&k), PlayableSource::Remote(k.clone()));
        assert_eq!(f.cache.state(&k), AssetState::Absent);
        assert_eq!(dir_entries(&f.staging_dir()).await, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried_on_next_preload() {
        let transport = ScriptedTransport::failing();
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");

        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::DownloadStarted);
        settle(&f.cache).await;

        assert_eq!(f.cache.lookup(&k), PlayableSource::Remote(k.clone()));
        assert_eq!(f.cache.state(&k), AssetState::Absent);

        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::DownloadStarted);
        settle(&f.cache).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_panicking_transport_releases_download_slot() {
        let f = fixture(NamingScheme::Hashed, Arc::new(PanickingTransport)).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");
        let mut events = f.cache.subscribe();

        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::DownloadStarted);
        assert!(matches!(next_event(&mut events).await, CacheEvent::DownloadStarted { .. }));
        match next_event(&mut events).await {
            CacheEvent::DownloadFailed { key, .. } => assert_eq!(key, k),
            other => panic!("expected a failed download, got {other:?}"),
        }

        settle(&f.cache).await;
        assert_eq!(f.cache.state(&k), AssetState::Absent);
        assert_eq!(f.cache.lookup(&k), PlayableSource::Remote(k.clone()));
        assert_eq!(f.cache.preload(&k).await, PreloadOutcome::DownloadStarted);
        settle(&f.cache).await;
    }

    #[tokio::test]
    async fn test_basename_collision_overwrites_first_download() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(gate.clone());
        let f = fixture(NamingScheme::Basename, transport.clone()).await;
        let a = key("https://cdn.example.com/a/video.mp4");
        let b = key("https://cdn.example.com/b/video.mp4");
        let shared = f.cache.locator().local_path(&a);
        assert_eq!(shared, f.cache.locator().local_path(&b));

        let mut events = f.cache.subscribe();
        assert_eq!(f.cache.preload(&a).await, PreloadOutcome::DownloadStarted);
        assert_eq!(f.cache.preload(&b).await, PreloadOutcome::DownloadStarted);
        assert!(matches!(next_event(&mut events).await, CacheEvent::DownloadStarted { .. }));
        assert!(matches!(next_event(&mut events).await, CacheEvent::DownloadStarted { .. }));

        gate.add_permits(1);
        let first = next_event(&mut events).await.key().clone();
        assert_eq!(fs::read(&shared).await.unwrap(), first.as_str().as_bytes());

        gate.add_permits(1);
        let second = next_event(&mut events).await.key().clone();
        assert_ne!(first, second);
        assert_eq!(fs::read(&shared).await.unwrap(), second.as_str().as_bytes());

        settle(&f.cache).await;
        assert_eq!(f.cache.lookup(&a).local_path(), Some(shared.as_path()));
        assert_eq!(f.cache.lookup(&b).local_path(), Some(shared.as_path()));
        assert_eq!(dir_entries(&f.cache_dir()).await, 1);
    }

    #[tokio::test]
    async fn test_hashed_naming_keeps_shared_basenames_apart() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let a = key("https://cdn.example.com/a/video.mp4");
        let b = key("https://cdn.example.com/b/video.mp4");

        f.cache.preload_many(vec![a.clone(), b.clone()]).await;
        settle(&f.cache).await;

        for k in [&a, &b] {
            let path = f.cache.lookup(k).local_path().unwrap().to_path_buf();
            assert_eq!(fs::read(&path).await.unwrap(), k.as_str().as_bytes());
        }
        assert_eq!(dir_entries(&f.cache_dir()).await, 2);
    }

    #[tokio::test]
    async fn test_restart_repopulates_lazily_from_disk() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Hashed, transport.clone()).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");

        f.cache.preload(&k).await;
        settle(&f.cache).await;

        let config = PreloadConfig::builder()
            .with_cache_dir(f.cache_dir())
            .with_staging_dir(f.staging_dir())
            .build();
        let restarted = PreloadCache::with_transport(config, transport.clone())
            .await
            .unwrap();

        assert!(restarted.registry().is_empty());
        assert!(!restarted.lookup(&k).is_local());
        assert_eq!(restarted.preload(&k).await, PreloadOutcome::FoundOnDisk);
        assert!(restarted.lookup(&k).is_local());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_playback_url_points_at_cached_file() {
        let transport = ScriptedTransport::ok();
        let f = fixture(NamingScheme::Hashed, transport).await;
        let k = key("https://cdn.example.com/videos/clip.mp4");

        assert_eq!(f.cache.lookup(&k).playback_url().as_str(), k.as_str());

        f.cache.preload(&k).await;
        settle(&f.cache).await;

        let url = f.cache.lookup(&k).playback_url();
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.to_file_path().unwrap(), f.cache.locator().local_path(&k));
    }
}
