//! # Asset Registry
//!
//! In-memory map from [`AssetKey`] to [`AssetHandle`], plus the set of keys
//! whose download is currently underway. Both live behind one mutex so that
//! "is it cached or downloading?" and "reserve the download" happen atomically.
//!
//! Critical sections only touch the maps; callers do filesystem work before
//! taking the lock and publish the result afterwards.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::types::{AssetHandle, AssetState, DownloadSlot};
use super::AssetKey;

#[derive(Default)]
struct RegistryState {
    handles: HashMap<AssetKey, AssetHandle>,
    in_flight: HashSet<AssetKey>,
}

pub struct AssetRegistry {
    state: Mutex<RegistryState>,
    in_flight_tx: watch::Sender<usize>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        let (in_flight_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(RegistryState::default()),
            in_flight_tx,
        }
    }

    /// Registered handle for `key`, if any.
    pub fn get(&self, key: &AssetKey) -> Option<AssetHandle> {
        self.state.lock().handles.get(key).cloned()
    }

    /// Insert or overwrite the handle for `key`. Last writer wins.
    pub fn set(&self, key: AssetKey, handle: AssetHandle) {
        self.state.lock().handles.insert(key, handle);
    }

    pub fn len(&self) -> usize {
        self.state.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().handles.is_empty()
    }

    pub fn state(&self, key: &AssetKey) -> AssetState {
        let state = self.state.lock();
        if state.handles.contains_key(key) {
            AssetState::Cached
        } else if state.in_flight.contains(key) {
            AssetState::Downloading
        } else {
            AssetState::Absent
        }
    }

    /// Reserve the download for `key`.
    ///
    /// Returns [`DownloadSlot::Acquired`] at most once per key until
    /// [`finish_download`](Self::finish_download) releases it.
    pub fn begin_download(&self, key: &AssetKey) -> DownloadSlot {
        let mut state = self.state.lock();
        if state.handles.contains_key(key) {
            return DownloadSlot::Cached;
        }
        if !state.in_flight.insert(key.clone()) {
            return DownloadSlot::InFlight;
        }
        self.in_flight_tx.send_replace(state.in_flight.len());
        DownloadSlot::Acquired
    }

    /// Release the download reservation for `key`.
    pub fn finish_download(&self, key: &AssetKey) {
        let mut state = self.state.lock();
        if state.in_flight.remove(key) {
            self.in_flight_tx.send_replace(state.in_flight.len());
        }
    }

    /// Publish `handle` and release the reservation in one step, so no observer
    /// sees the key as neither downloading nor cached.
    pub fn complete_download(&self, handle: AssetHandle) {
        let mut state = self.state.lock();
        let key = handle.key().clone();
        let released = state.in_flight.remove(&key);
        state.handles.insert(key, handle);
        if released {
            self.in_flight_tx.send_replace(state.in_flight.len());
        }
    }

    pub fn is_downloading(&self, key: &AssetKey) -> bool {
        self.state.lock().in_flight.contains(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Receiver tracking the number of in-flight downloads.
    pub fn watch_in_flight(&self) -> watch::Receiver<usize> {
        self.in_flight_tx.subscribe()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AssetRegistry")
            .field("handles", &state.handles.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}
