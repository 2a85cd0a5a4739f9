//! Owner of the accepted snapshot and its persisted mirror.
//!
//! [`SnapshotStore::accept`] is the only mutator. Calls are serialized by an
//! internal lock so the merge rule holds even if two producers share a store.

pub mod cache;

use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::CacheError;
use crate::fingerprint::ChangeDetector;
use crate::models::Snapshot;
use cache::SnapshotCache;

pub use cache::{FileCache, MemoryCache};

/// Result of [`SnapshotStore::accept`].
#[derive(Debug, Clone)]
pub struct Accepted {
    pub snapshot: Arc<Snapshot>,
    pub changed: bool,
}

pub struct SnapshotStore {
    detector: ChangeDetector,
    accepted: Mutex<Arc<Snapshot>>,
    cache: Option<Arc<dyn SnapshotCache>>,
    cache_key: String,
}

impl SnapshotStore {
    pub fn new(detector: ChangeDetector) -> Self {
        let accepted = Arc::new(Snapshot::offline(detector.channels()));
        Self {
            detector,
            accepted: Mutex::new(accepted),
            cache: None,
            cache_key: String::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SnapshotCache>, key: impl Into<String>) -> Self {
        self.cache = Some(cache);
        self.cache_key = key.into();
        self
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Starts from `persisted` when given, otherwise from the all-offline default.
    /// Known channels missing from `persisted` are filled in as offline.
    pub fn seed(&self, persisted: Option<Snapshot>) -> Arc<Snapshot> {
        let offline = Snapshot::offline(self.detector.channels());
        let seeded = Arc::new(match persisted {
            Some(persisted) => offline.merge(&persisted),
            None => offline,
        });
        *self.lock() = seeded.clone();
        seeded
    }

    /// Seeds from the persisted cache. A missing, unreadable or corrupt entry
    /// falls back to the all-offline default.
    pub fn seed_from_cache(&self) -> Arc<Snapshot> {
        self.seed(self.load_persisted())
    }

    fn load_persisted(&self) -> Option<Snapshot> {
        let cache = self.cache.as_ref()?;
        let raw = match cache.load(&self.cache_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Snapshot cache unreadable, starting cold: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => {
                debug!("Seeded snapshot from cache key {}", self.cache_key);
                Some(snapshot)
            }
            Err(e) => {
                warn!("Snapshot cache corrupt, starting cold: {}", e);
                None
            }
        }
    }

    /// Merges `raw` into the accepted snapshot and reports whether the
    /// fingerprint moved.
    pub fn accept(&self, raw: &Snapshot) -> Accepted {
        let mut accepted = self.lock();
        let merged = accepted.merge(raw);
        if self.detector.equal(&accepted, &merged) {
            return Accepted {
                snapshot: accepted.clone(),
                changed: false,
            };
        }

        let merged = Arc::new(merged);
        *accepted = merged.clone();
        Accepted {
            snapshot: merged,
            changed: true,
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.lock().clone()
    }

    /// Best-effort write to the persisted cache. Failures are logged and dropped.
    pub fn persist(&self, snapshot: &Snapshot) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let result = serde_json::to_string(snapshot)
            .map_err(CacheError::from)
            .and_then(|json| cache.store(&self.cache_key, &json));
        if let Err(e) = result {
            warn!("Failed to persist snapshot: {}", e);
        }
    }

    /// Persists the accepted snapshot one last time and clears it from memory.
    pub fn teardown(&self) {
        let last = std::mem::take(&mut *self.lock());
        self.persist(&last);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Arc<Snapshot>> {
        self.accepted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
