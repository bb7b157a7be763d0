//! Keyed cache of built stores
//!
//! One build per (segment, field) at a time. Requests for a key that is
//! being built queue on that key's lock and reuse the result; other keys are
//! never blocked. The build itself runs on a spawned task that owns the key
//! lock, so a caller giving up (timeout, dropped future) does not abort it.
//! A failed build drops its slot; queued requests move to a fresh one.

use super::FieldValueStore;
use crate::source::SegmentSource;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub segment_id: String,
    pub field: String,
}

impl StoreKey {
    pub fn new(segment_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            segment_id: segment_id.into(),
            field: field.into(),
        }
    }
}

#[derive(Default)]
struct BuildSlot {
    store: OnceLock<Arc<FieldValueStore>>,
    build_lock: Arc<tokio::sync::Mutex<()>>,
}

/// Hit/miss/build counters
#[derive(Debug, Default)]
pub struct StoreCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    failures: AtomicU64,
}

impl StoreCacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_lookup(true);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_lookup(false);
    }

    fn build(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }

    fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

pub struct FieldStoreCache {
    slots: Arc<Mutex<HashMap<StoreKey, Arc<BuildSlot>>>>,
    stats: Arc<StoreCacheStats>,
    max_entries: usize,
    over_limit: Arc<AtomicBool>,
}

impl FieldStoreCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(StoreCacheStats::new()),
            max_entries,
            over_limit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        Self::new(config.max_entries)
    }

    pub fn stats(&self) -> Arc<StoreCacheStats> {
        Arc::clone(&self.stats)
    }

    /// Whether the soft limit is currently exceeded.
    pub fn over_limit(&self) -> bool {
        self.over_limit.load(Ordering::Relaxed)
    }

    fn slot(&self, key: &StoreKey) -> Arc<BuildSlot> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(BuildSlot::default());
        slots.insert(key.clone(), Arc::clone(&slot));
        if slots.len() > self.max_entries && !self.over_limit.swap(true, Ordering::Relaxed) {
            warn!(
                "Store cache passed its soft limit of {} entries; \
                 segments should be invalidated on merge",
                self.max_entries
            );
        }
        slot
    }

    fn is_registered(&self, key: &StoreKey, slot: &Arc<BuildSlot>) -> bool {
        self.slots
            .lock()
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    fn shrunk(&self, len: usize) {
        reset_over_limit(&self.over_limit, len, self.max_entries);
    }

    /// Cached store, if it has been built.
    pub fn get(&self, segment_id: &str, field: &str) -> Option<Arc<FieldValueStore>> {
        let key = StoreKey::new(segment_id, field);
        self.slots
            .lock()
            .get(&key)
            .and_then(|slot| slot.store.get().cloned())
    }

    /// Return the store for `(source, field)`, building it on first use.
    pub async fn get_or_build(
        &self,
        source: Arc<dyn SegmentSource>,
        field: &str,
    ) -> Result<Arc<FieldValueStore>> {
        let key = StoreKey::new(source.segment_id(), field);

        loop {
            let slot = self.slot(&key);
            if let Some(store) = slot.store.get() {
                self.stats.hit();
                return Ok(Arc::clone(store));
            }

            let guard = Arc::clone(&slot.build_lock).lock_owned().await;
            if let Some(store) = slot.store.get() {
                debug!(
                    "Reusing store for field '{}' on segment {} built by a concurrent request",
                    key.field, key.segment_id
                );
                self.stats.hit();
                return Ok(Arc::clone(store));
            }
            if !self.is_registered(&key, &slot) {
                // Dropped after a failed build or an invalidation; queue on
                // the fresh slot instead.
                continue;
            }
            self.stats.miss();

            let stats = Arc::clone(&self.stats);
            let slots = Arc::clone(&self.slots);
            let over_limit = Arc::clone(&self.over_limit);
            let max_entries = self.max_entries;
            let source = Arc::clone(&source);
            let key = key.clone();
            let build = tokio::spawn(async move {
                let _guard = guard;
                let field = key.field.clone();
                let built = tokio::task::spawn_blocking(move || {
                    FieldValueStore::build(source.as_ref(), &field)
                })
                .await
                .map_err(|e| Error::Storage(format!("store build task failed: {}", e)))
                .and_then(|built| built);

                match built {
                    Ok(store) => {
                        let store = Arc::new(store);
                        // The key lock is held, nobody else can have filled the slot.
                        let _ = slot.store.set(Arc::clone(&store));
                        stats.build();
                        Ok(store)
                    }
                    Err(e) => {
                        stats.failure();
                        let mut slots = slots.lock();
                        if slots
                            .get(&key)
                            .is_some_and(|current| Arc::ptr_eq(current, &slot))
                        {
                            slots.remove(&key);
                            reset_over_limit(&over_limit, slots.len(), max_entries);
                        }
                        Err(e)
                    }
                }
            });

            return build
                .await
                .map_err(|e| Error::Storage(format!("store build task failed: {}", e)))?;
        }
    }

    /// Drop every store built for a segment (after merge or deletion).
    pub fn invalidate_segment(&self, segment_id: &str) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|key, _| key.segment_id != segment_id);
        let removed = before - slots.len();
        self.shrunk(slots.len());
        if removed > 0 {
            debug!("Invalidated {} store(s) for segment {}", removed, segment_id);
        }
        removed
    }

    /// Number of finished stores
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.store.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_usage_bytes(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter_map(|slot| slot.store.get())
            .map(|store| store.memory_usage_bytes())
            .sum()
    }
}

fn reset_over_limit(over_limit: &AtomicBool, len: usize, max_entries: usize) {
    if len <= max_entries {
        over_limit.store(false, Ordering::Relaxed);
    }
}

impl Default for FieldStoreCache {
    fn default() -> Self {
        Self::from_config(&crate::config::CacheConfig::default())
    }
}
