//! In-memory projection cache with LRU eviction and source-file invalidation
//!
//! Projections are keyed by (file path, image index, channel, time). Each
//! entry remembers the modification time and length of the source file when
//! it was computed; a lookup that finds a different stamp on disk drops the
//! entry and reports a miss.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use indexmap::IndexMap;
use metrics::counter;
use tracing::debug;

use super::types::Projection;

/// Key for projection cache entries
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProjectionKey {
    pub path: PathBuf,
    pub image_index: usize,
    pub channel: usize,
    pub time: usize,
}

/// Identity of a source file at a point in time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SourceStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl SourceStamp {
    /// Stamp of `path`, or `None` if it cannot be read
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct CachedProjection {
    projection: Arc<Projection>,
    stamp: SourceStamp,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded cache of finished projections (most recent at the end)
pub struct ProjectionCache {
    entries: Mutex<IndexMap<ProjectionKey, CachedProjection>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProjectionCache {
    /// Create a cache holding at most `max_entries` projections
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::with_capacity(max_entries)),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<ProjectionKey, CachedProjection>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a cached projection if present and its source file is unchanged
    pub fn get(&self, key: &ProjectionKey) -> Option<Arc<Projection>> {
        let current = SourceStamp::of(&key.path);
        let mut entries = self.lock();

        let fresh = match entries.get(key) {
            Some(cached) => Some(cached.stamp) == current,
            None => {
                self.record_miss();
                return None;
            }
        };

        if !fresh {
            debug!("Source changed, dropping cached projection {:?}", key);
            entries.shift_remove(key);
            self.record_miss();
            return None;
        }

        // Move to the end (most recently used)
        let cached = entries.shift_remove(key)?;
        let projection = Arc::clone(&cached.projection);
        entries.insert(key.clone(), cached);

        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("labeler_projection_cache_hits_total").increment(1);
        Some(projection)
    }

    /// Insert a projection computed from the file as it is on disk now
    pub fn insert(&self, key: ProjectionKey, projection: Arc<Projection>) {
        match SourceStamp::of(&key.path) {
            Some(stamp) => self.insert_stamped(key, projection, stamp),
            None => debug!("Not caching projection for unreadable source {:?}", key.path),
        }
    }

    fn insert_stamped(&self, key: ProjectionKey, projection: Arc<Projection>, stamp: SourceStamp) {
        let mut entries = self.lock();
        entries.shift_remove(&key);

        // Evict LRU if needed (first item is oldest)
        while entries.len() >= self.max_entries {
            match entries.shift_remove_index(0) {
                Some((evicted, _)) => debug!("Evicted projection from cache: {:?}", evicted),
                None => break,
            }
        }

        entries.insert(key, CachedProjection { projection, stamp });
    }

    /// Get or try to compute a projection, caching it on success
    ///
    /// The source stamp is taken before `init` runs, so a file modified
    /// while projecting is recomputed on the next lookup.
    pub fn get_or_try_insert_with<F, E>(
        &self,
        key: ProjectionKey,
        init: F,
    ) -> Result<Arc<Projection>, E>
    where
        F: FnOnce() -> Result<Projection, E>,
    {
        if let Some(cached) = self.get(&key) {
            return Ok(cached);
        }

        let stamp = SourceStamp::of(&key.path);
        let projection = Arc::new(init()?);
        if let Some(stamp) = stamp {
            self.insert_stamped(key, Arc::clone(&projection), stamp);
        }
        Ok(projection)
    }

    /// Drop every entry computed from `path`
    pub fn invalidate_path(&self, path: &Path) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| key.path != path);
        debug!(
            "Invalidated {} cached projections for {:?}",
            before - entries.len(),
            path
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ProjectionCacheStats {
        ProjectionCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("labeler_projection_cache_misses_total").increment(1);
    }
}
