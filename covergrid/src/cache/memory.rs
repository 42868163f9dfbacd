//! In-memory cache tier with LRU eviction.
//!
//! A small bounded map of the most recently served grids, fronting the
//! persistent store. Content is lost on restart by design; this tier exists
//! purely to skip store I/O for hot combinations.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::cache::stats::TierStats;
use crate::engine::CoverageGrid;
use crate::fingerprint::Fingerprint;

/// Entry in the memory cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    grid: CoverageGrid,
    /// Last access time for LRU eviction.
    last_accessed: Instant,
    /// Number of times accessed since insertion.
    access_count: u64,
}

impl CacheEntry {
    fn new(grid: CoverageGrid) -> Self {
        Self {
            grid,
            last_accessed: Instant::now(),
            access_count: 0,
        }
    }

    /// Update access time and increment access count.
    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

/// Bounded in-process cache of computed coverage grids.
///
/// Grids are few and large, so the bound is an entry count rather than a
/// byte size. When the tier is full and a new key arrives, the single entry
/// with the oldest `last_accessed` is evicted. All operations take one lock,
/// so the eviction scan never races a concurrent `get` or `put`.
pub struct MemoryCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    capacity: usize,
    stats: Mutex<TierStats>,
}

impl MemoryCache {
    /// Create a memory cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            stats: Mutex::new(TierStats::new()),
        }
    }

    /// Get a cached grid, touching the entry on hit.
    pub fn get(&self, key: &Fingerprint) -> Option<CoverageGrid> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get_mut(key) {
            entry.touch();
            self.stats.lock().unwrap().record_hit();
            Some(entry.grid.clone())
        } else {
            self.stats.lock().unwrap().record_miss();
            None
        }
    }

    /// Insert or replace a grid, evicting the least recently used entry
    /// first when a new key would exceed capacity.
    pub fn put(&self, key: Fingerprint, grid: CoverageGrid) {
        let mut entries = self.entries.lock().unwrap();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                self.stats.lock().unwrap().record_evictions(1);
            }
        }

        entries.insert(key, CacheEntry::new(grid));
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fingerprints currently cached, for stats reporting.
    pub fn keys(&self) -> Vec<Fingerprint> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn stats(&self) -> TierStats {
        self.stats.lock().unwrap().clone()
    }
}
