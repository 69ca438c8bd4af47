//! Bounded least-recently-used cache of parsed presets.
//!
//! Sits in front of the preset store so switching between notes does not
//! re-read and re-parse the same JSON files over and over.
//!
//! # Eviction
//!
//! Every entry carries the tick of its last access.  `get` and `put` advance a
//! logical clock and stamp the entry with it; when a `put` of a new name would
//! exceed the capacity, the entry with the oldest stamp is evicted.  The clock
//! is strictly increasing, so two entries never share a stamp and the victim
//! is always unambiguous.
//!
//! The cache is not synchronised.  The store wraps it in a single mutex.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::preset::Preset;

/// Capacity used when none is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
struct CacheEntry {
    preset: Preset,
    last_access: u64,
}

/// Hit/miss/eviction counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU cache keyed by preset name.
#[derive(Debug)]
pub struct PresetCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    clock: u64,
    stats: CacheStats,
}

impl PresetCache {
    /// Creates an empty cache.  A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    /// Returns a copy of the cached preset and marks it most recently used.
    pub fn get(&mut self, name: &str) -> Option<Preset> {
        let tick = self.tick();
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.last_access = tick;
                self.stats.hits += 1;
                Some(entry.preset.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Inserts or replaces `name`.
    ///
    /// Returns the name of the evicted entry, if the insert overflowed.
    pub fn put(&mut self, name: &str, preset: Preset) -> Option<String> {
        let tick = self.tick();
        if let Some(entry) = self.entries.get_mut(name) {
            entry.preset = preset;
            entry.last_access = tick;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(
            name.to_string(),
            CacheEntry {
                preset,
                last_access: tick,
            },
        );
        evicted
    }

    /// Drops `name`. Returns `true` if it was cached.
    pub fn invalidate(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `true` if `name` is cached, without touching its stamp.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(name, _)| name.clone())?;
        self.entries.remove(&victim);
        self.stats.evictions += 1;
        debug!("preset cache evicted '{victim}'");
        Some(victim)
    }
}

impl Default for PresetCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
