//! Bounded in-memory media cache
//!
//! Eviction is batched: when a new key arrives at capacity, the oldest
//! quartile by last access is dropped in one pass instead of sorting on
//! every insert. Access order is tracked with a logical clock, so two
//! entries never share a timestamp.

use crate::{config::CacheConfig, types::MediaKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Estimated memory footprint of a cached handle
pub trait CacheWeight {
    fn estimated_size(&self) -> u64;
}

/// Metadata of a decoded media element kept by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMedia {
    pub kind: MediaKind,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl CacheWeight for CachedMedia {
    fn estimated_size(&self) -> u64 {
        let pixels = u64::from(self.width) * u64::from(self.height);
        match (self.kind, pixels) {
            (_, 0) => 1024,
            (MediaKind::Image, px) => px * 4,
            // Assume ~30 decoded frames held by the element
            (MediaKind::Video, px) => px * 4 * 30,
        }
    }
}

/// A cache slot
#[derive(Debug, Clone)]
pub struct MediaCacheEntry<H> {
    pub key: String,
    pub handle: H,
    /// Access-clock tick at insertion
    pub created_at: u64,
    /// Access-clock tick of the most recent `get` or `set`
    pub last_accessed: u64,
    pub estimated_size: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: usize,
    /// Sum of estimated entry sizes in bytes
    pub estimated_size: u64,
    pub capacity: usize,
}

/// Least-recently-used store with batched eviction
#[derive(Debug)]
pub struct MediaCache<H> {
    entries: HashMap<String, MediaCacheEntry<H>>,
    capacity: usize,
    eviction_fraction: f64,
    clock: u64,
}

impl<H: CacheWeight> MediaCache<H> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::with_capacity(config.capacity),
            capacity: config.capacity.max(1),
            eviction_fraction: config.eviction_fraction,
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up a handle and mark it as recently used
    pub fn get(&mut self, key: &str) -> Option<&H> {
        let now = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = now;
        Some(&entry.handle)
    }

    /// Insert or replace a handle, evicting a batch first when full
    pub fn set(&mut self, key: impl Into<String>, handle: H) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_batch();
        }

        let now = self.tick();
        let estimated_size = handle.estimated_size();
        let created_at = self
            .entries
            .get(&key)
            .map(|e| e.created_at)
            .unwrap_or(now);

        self.entries.insert(
            key.clone(),
            MediaCacheEntry {
                key,
                handle,
                created_at,
                last_accessed: now,
                estimated_size,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<H> {
        self.entries.remove(key).map(|e| e.handle)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            count: self.entries.len(),
            estimated_size: self.entries.values().map(|e| e.estimated_size).sum(),
            capacity: self.capacity,
        }
    }

    /// Keys ordered from least to most recently used
    pub fn keys_by_age(&self) -> Vec<&str> {
        let mut entries: Vec<&MediaCacheEntry<H>> = self.entries.values().collect();
        entries.sort_by_key(|e| e.last_accessed);
        entries.into_iter().map(|e| e.key.as_str()).collect()
    }

    fn evict_batch(&mut self) {
        let count = ((self.entries.len() as f64) * self.eviction_fraction).ceil() as usize;
        let victims: Vec<String> = self
            .keys_by_age()
            .into_iter()
            .take(count.max(1))
            .map(String::from)
            .collect();

        for key in &victims {
            self.entries.remove(key);
        }

        debug!(evicted = victims.len(), remaining = self.entries.len(), "Media cache evicted batch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str) -> CachedMedia {
        CachedMedia {
            kind: MediaKind::Image,
            url: url.to_string(),
            width: 10,
            height: 10,
        }
    }

    fn cache() -> MediaCache<CachedMedia> {
        MediaCache::new(&CacheConfig::default())
    }

    #[test]
    fn test_get_touches_entry() {
        let mut c = cache();
        c.set("a", image("a"));
        c.set("b", image("b"));
        assert!(c.get("a").is_some());
        assert_eq!(c.keys_by_age(), vec!["b", "a"]);
        assert!(c.get("missing").is_none());
    }

    #[test]
    fn test_overflow_evicts_oldest_quartile() {
        let mut c = cache();
        for i in 0..50 {
            c.set(format!("k{i}"), image("x"));
        }
        // Refresh the first key so it survives
        c.get("k0");

        c.set("k50", image("x"));

        // ceil(50 * 0.25) = 13 evicted, then one inserted
        assert_eq!(c.len(), 38);
        assert!(c.has("k0"));
        assert!(!c.has("k1"));
        assert!(!c.has("k13"));
        assert!(c.has("k14"));
        assert!(c.has("k50"));
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let mut c = cache();
        for i in 0..50 {
            c.set(format!("k{i}"), image("x"));
        }
        c.set("k10", image("y"));
        assert_eq!(c.len(), 50);
        assert_eq!(c.get("k10").map(|h| h.url.as_str()), Some("y"));
    }

    #[test]
    fn test_stats_and_clear() {
        let mut c = cache();
        c.set("img", image("img"));
        c.set(
            "vid",
            CachedMedia {
                kind: MediaKind::Video,
                url: "vid".into(),
                width: 0,
                height: 0,
            },
        );
        let stats = c.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.estimated_size, 400 + 1024);
        assert_eq!(stats.capacity, 50);

        c.clear();
        assert!(c.is_empty());
    }
}
