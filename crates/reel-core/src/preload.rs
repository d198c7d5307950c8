//! Thumbnail preloader
//!
//! A small priority queue with a concurrency limit. The host asks for the
//! next batch of URLs to start, loads them however it likes, and reports
//! each completion back.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Preload priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Priority queue of thumbnail URLs with bounded parallelism
#[derive(Debug, Clone)]
pub struct ThumbnailPreloader {
    // Ordered by priority (highest first), then arrival
    queue: BTreeMap<(Reverse<PreloadPriority>, u64), String>,
    queued: HashSet<String>,
    loading: HashSet<String>,
    loaded: HashSet<String>,
    max_concurrent: usize,
    seq: u64,
}

impl ThumbnailPreloader {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            queue: BTreeMap::new(),
            queued: HashSet::new(),
            loading: HashSet::new(),
            loaded: HashSet::new(),
            max_concurrent: max_concurrent.max(1),
            seq: 0,
        }
    }

    /// Queue a URL; returns false when it is already queued, loading or loaded
    pub fn add(&mut self, src: impl Into<String>, priority: PreloadPriority) -> bool {
        let src = src.into();
        if src.is_empty()
            || self.loaded.contains(&src)
            || self.loading.contains(&src)
            || self.queued.contains(&src)
        {
            return false;
        }
        self.seq += 1;
        self.queued.insert(src.clone());
        self.queue.insert((Reverse(priority), self.seq), src);
        true
    }

    /// URLs to start now, respecting the concurrency limit
    pub fn next_batch(&mut self) -> Vec<String> {
        let free = self.max_concurrent.saturating_sub(self.loading.len());
        let mut batch = Vec::with_capacity(free);
        while batch.len() < free {
            let Some((_, src)) = self.queue.pop_first() else {
                break;
            };
            self.queued.remove(&src);
            self.loading.insert(src.clone());
            batch.push(src);
        }
        if !batch.is_empty() {
            debug!(started = batch.len(), queued = self.queue.len(), "Thumbnail preload batch");
        }
        batch
    }

    /// Record a finished load; failed URLs may be queued again later
    pub fn complete(&mut self, src: &str, ok: bool) {
        if !self.loading.remove(src) {
            return;
        }
        if ok {
            self.loaded.insert(src.to_string());
        } else {
            warn!(src, "Thumbnail preload failed");
        }
    }

    pub fn is_loaded(&self, src: &str) -> bool {
        self.loaded.contains(src)
    }

    pub fn in_flight(&self) -> usize {
        self.loading.len()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_then_fifo() {
        let mut p = ThumbnailPreloader::new(4);
        p.add("low", PreloadPriority::Low);
        p.add("n1", PreloadPriority::Normal);
        p.add("high", PreloadPriority::High);
        p.add("n2", PreloadPriority::Normal);
        assert_eq!(p.next_batch(), vec!["high", "n1", "n2", "low"]);
    }

    #[test]
    fn test_concurrency_limit() {
        let mut p = ThumbnailPreloader::new(2);
        for src in ["a", "b", "c"] {
            p.add(src, PreloadPriority::Normal);
        }
        assert_eq!(p.next_batch(), vec!["a", "b"]);
        assert!(p.next_batch().is_empty());

        p.complete("a", true);
        assert_eq!(p.next_batch(), vec!["c"]);
        assert_eq!(p.in_flight(), 2);
    }

    #[test]
    fn test_duplicates_ignored_and_failures_retryable() {
        let mut p = ThumbnailPreloader::new(2);
        assert!(p.add("a", PreloadPriority::High));
        assert!(!p.add("a", PreloadPriority::Low));
        p.next_batch();
        assert!(!p.add("a", PreloadPriority::High));

        p.complete("a", false);
        assert!(!p.is_loaded("a"));
        assert!(p.add("a", PreloadPriority::Normal));
        p.next_batch();
        p.complete("a", true);
        assert!(p.is_loaded("a"));
        assert!(!p.add("a", PreloadPriority::Normal));
        assert_eq!(p.pending(), 0);
    }
}
