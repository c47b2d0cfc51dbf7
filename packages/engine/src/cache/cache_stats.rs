//! Cache statistics and metrics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the cache; readers take a [`CacheStatsSnapshot`].
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered with a fresh resource
    pub hits: AtomicU64,
    /// Lookups that found nothing usable
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    /// First-time loads started
    pub loads: AtomicU64,
    /// Refreshes of cached resources started
    pub refreshes: AtomicU64,
    /// Failed refreshes that restored the previous resource
    pub rollbacks: AtomicU64,
    /// Bytes held by the recency list
    pub bytes: AtomicU64,
    /// Resources held by the recency list
    pub entries: AtomicU64,
}

impl CacheStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the list's current size
    pub fn update_size(&self, entries: u64, bytes: u64) {
        self.entries.store(entries, Ordering::Relaxed);
        self.bytes.store(bytes, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub loads: u64,
    pub refreshes: u64,
    pub rollbacks: u64,
    pub bytes: u64,
    pub entries: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of lookups served from cache
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_rollback();
        stats.update_size(2, 300);
        let snap = stats.snapshot();
        assert_eq!(snap.hits, 3);
        assert_eq!(snap.rollbacks, 1);
        assert_eq!((snap.entries, snap.bytes), (2, 300));
        assert!((snap.hit_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStatsSnapshot::default().hit_ratio(), 0.0);
    }
}
