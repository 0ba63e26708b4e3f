//! Cache statistics

use serde::Serialize;
use std::time::Duration;

/// Hit/miss/expiry/eviction counters for one cache instance.
///
/// Counters only grow until `reset`, which `TtlCache::clear` calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsTracker {
    hits: u64,
    misses: u64,
    expirations: u64,
    evictions: u64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expirations(&mut self, count: u64) {
        self.expirations += count;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn expirations(&self) -> u64 {
        self.expirations
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Total counted lookups
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit rate as a percentage, 0 when nothing was looked up yet
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64 * 100.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time view of a cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub total_items: usize,
    /// Entries past their TTL that no read or sweep has removed yet
    pub expired_items: usize,
    /// Best-effort byte estimate of cached values
    pub estimated_size: usize,
    pub capacity: usize,
    pub default_ttl: Duration,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub expirations: u64,
    pub evictions: u64,
}
