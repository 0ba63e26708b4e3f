//! Capacity-bounded, access-ordered cache with per-entry expiration
//!
//! Ordering is kept by [`lru::LruCache`] (hash index + doubly-linked list), so
//! promotion on read and eviction of the least-recently-used entry are O(1).
//! Entries inserted back to back with no reads in between are evicted in
//! insertion order.
//!
//! Expiration is lazy: a read that finds a stale entry removes it and counts a
//! miss. [`TtlCache::cleanup`] sweeps all stale entries regardless of reads.

use crate::config::CacheOptions;
use crate::entry::CacheEntry;
use crate::errors::{CacheError, Result};
use crate::eviction::{RemovalCause, RemovalListener};
use crate::size::EstimateSize;
use crate::stats::{CacheStatistics, StatsTracker};
use lru::LruCache;
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

pub struct TtlCache<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>>,
    default_ttl: Duration,
    stats: StatsTracker,
    listener: Option<RemovalListener<K, V>>,
}

impl<K: Hash + Eq, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .field("default_ttl", &self.default_ttl)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<K: Hash + Eq + Clone, V> TtlCache<K, V> {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize, default_ttl: Duration) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CacheError::InvalidCapacity { capacity })?;
        Ok(Self {
            entries: LruCache::new(capacity),
            default_ttl,
            stats: StatsTracker::new(),
            listener: None,
        })
    }

    pub fn from_options(options: &CacheOptions) -> Result<Self> {
        Self::new(options.capacity, options.default_ttl)
    }

    /// Register the callback that receives every removed value
    pub fn set_removal_listener(&mut self, listener: RemovalListener<K, V>) {
        self.listener = Some(listener);
    }

    #[must_use]
    pub fn with_removal_listener(mut self, listener: RemovalListener<K, V>) -> Self {
        self.listener = Some(listener);
        self
    }

    fn release(&self, key: &K, value: V, cause: RemovalCause) {
        if let Some(listener) = &self.listener {
            listener(key, value, cause);
        }
    }

    /// Remove `key` if it is stale; returns true when it was
    fn expire_if_stale<Q>(&mut self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let stale = self
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_expired(now));
        if stale {
            if let Some((key, entry)) = self.entries.pop_entry(key) {
                self.stats.record_expirations(1);
                self.release(&key, entry.value, RemovalCause::Expired);
            }
        }
        stale
    }

    fn lookup<Q>(&mut self, key: &Q, counted: bool) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.expire_if_stale(key, now);

        let found = self.entries.contains(key);
        if counted {
            if found {
                self.stats.record_hit();
            } else {
                self.stats.record_miss();
            }
        }
        // `get` promotes to most-recently-used
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Look up `key`, promoting it to most-recently-used.
    ///
    /// Counts a hit for a live entry and a miss otherwise. A stale entry is
    /// removed as part of the miss.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, true)
    }

    /// Same as `get` without touching the hit/miss counters
    pub fn get_untracked<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, false)
    }

    /// Read without promotion, counters or removal; stale entries read as absent
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| &entry.value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.peek(key).is_some()
    }

    /// Insert with the default TTL
    pub fn set(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Insert as most-recently-used.
    ///
    /// An existing entry for `key` is removed first and reported as
    /// `Replaced`. A new key arriving at capacity evicts the
    /// least-recently-used entry.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        if let Some((old_key, old)) = self.entries.pop_entry(&key) {
            self.release(&old_key, old.value, RemovalCause::Replaced);
        } else if self.entries.len() >= self.entries.cap().get() {
            if let Some((evicted_key, evicted)) = self.entries.pop_lru() {
                self.stats.record_eviction();
                trace!("evicting least-recently-used entry");
                self.release(&evicted_key, evicted.value, RemovalCause::Evicted);
            }
        }
        self.entries.put(key, CacheEntry::new(value, ttl));
    }

    /// Remove `key`; returns whether an entry (live or stale) was present
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.pop_entry(key) {
            Some((key, entry)) => {
                self.release(&key, entry.value, RemovalCause::Explicit);
                true
            }
            None => false,
        }
    }

    /// Remove every entry and reset the counters
    pub fn clear(&mut self) {
        while let Some((key, entry)) = self.entries.pop_lru() {
            self.release(&key, entry.value, RemovalCause::Cleared);
        }
        self.stats.reset();
    }

    /// Remove every stale entry; returns how many were removed
    pub fn cleanup(&mut self) -> usize {
        let now = Instant::now();
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            if let Some((key, entry)) = self.entries.pop_entry(key) {
                self.release(&key, entry.value, RemovalCause::Expired);
            }
        }
        if !stale.is_empty() {
            self.stats.record_expirations(stale.len() as u64);
            debug!(removed = stale.len(), "swept expired cache entries");
        }
        stale.len()
    }

    /// Keys from least- to most-recently-used, stale ones included
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().rev().map(|(key, _)| key.clone()).collect()
    }

    /// Entry metadata for `key` without promotion
    pub fn entry<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.peek(key)
    }

    /// Number of stored entries, stale ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn counters(&self) -> StatsTracker {
        self.stats
    }

    /// Entries currently past their TTL, computed without removing them
    pub fn expired_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .count()
    }
}

impl<K: Hash + Eq + Clone, V: EstimateSize> TtlCache<K, V> {
    /// Snapshot of size, expiry and counter state
    pub fn stats(&self) -> CacheStatistics {
        let estimated_size = self
            .entries
            .iter()
            .map(|(_, entry)| entry.value.estimated_size())
            .sum();

        CacheStatistics {
            total_items: self.entries.len(),
            expired_items: self.expired_count(),
            estimated_size,
            capacity: self.capacity(),
            default_ttl: self.default_ttl,
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            hit_rate: self.stats.hit_rate(),
            expirations: self.stats.expirations(),
            evictions: self.stats.evictions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn cache(capacity: usize) -> TtlCache<String, String> {
        TtlCache::new(capacity, Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = TtlCache::<String, String>::new(0, Duration::from_secs(1));
        assert!(matches!(result, Err(CacheError::InvalidCapacity { capacity: 0 })));
    }

    #[test]
    fn test_overflow_evicts_first_inserted() {
        let mut cache = cache(2);
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        cache.set("c".into(), "3".into());

        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").map(String::as_str), Some("2"));
        assert_eq!(cache.get("c").map(String::as_str), Some("3"));
        assert_eq!(cache.counters().evictions(), 1);
    }

    #[test]
    fn test_read_promotes_entry() {
        let mut cache = cache(2);
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        assert!(cache.get("a").is_some());
        cache.set("c".into(), "3".into());

        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache = cache(2);
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        cache.set("a".into(), "1b".into());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.counters().evictions(), 0);
        // overwrite made "a" most recent, so "b" goes next
        cache.set("c".into(), "3".into());
        assert!(cache.peek("b").is_none());
        assert_eq!(cache.peek("a").map(String::as_str), Some("1b"));
    }

    #[test]
    fn test_peek_does_not_promote_or_count() {
        let mut cache = cache(2);
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        assert!(cache.peek("a").is_some());
        cache.set("c".into(), "3".into());

        assert!(!cache.contains("a"));
        assert_eq!(cache.counters().lookups(), 0);
    }

    #[test]
    fn test_keys_are_lru_first() {
        let mut cache = cache(3);
        cache.set("a".into(), "1".into());
        cache.set("b".into(), "2".into());
        cache.set("c".into(), "3".into());
        cache.get("a");
        assert_eq!(cache.keys(), vec!["b", "c", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiry_counts_miss_and_removes() {
        let mut cache = cache(4);
        cache.set_with_ttl("x".into(), "data".into(), Duration::from_millis(100));
        assert!(cache.get("x").is_some());

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(cache.expired_count(), 1);
        assert!(cache.get("x").is_none());

        let stats = cache.stats();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_alive_at_exact_ttl() {
        let mut cache = cache(4);
        cache.set_with_ttl("x".into(), "data".into(), Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(cache.get("x").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_sweeps_only_stale_entries() {
        let mut cache = cache(4);
        cache.set_with_ttl("short".into(), "1".into(), Duration::from_millis(50));
        cache.set_with_ttl("long".into(), "2".into(), Duration::from_secs(10));
        cache.set_with_ttl("short2".into(), "3".into(), Duration::from_millis(80));

        tokio::time::advance(Duration::from_millis(100)).await;
        let stats = cache.stats();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.expired_items, 2);

        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.keys(), vec!["long"]);
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn test_clear_resets_stats() {
        let mut cache = cache(4);
        cache.set("a".into(), "1".into());
        cache.get("a");
        cache.get("zzz");
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_stats_snapshot_fields() {
        let mut cache = cache(8);
        cache.set("a".into(), "abcd".into());
        cache.set("b".into(), "xy".into());

        let stats = cache.stats();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.estimated_size, 6);
        assert_eq!(stats.capacity, 8);
        assert_eq!(stats.default_ttl, Duration::from_secs(60));
        assert_eq!(stats.expired_items, 0);
    }

    #[test]
    fn test_listener_sees_every_removal_cause() {
        let seen: Arc<Mutex<Vec<(String, RemovalCause)>>> = Arc::default();
        let sink = seen.clone();
        let mut cache = cache(2).with_removal_listener(Arc::new(move |k: &String, _v: String, cause: RemovalCause| {
            sink.lock().push((k.clone(), cause));
        }));

        cache.set("a".into(), "1".into());
        cache.set("a".into(), "2".into());
        cache.set("b".into(), "3".into());
        cache.set("c".into(), "4".into());
        cache.delete("b");
        cache.clear();

        assert_eq!(
            *seen.lock(),
            vec![
                ("a".to_string(), RemovalCause::Replaced),
                ("a".to_string(), RemovalCause::Evicted),
                ("b".to_string(), RemovalCause::Explicit),
                ("c".to_string(), RemovalCause::Cleared),
            ]
        );
    }
}
