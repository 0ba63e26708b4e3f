use std::time::Duration;
use tokio::time::Instant;

/// A cached value with its insertion time and time-to-live
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    /// An entry is stale once its age strictly exceeds its TTL
    pub fn is_expired(&self, now: Instant) -> bool {
        self.age(now) > self.ttl
    }

    /// Remaining lifetime, zero once expired
    pub fn time_to_live(&self, now: Instant) -> Duration {
        self.ttl.saturating_sub(self.age(now))
    }
}
