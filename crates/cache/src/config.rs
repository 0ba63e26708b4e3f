//! Cache sizing and expiry options

use std::time::Duration;

/// Options for constructing a cache instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Maximum number of live entries
    pub capacity: usize,
    /// TTL applied when `set` is called without an explicit one
    pub default_ttl: Duration,
    /// Run `cleanup()` periodically in the background
    pub auto_cleanup: bool,
    /// Period of the background sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            capacity: 100,
            default_ttl: Duration::from_secs(5 * 60),
            auto_cleanup: true,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheOptions {
    /// Chart images: 50 entries, 10 minute TTL
    pub fn charts() -> Self {
        Self {
            capacity: 50,
            default_ttl: Duration::from_secs(10 * 60),
            ..Self::default()
        }
    }

    /// Analysis results and AI reports: 20 entries, 30 minute TTL
    pub fn results() -> Self {
        Self {
            capacity: 20,
            default_ttl: Duration::from_secs(30 * 60),
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn without_auto_cleanup(mut self) -> Self {
        self.auto_cleanup = false;
        self
    }
}
