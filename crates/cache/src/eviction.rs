//! Removal notifications

use std::sync::Arc;

/// Why an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Least-recently-used entry dropped to make room
    Evicted,
    /// Overwritten by a `set` on the same key
    Replaced,
    /// TTL elapsed (lazy on read, or during a sweep)
    Expired,
    /// Removed by `delete`
    Explicit,
    /// Removed by `clear` or disposal
    Cleared,
}

/// Callback invoked with every value the cache lets go of.
///
/// Runs while the cache is locked, so it must not call back into the cache.
pub type RemovalListener<K, V> = Arc<dyn Fn(&K, V, RemovalCause) + Send + Sync>;
