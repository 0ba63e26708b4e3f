//! Resource cache for forcedash
//!
//! This crate provides the in-process caching layer used by the dashboard
//! client:
//! - [`TtlCache`]: capacity-bounded, access-ordered store with per-entry expiry
//! - [`StatsTracker`]: hit/miss/expiry/eviction counters
//! - [`SharedCache`]: thread-safe wrapper with coalesced `get_or_set`,
//!   concurrent warmup and a periodic expiry sweep
//! - [`TaskScopedCache`] and [`ResultsCache`]: keyspace facades partitioned
//!   by analysis task

pub mod config;
pub mod entry;
pub mod errors;
pub mod eviction;
pub mod facade;
pub mod shared;
pub mod size;
pub mod stats;
pub mod ttl;

pub use config::CacheOptions;
pub use entry::CacheEntry;
pub use errors::{CacheError, Result};
pub use eviction::{RemovalCause, RemovalListener};
pub use facade::{ResultsCache, TaskScopedCache};
pub use shared::{SharedCache, WarmupOutcome};
pub use size::EstimateSize;
pub use stats::{CacheStatistics, StatsTracker};
pub use ttl::TtlCache;
