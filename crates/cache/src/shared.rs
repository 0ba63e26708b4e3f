//! Thread-safe cache handle with async helpers
//!
//! Wraps a [`TtlCache`] keyed by `String` behind a `parking_lot` mutex that
//! is never held across an `.await`. Adds:
//! - `get_or_set` with per-key coalescing: concurrent callers for the same
//!   cold key wait for a single factory run instead of each running their own
//! - `warmup`, which fills many keys concurrently and reports each outcome
//! - a periodic background sweep, stopped by `dispose()` or drop

use crate::config::CacheOptions;
use crate::errors::{CacheError, Result};
use crate::eviction::RemovalListener;
use crate::size::EstimateSize;
use crate::stats::{CacheStatistics, StatsTracker};
use crate::ttl::TtlCache;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Outcome of one warmup entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupOutcome {
    pub key: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Removes a key's gate from the registry once its last user is gone
struct GateRelease<'a> {
    in_flight: &'a DashMap<String, Gate>,
    key: &'a str,
    gate: Gate,
}

impl Drop for GateRelease<'_> {
    fn drop(&mut self) {
        let gate = &self.gate;
        // one reference is the registry's, one is ours
        self.in_flight
            .remove_if(self.key, |_, current| Arc::ptr_eq(current, gate) && Arc::strong_count(gate) <= 2);
    }
}

pub struct SharedCache<V> {
    inner: Arc<Mutex<TtlCache<String, V>>>,
    in_flight: DashMap<String, Gate>,
    cleanup_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> std::fmt::Debug for SharedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("cache", &*self.inner.lock())
            .field("in_flight", &self.in_flight.len())
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

impl<V: Clone + Send + 'static> SharedCache<V> {
    /// Create a cache; starts the background sweep when `auto_cleanup` is set
    /// and a tokio runtime is available.
    pub fn new(options: CacheOptions) -> Result<Self> {
        Self::build(options, None)
    }

    pub fn with_removal_listener(
        options: CacheOptions,
        listener: RemovalListener<String, V>,
    ) -> Result<Self> {
        Self::build(options, Some(listener))
    }

    fn build(options: CacheOptions, listener: Option<RemovalListener<String, V>>) -> Result<Self> {
        let mut cache = TtlCache::from_options(&options)?;
        if let Some(listener) = listener {
            cache.set_removal_listener(listener);
        }
        let shared = Self {
            inner: Arc::new(Mutex::new(cache)),
            in_flight: DashMap::new(),
            cleanup_interval: options.cleanup_interval,
            sweeper: Mutex::new(None),
        };
        if options.auto_cleanup && tokio::runtime::Handle::try_current().is_ok() {
            shared.start_auto_cleanup();
        }
        Ok(shared)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    pub fn peek(&self, key: &str) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn get_many<'a, I>(&self, keys: I) -> Vec<(String, Option<V>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut cache = self.inner.lock();
        keys.into_iter()
            .map(|key| (key.to_string(), cache.get(key).cloned()))
            .collect()
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.inner.lock().set(key.into(), value);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.inner.lock().set_with_ttl(key.into(), value, ttl);
    }

    /// Insert each item in order; every insert is independent
    pub fn set_many<I>(&self, items: I)
    where
        I: IntoIterator<Item = (String, V, Option<Duration>)>,
    {
        let mut cache = self.inner.lock();
        for (key, value, ttl) in items {
            match ttl {
                Some(ttl) => cache.set_with_ttl(key, value, ttl),
                None => cache.set(key, value),
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().delete(key)
    }

    /// Delete every key for which `predicate` holds; returns how many went
    pub fn delete_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&str) -> bool,
    {
        let mut cache = self.inner.lock();
        let doomed: Vec<String> = cache.keys().into_iter().filter(|k| predicate(k)).collect();
        doomed.iter().filter(|key| cache.delete(key.as_str())).count()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn cleanup(&self) -> usize {
        self.inner.lock().cleanup()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().keys()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn counters(&self) -> StatsTracker {
        self.inner.lock().counters()
    }

    /// Return the cached value, or run `factory`, store its result and return it.
    ///
    /// Callers racing on the same cold key are serialised on a per-key gate:
    /// the first runs `factory`, the rest find its value when they get the
    /// gate. A failing factory stores nothing and its error goes to the
    /// caller that ran it; the next waiter then runs its own factory.
    pub async fn get_or_set<F, Fut, E>(&self, key: &str, factory: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.get_or_set_with_ttl(key, None, factory).await
    }

    pub async fn get_or_set_with_ttl<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let gate: Gate = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(Gate::default)
            .clone();
        // declared before the lock guard so it drops after it, also on cancellation
        let release = GateRelease {
            in_flight: &self.in_flight,
            key,
            gate,
        };
        let _held = release.gate.lock().await;

        if let Some(value) = self.inner.lock().get_untracked(key).cloned() {
            return Ok(value);
        }

        match factory().await {
            Ok(value) => {
                match ttl {
                    Some(ttl) => self.set_with_ttl(key, value.clone(), ttl),
                    None => self.set(key, value.clone()),
                }
                Ok(value)
            }
            Err(err) => {
                let source = err.into();
                warn!(key, error = %source, "cache factory failed");
                Err(CacheError::Factory {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Populate many keys concurrently; one failure never aborts the others
    pub async fn warmup<I, Fut, E>(&self, entries: I) -> Vec<WarmupOutcome>
    where
        I: IntoIterator<Item = (String, Option<Duration>, Fut)>,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: std::fmt::Display,
    {
        let tasks = entries.into_iter().map(|(key, ttl, fut)| async move {
            match fut.await {
                Ok(value) => {
                    match ttl {
                        Some(ttl) => self.set_with_ttl(key.clone(), value, ttl),
                        None => self.set(key.clone(), value),
                    }
                    WarmupOutcome {
                        key,
                        success: true,
                        error: None,
                    }
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "cache warmup entry failed");
                    WarmupOutcome {
                        key,
                        success: false,
                        error: Some(err.to_string()),
                    }
                }
            }
        });
        futures::future::join_all(tasks).await
    }

    /// Start the periodic sweep (no-op if already running).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_auto_cleanup(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }
        let weak: Weak<Mutex<TtlCache<String, V>>> = Arc::downgrade(&self.inner);
        let period = self.cleanup_interval;
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let removed = inner.lock().cleanup();
                if removed > 0 {
                    debug!(removed, "background sweep removed expired entries");
                }
            }
        }));
    }

    pub fn stop_auto_cleanup(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }

    pub fn is_auto_cleanup_running(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    /// Stop the sweep and release every cached value. Idempotent.
    pub fn dispose(&self) {
        self.stop_auto_cleanup();
        self.inner.lock().clear();
    }
}

impl<V: Clone + Send + EstimateSize + 'static> SharedCache<V> {
    pub fn stats(&self) -> CacheStatistics {
        self.inner.lock().stats()
    }
}

impl<V> Drop for SharedCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
        self.inner.lock().clear();
    }
}
