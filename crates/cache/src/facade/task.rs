//! Per-task resource namespace

use crate::config::CacheOptions;
use crate::errors::Result;
use crate::eviction::RemovalListener;
use crate::shared::{SharedCache, WarmupOutcome};
use crate::size::EstimateSize;
use crate::stats::CacheStatistics;
use forcedash_core::TaskId;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Build the cache key for `name` under `task` in the `kind` keyspace
pub fn task_scoped_key(kind: &str, task: &TaskId, name: &str) -> String {
    format!("{kind}:{task}:{name}")
}

/// Cache whose keys are partitioned by task.
///
/// Every value lives under `<kind>:<taskId>:<name>`. Enumeration and bulk
/// clearing scan the whole key set for the task prefix.
#[derive(Debug)]
pub struct TaskScopedCache<V> {
    kind: String,
    cache: SharedCache<V>,
}

impl<V: Clone + Send + 'static> TaskScopedCache<V> {
    pub fn new(kind: impl Into<String>, options: CacheOptions) -> Result<Self> {
        Ok(Self {
            kind: kind.into(),
            cache: SharedCache::new(options)?,
        })
    }

    /// Like `new`, with a listener that receives every value the cache drops
    pub fn with_removal_listener(
        kind: impl Into<String>,
        options: CacheOptions,
        listener: RemovalListener<String, V>,
    ) -> Result<Self> {
        Ok(Self {
            kind: kind.into(),
            cache: SharedCache::with_removal_listener(options, listener)?,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self, task: &TaskId, name: &str) -> String {
        task_scoped_key(&self.kind, task, name)
    }

    fn prefix(&self, task: &TaskId) -> String {
        format!("{}:{}:", self.kind, task)
    }

    pub fn cache_item(&self, task: &TaskId, name: &str, value: V) {
        self.cache.set(self.key(task, name), value);
    }

    pub fn cache_item_with_ttl(&self, task: &TaskId, name: &str, value: V, ttl: Duration) {
        self.cache.set_with_ttl(self.key(task, name), value, ttl);
    }

    /// Store each item in order; each insert may evict independently
    pub fn cache_many<I>(&self, task: &TaskId, items: I)
    where
        I: IntoIterator<Item = (String, V)>,
    {
        self.cache.set_many(
            items
                .into_iter()
                .map(|(name, value)| (self.key(task, &name), value, None)),
        );
    }

    pub fn get_item(&self, task: &TaskId, name: &str) -> Option<V> {
        self.cache.get(&self.key(task, name))
    }

    /// Read without touching statistics or recency
    pub fn peek_item(&self, task: &TaskId, name: &str) -> Option<V> {
        self.cache.peek(&self.key(task, name))
    }

    pub fn contains_item(&self, task: &TaskId, name: &str) -> bool {
        self.cache.contains(&self.key(task, name))
    }

    pub fn remove_item(&self, task: &TaskId, name: &str) -> bool {
        self.cache.delete(&self.key(task, name))
    }

    /// Live items under `task`, as `(name, value)` from least- to most-recently used.
    ///
    /// Reads by peeking, so enumeration neither promotes entries nor counts.
    pub fn items_for_task(&self, task: &TaskId) -> Vec<(String, V)> {
        let prefix = self.prefix(task);
        self.cache
            .keys()
            .into_iter()
            .filter_map(|key| {
                let name = key.strip_prefix(&prefix)?.to_string();
                self.cache.peek(&key).map(|value| (name, value))
            })
            .collect()
    }

    /// Remove every entry under `task`; returns how many were removed
    pub fn clear_task(&self, task: &TaskId) -> usize {
        let prefix = self.prefix(task);
        let removed = self.cache.delete_where(|key| key.starts_with(&prefix));
        debug!(kind = %self.kind, task = %task, removed, "cleared task keyspace");
        removed
    }

    /// Populate several names under `task` concurrently
    pub async fn preload<I, Fut, E>(&self, task: &TaskId, entries: I) -> Vec<WarmupOutcome>
    where
        I: IntoIterator<Item = (String, Fut)>,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: std::fmt::Display,
    {
        let mut outcomes = self
            .cache
            .warmup(
                entries
                    .into_iter()
                    .map(|(name, fut)| (self.key(task, &name), None, fut)),
            )
            .await;
        // report names, not full keys
        let prefix = self.prefix(task);
        for outcome in &mut outcomes {
            if let Some(name) = outcome.key.strip_prefix(&prefix) {
                outcome.key = name.to_string();
            }
        }
        outcomes
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn cleanup(&self) -> usize {
        self.cache.cleanup()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn dispose(&self) {
        self.cache.dispose();
    }

    /// The underlying cache
    pub fn inner(&self) -> &SharedCache<V> {
        &self.cache
    }
}

impl<V: Clone + Send + EstimateSize + 'static> TaskScopedCache<V> {
    pub fn stats(&self) -> CacheStatistics {
        self.cache.stats()
    }
}
