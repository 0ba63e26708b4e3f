//! Analysis results and AI report cache

use crate::config::CacheOptions;
use crate::errors::Result;
use crate::shared::SharedCache;
use crate::stats::CacheStatistics;
use forcedash_core::TaskId;
use forcedash_utils::{retry_async, BackoffPolicy};
use serde_json::Value;
use std::future::Future;

const RESULTS_PREFIX: &str = "results";
const AI_PREFIX: &str = "ai";

/// JSON documents keyed `results:<taskId>` and `ai:<taskId>`
#[derive(Debug)]
pub struct ResultsCache {
    cache: SharedCache<Value>,
    retry: BackoffPolicy,
}

impl ResultsCache {
    pub fn new(options: CacheOptions) -> Result<Self> {
        Ok(Self {
            cache: SharedCache::new(options)?,
            retry: BackoffPolicy::network(),
        })
    }

    /// Override the retry policy used by `results_or_fetch`
    #[must_use]
    pub fn with_retry_policy(mut self, policy: BackoffPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn results_key(task: &TaskId) -> String {
        format!("{RESULTS_PREFIX}:{task}")
    }

    pub fn ai_key(task: &TaskId) -> String {
        format!("{AI_PREFIX}:{task}")
    }

    pub fn cache_results(&self, task: &TaskId, results: Value) {
        self.cache.set(Self::results_key(task), results);
    }

    pub fn results(&self, task: &TaskId) -> Option<Value> {
        self.cache.get(&Self::results_key(task))
    }

    pub fn cache_ai_analysis(&self, task: &TaskId, analysis: Value) {
        self.cache.set(Self::ai_key(task), analysis);
    }

    pub fn ai_analysis(&self, task: &TaskId) -> Option<Value> {
        self.cache.get(&Self::ai_key(task))
    }

    /// Drop both documents for `task`; returns how many were present
    pub fn remove_task(&self, task: &TaskId) -> usize {
        [Self::results_key(task), Self::ai_key(task)]
            .iter()
            .filter(|key| self.cache.delete(key))
            .count()
    }

    /// Cached results for `task`, or fetch them with retry and cache them.
    ///
    /// Concurrent callers for the same task share a single fetch.
    pub async fn results_or_fetch<F, Fut>(
        &self,
        task: &TaskId,
        fetch: F,
    ) -> forcedash_core::Result<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = forcedash_core::Result<Value>>,
    {
        let key = Self::results_key(task);
        let value = self
            .cache
            .get_or_set(&key, || retry_async(&self.retry, fetch))
            .await?;
        Ok(value)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn dispose(&self) {
        self.cache.dispose();
    }

    pub fn stats(&self) -> CacheStatistics {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forcedash_core::Error;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn cache() -> ResultsCache {
        ResultsCache::new(CacheOptions::results().without_auto_cleanup())
            .unwrap()
            .with_retry_policy(BackoffPolicy {
                jitter: false,
                initial_delay: Duration::from_millis(10),
                ..BackoffPolicy::network()
            })
    }

    #[test]
    fn test_results_and_ai_are_separate_keyspaces() {
        let cache = cache();
        let task = TaskId::new("abc").unwrap();
        cache.cache_results(&task, json!({"peak": 12.5}));
        cache.cache_ai_analysis(&task, json!({"summary": "stable"}));

        assert_eq!(cache.results(&task), Some(json!({"peak": 12.5})));
        assert_eq!(cache.ai_analysis(&task), Some(json!({"summary": "stable"})));
        assert_eq!(cache.remove_task(&task), 2);
        assert!(cache.results(&task).is_none());
        assert_eq!(cache.remove_task(&task), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_or_fetch_retries_then_caches() {
        let cache = cache();
        let task = TaskId::new("abc").unwrap();
        let calls = AtomicU32::new(0);

        let fetch = || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(Error::transport("/api/results/abc", "connection reset"))
                } else {
                    Ok(json!({"rows": 3}))
                }
            }
        };

        assert_eq!(cache.results_or_fetch(&task, fetch).await.unwrap(), json!({"rows": 3}));
        assert_eq!(cache.results_or_fetch(&task, fetch).await.unwrap(), json!({"rows": 3}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_results_or_fetch_propagates_not_found() {
        let cache = cache();
        let task = TaskId::new("gone").unwrap();

        let err = cache
            .results_or_fetch(&task, || async {
                Err(Error::http("/api/results/gone", 404, "missing"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
        assert!(cache.results(&task).is_none());
    }
}
