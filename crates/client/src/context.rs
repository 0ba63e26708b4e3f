//! Client session wiring
//!
//! A [`DashboardContext`] owns the caches for one client session and passes
//! them to the loaders and pollers it creates. Dropping or disposing the
//! context stops the background sweeps and revokes every chart handle.

use crate::charts::{BlobRegistry, ChartCache, ChartMetadata};
use crate::http::{ChartSource, HttpClient, ResultsSource, StatusSource};
use crate::loader::{BatchResourceLoader, LoadOptions};
use crate::polling::{PollSettings, PollingController};
use forcedash_cache::{CacheOptions, ResultsCache, SharedCache};
use forcedash_config::{CacheTier, ClientConfig};
use forcedash_core::{ChartName, Navigator, Notifier, Result, TaskId};
use std::sync::Arc;
use tracing::debug;

fn tier_options(tier: &CacheTier, config: &ClientConfig) -> CacheOptions {
    CacheOptions {
        capacity: tier.capacity,
        default_ttl: tier.ttl(),
        auto_cleanup: config.cache.auto_cleanup,
        cleanup_interval: config.cache.cleanup_interval(),
    }
}

pub struct DashboardContext {
    config: ClientConfig,
    http: Arc<HttpClient>,
    charts: Arc<ChartCache>,
    results: ResultsCache,
    metadata: SharedCache<ChartMetadata>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardContext")
            .field("base_url", &self.http.base_url().as_str())
            .field("charts", &self.charts.len())
            .finish()
    }
}

impl DashboardContext {
    /// Build a context from validated configuration.
    ///
    /// Caches with `auto_cleanup` start their sweep here, so this must run
    /// inside a tokio runtime when that option is on.
    pub fn new(
        config: ClientConfig,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        config.validate()?;
        let http = Arc::new(HttpClient::new(&config.api.base_url, config.api.timeout())?);
        let registry = Arc::new(BlobRegistry::new());
        let charts = Arc::new(ChartCache::new(
            tier_options(&config.cache.charts, &config),
            registry,
        )?);
        let results = ResultsCache::new(tier_options(&config.cache.results, &config))?;
        let metadata = SharedCache::new(tier_options(&config.cache.default, &config))?;

        debug!(base_url = %config.api.base_url, "dashboard context ready");
        Ok(Self {
            config,
            http,
            charts,
            results,
            metadata,
            notifier,
            navigator,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub fn charts(&self) -> &Arc<ChartCache> {
        &self.charts
    }

    pub fn results(&self) -> &ResultsCache {
        &self.results
    }

    /// Loader options taken from the `loader` settings
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            concurrency: self.config.loader.concurrency,
            timeout: self.config.loader.timeout(),
            force: false,
        }
    }

    /// Chart loader for `task`; fails fast on a malformed id
    pub fn loader(&self, task: &str) -> Result<BatchResourceLoader> {
        let task = TaskId::new(task)?;
        let source: Arc<dyn ChartSource> = self.http.clone();
        Ok(
            BatchResourceLoader::new(task, source, self.charts.clone(), self.notifier.clone())
                .with_defaults(self.load_options())
                .bypass_cache(!self.config.cache.enabled),
        )
    }

    /// Status poller for `task`; fails fast on a malformed id
    pub fn poller(&self, task: &str) -> Result<PollingController> {
        let task = TaskId::new(task)?;
        let source: Arc<dyn StatusSource> = self.http.clone();
        Ok(PollingController::with_settings(
            task,
            source,
            self.notifier.clone(),
            self.navigator.clone(),
            PollSettings::from(&self.config.polling),
        ))
    }

    /// Results document for `task`, cached after the first fetch
    pub async fn results_for(&self, task: &str) -> Result<serde_json::Value> {
        let task = TaskId::new(task)?;
        let http = &self.http;
        let id = &task;
        self.results
            .results_or_fetch(&task, || http.task_results(id))
            .await
    }

    /// HEAD metadata for one chart, cached in the general-purpose cache
    pub async fn chart_metadata(&self, task: &str, chart: &str) -> Result<ChartMetadata> {
        let task = TaskId::new(task)?;
        let chart = ChartName::new(chart)?;
        let key = format!("meta:{task}:{chart}");
        let http = &self.http;
        let metadata = self
            .metadata
            .get_or_set(&key, || http.chart_metadata(&task, &chart))
            .await?;
        Ok(metadata)
    }

    /// Stop every background sweep and release every cached value
    pub fn dispose(&self) {
        self.charts.dispose();
        self.results.dispose();
        self.metadata.dispose();
    }
}

impl Drop for DashboardContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
