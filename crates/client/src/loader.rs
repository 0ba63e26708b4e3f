//! Batch chart loading
//!
//! [`BatchResourceLoader::load_all`] fetches a list of charts for one task:
//! 1. names already in the chart cache resolve immediately (unless forced)
//! 2. the rest are fetched in fixed windows of `concurrency` requests; a
//!    window must fully settle before the next one starts
//! 3. each fetch runs under its own deadline; a timeout fails that chart only
//!
//! Every requested name gets an outcome in the report, and successes are in
//! the chart cache before the report is returned.

use crate::charts::{ChartCache, ChartImage};
use crate::http::ChartSource;
use chrono::{DateTime, Utc};
use forcedash_core::{ChartName, Error, Notification, Notifier, Result, TaskId};
use forcedash_utils::tracing::batch_span;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

/// Options for one load call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Window size; at most this many fetches are in flight
    pub concurrency: usize,
    /// Deadline for each individual fetch
    pub timeout: Duration,
    /// Skip the cache and ask the server to revalidate
    pub force: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            timeout: Duration::from_millis(30_000),
            force: false,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Batch progress after an item settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Rounded percentage in `0..=100`
    pub percent: u8,
}

impl Progress {
    fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            completed,
            total,
            percent,
        }
    }
}

/// Result for one requested chart
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Success(ChartImage),
    Failure { message: String },
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoadOutcome::Success(_))
    }

    pub fn image(&self) -> Option<&ChartImage> {
        match self {
            LoadOutcome::Success(image) => Some(image),
            LoadOutcome::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            LoadOutcome::Success(_) => None,
            LoadOutcome::Failure { message } => Some(message),
        }
    }
}

/// Outcome of a batch, keyed by chart name in request order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: IndexMap<String, LoadOutcome>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn get(&self, name: &str) -> Option<&LoadOutcome> {
        self.results.get(name)
    }
}

/// Per-chart load state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartStatus {
    pub loading: bool,
    pub error: Option<String>,
    /// Consecutive failed loads
    pub retry_count: u32,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Everything known about one chart
#[derive(Debug, Clone)]
pub struct ChartInfo {
    pub image: Option<ChartImage>,
    pub status: Option<ChartStatus>,
}

impl ChartInfo {
    pub fn is_loaded(&self) -> bool {
        self.image.is_some() && self.status.as_ref().map_or(true, |s| s.error.is_none())
    }

    pub fn is_loading(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.loading)
    }

    pub fn error(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.error.as_deref())
    }

    pub fn retry_count(&self) -> u32 {
        self.status.as_ref().map_or(0, |s| s.retry_count)
    }
}

/// Short message for a failed chart load
pub fn failure_message(error: &Error) -> String {
    match error {
        Error::NotFound { .. } => "resource not found".to_string(),
        Error::Http { status: 500, .. } => "server error".to_string(),
        Error::Http { status, .. } => format!("request failed with status {status}"),
        Error::Timeout { .. } => "timeout".to_string(),
        Error::Transport { message, .. } => format!("network error: {message}"),
        other => other.to_string(),
    }
}

/// Loads the charts of one task through the shared chart cache
pub struct BatchResourceLoader {
    task: TaskId,
    source: Arc<dyn ChartSource>,
    cache: Arc<ChartCache>,
    notifier: Arc<dyn Notifier>,
    defaults: LoadOptions,
    /// When false, every load goes to the network
    read_cache: bool,
    status: Mutex<IndexMap<String, ChartStatus>>,
}

impl std::fmt::Debug for BatchResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchResourceLoader")
            .field("task", &self.task)
            .field("defaults", &self.defaults)
            .field("read_cache", &self.read_cache)
            .field("tracked", &self.status.lock().len())
            .finish()
    }
}

impl BatchResourceLoader {
    pub fn new(
        task: TaskId,
        source: Arc<dyn ChartSource>,
        cache: Arc<ChartCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            task,
            source,
            cache,
            notifier,
            defaults: LoadOptions::default(),
            read_cache: true,
            status: Mutex::new(IndexMap::new()),
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: LoadOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Never serve loads from the cache (results are still stored)
    #[must_use]
    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.read_cache = !bypass;
        self
    }

    pub fn task(&self) -> &TaskId {
        &self.task
    }

    pub fn defaults(&self) -> LoadOptions {
        self.defaults
    }

    fn mark_loading(&self, name: &str) {
        let mut status = self.status.lock();
        let entry = status.entry(name.to_string()).or_default();
        entry.loading = true;
        entry.error = None;
    }

    fn mark_loaded(&self, name: &str, at: DateTime<Utc>) {
        let mut status = self.status.lock();
        let entry = status.entry(name.to_string()).or_default();
        *entry = ChartStatus {
            loading: false,
            error: None,
            retry_count: 0,
            loaded_at: Some(at),
        };
    }

    fn mark_failed(&self, name: &str, message: &str) {
        let mut status = self.status.lock();
        let entry = status.entry(name.to_string()).or_default();
        entry.loading = false;
        entry.error = Some(message.to_string());
        entry.retry_count += 1;
        entry.loaded_at = None;
    }

    fn cached(&self, name: &ChartName, options: &LoadOptions) -> Option<ChartImage> {
        if options.force || !self.read_cache {
            return None;
        }
        self.cache.get_chart(&self.task, name)
    }

    /// Load one chart, from cache when possible
    pub async fn load_chart(&self, name: &str, options: &LoadOptions) -> Result<ChartImage> {
        let name = ChartName::new(name)?;

        if let Some(image) = self.cached(&name, options) {
            debug!(chart = %name, "chart served from cache");
            self.mark_loaded(&name, image.fetched_at);
            return Ok(image);
        }

        self.mark_loading(&name);
        let fetched =
            match tokio::time::timeout(options.timeout, self.source.fetch_chart(&self.task, &name, options.force)).await {
                Ok(result) => result,
                // dropping the request future cancels it
                Err(_) => Err(Error::timeout(format!("load chart {name}"), options.timeout)),
            };

        match fetched {
            Ok(raw) => {
                let image = self.cache.image_from(&self.task, &name, raw);
                self.cache.cache_chart(image.clone());
                self.mark_loaded(&name, image.fetched_at);
                Ok(image)
            }
            Err(err) => {
                let message = failure_message(&err);
                warn!(chart = %name, error = %err, "chart load failed");
                self.mark_failed(&name, &message);
                Err(err)
            }
        }
    }

    /// Load one chart with the loader's default options
    pub async fn load(&self, name: &str) -> Result<ChartImage> {
        self.load_chart(name, &self.defaults).await
    }

    /// Load every chart in `names`; never fails as a whole.
    ///
    /// `on_progress` is called after each chart settles. Duplicate names are
    /// loaded once.
    pub async fn load_all<S: AsRef<str>>(
        &self,
        names: &[S],
        options: &LoadOptions,
        on_progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
    ) -> BatchReport {
        let mut requested: Vec<&str> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !requested.contains(&name) {
                requested.push(name);
            }
        }

        if requested.is_empty() {
            self.notifier
                .notify(Notification::warning("No charts", "There are no charts to load"));
            return BatchReport::default();
        }

        let total = requested.len();
        let span = batch_span(&self.task, total);
        self.run_batch(&requested, options, on_progress)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        requested: &[&str],
        options: &LoadOptions,
        on_progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
    ) -> BatchReport {
        let total = requested.len();
        let concurrency = options.concurrency.max(1);
        let completed = AtomicUsize::new(0);
        let settle = || {
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(report) = on_progress {
                report(Progress::new(done, total));
            }
        };

        let mut outcomes: IndexMap<String, LoadOutcome> = IndexMap::with_capacity(total);
        let mut pending: Vec<&str> = Vec::new();

        for &name in requested {
            let cached = ChartName::new(name)
                .ok()
                .and_then(|chart| self.cached(&chart, options));
            match cached {
                Some(image) => {
                    self.mark_loaded(name, image.fetched_at);
                    outcomes.insert(name.to_string(), LoadOutcome::Success(image));
                    settle();
                }
                None => pending.push(name),
            }
        }
        debug!(cached = outcomes.len(), pending = pending.len(), "starting chart batch");

        for window in pending.chunks(concurrency) {
            let loads = window.iter().map(|&name| {
                let settle = &settle;
                async move {
                    let outcome = match self.load_chart(name, options).await {
                        Ok(image) => LoadOutcome::Success(image),
                        Err(err) => LoadOutcome::Failure {
                            message: failure_message(&err),
                        },
                    };
                    settle();
                    (name, outcome)
                }
            });
            for (name, outcome) in futures::future::join_all(loads).await {
                outcomes.insert(name.to_string(), outcome);
            }
        }

        // report in request order
        let results: IndexMap<String, LoadOutcome> = requested
            .iter()
            .filter_map(|name| outcomes.swap_remove(*name).map(|o| (name.to_string(), o)))
            .collect();
        let report = BatchReport { results };
        self.notify_summary(&report);
        report
    }

    fn notify_summary(&self, report: &BatchReport) {
        let (ok, failed) = (report.succeeded(), report.failed());
        info!(succeeded = ok, failed, "chart batch finished");
        let notification = if failed == 0 {
            Notification::success("Charts loaded", format!("Loaded all {ok} charts"))
        } else if ok == 0 {
            Notification::error("Charts failed", format!("All {failed} charts failed to load"))
        } else {
            Notification::warning(
                "Charts partially loaded",
                format!("Loaded {ok} charts, {failed} failed"),
            )
        };
        self.notifier.notify(notification);
    }

    /// Reload one chart, bypassing the cache
    pub async fn refresh_chart(&self, name: &str) -> Result<ChartImage> {
        self.load_chart(name, &self.defaults.forced()).await
    }

    pub async fn refresh_all<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        self.load_all(names, &self.defaults.forced(), None).await
    }

    /// Force-reload every chart whose last load failed
    pub async fn retry_failed(&self) -> BatchReport {
        let failed = self.failed_charts();
        if failed.is_empty() {
            self.notifier
                .notify(Notification::info("Nothing to retry", "No failed charts to retry"));
            return BatchReport::default();
        }
        self.notifier.notify(Notification::info(
            "Retrying charts",
            format!("Retrying {} failed charts", failed.len()),
        ));
        self.load_all(&failed, &self.defaults.forced(), None).await
    }

    pub fn chart_status(&self, name: &str) -> Option<ChartStatus> {
        self.status.lock().get(name).cloned()
    }

    pub fn chart_info(&self, name: &str) -> ChartInfo {
        let image = ChartName::new(name)
            .ok()
            .and_then(|chart| self.cache.peek_chart(&self.task, &chart));
        ChartInfo {
            image,
            status: self.chart_status(name),
        }
    }

    pub fn failed_charts(&self) -> Vec<String> {
        self.status
            .lock()
            .iter()
            .filter(|(_, s)| s.error.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn loaded_charts(&self) -> Vec<String> {
        self.status
            .lock()
            .iter()
            .filter(|(_, s)| s.loaded_at.is_some() && s.error.is_none())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn loading_charts(&self) -> Vec<String> {
        self.status
            .lock()
            .iter()
            .filter(|(_, s)| s.loading)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Percentage of tracked charts that loaded, rounded
    pub fn success_rate(&self) -> u8 {
        let status = self.status.lock();
        if status.is_empty() {
            return 0;
        }
        let loaded = status
            .values()
            .filter(|s| s.loaded_at.is_some() && s.error.is_none())
            .count();
        ((loaded as f64 / status.len() as f64) * 100.0).round() as u8
    }

    /// Forget one chart and release its cached image
    pub fn clear_chart(&self, name: &str) {
        if let Ok(chart) = ChartName::new(name) {
            self.cache.remove_chart(&self.task, &chart);
        }
        self.status.lock().shift_remove(name);
    }

    /// Forget every chart of this task and release their images
    pub fn clear_all(&self) {
        let removed = self.cache.clear_task_charts(&self.task);
        self.status.lock().clear();
        debug!(task = %self.task, removed, "cleared task charts");
    }

    pub fn dispose(&self) {
        self.clear_all();
    }
}
