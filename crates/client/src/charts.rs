//! Chart images, blob handles and the per-task chart cache
//!
//! Every loaded chart is exposed through a [`BlobHandle`], an opaque
//! `blob:` URL a front end can hand to an image widget. Handles are issued by
//! a [`BlobRegistry`] and stay live until revoked. [`ChartCache`] revokes a
//! chart's handle whenever the cache lets go of it: eviction, expiry,
//! overwrite, delete, clear or disposal.

use crate::http::{ChartSource, RawChart};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use forcedash_cache::{
    CacheOptions, CacheStatistics, EstimateSize, RemovalCause, RemovalListener, TaskScopedCache,
    WarmupOutcome,
};
use forcedash_core::{ChartName, Result, TaskId};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

const CHART_KIND: &str = "chart";

/// Charts the backend renders for every analysis
const CHART_CATALOG: [&str; 35] = [
    // basic analysis
    "force_time_series",
    "force_distribution",
    "force_boxplot",
    "absolute_deviation_boxplot",
    "percentage_deviation_boxplot",
    "interactive_3d_scatter",
    "scatter_matrix",
    "correlation_matrix",
    // control charts
    "shewhart_control",
    "moving_average",
    "xbar_r_control",
    "cusum_control",
    "ewma_control",
    "imr_control",
    "run_chart",
    // quality analysis
    "process_capability",
    "pareto_chart",
    "residual_analysis",
    "qq_normality",
    "radar_chart",
    "heatmap",
    "success_rate_trend",
    "capability_index",
    "quality_dashboard",
    "waterfall_chart",
    "spatial_clustering",
    "parallel_coordinates",
    // multivariate analysis
    "xy_heatmap",
    "projection_2d",
    "position_anomaly_heatmap",
    "spatial_density",
    "multivariate_relations",
    "anomaly_patterns",
    "quality_distribution_map",
    "comprehensive_assessment",
];

/// Default set of chart names, in display order
pub fn chart_catalog() -> &'static [&'static str] {
    &CHART_CATALOG
}

/// HEAD metadata for one chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartMetadata {
    pub name: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub url: String,
}

impl EstimateSize for ChartMetadata {
    fn estimated_size(&self) -> usize {
        self.name.len()
            + self.url.len()
            + self.content_type.estimated_size()
            + self.last_modified.estimated_size()
    }
}

/// Revocable reference to chart bytes held by a [`BlobRegistry`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobHandle {
    id: u64,
    url: String,
}

impl BlobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Issues and revokes blob handles, tracking which are still live
#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: AtomicU64,
    live: DashMap<u64, usize>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, data: &Bytes) -> BlobHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.insert(id, data.len());
        BlobHandle {
            id,
            url: format!("blob:forcedash/{id}"),
        }
    }

    /// Release a handle; returns false if it was already revoked
    pub fn revoke(&self, handle: &BlobHandle) -> bool {
        self.live.remove(&handle.id).is_some()
    }

    pub fn is_live(&self, handle: &BlobHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Bytes referenced by live handles
    pub fn live_bytes(&self) -> usize {
        self.live.iter().map(|entry| *entry.value()).sum()
    }
}

/// A loaded chart image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartImage {
    pub task: TaskId,
    pub name: ChartName,
    pub data: Bytes,
    pub content_type: Option<String>,
    pub handle: BlobHandle,
    pub fetched_at: DateTime<Utc>,
}

impl ChartImage {
    pub fn url(&self) -> &str {
        self.handle.url()
    }

    /// File name used when saving the chart to disk
    pub fn file_name(&self) -> String {
        let extension = match self.content_type.as_deref() {
            Some("image/svg+xml") => "svg",
            Some("image/jpeg") => "jpg",
            Some("text/html") => "html",
            _ => "png",
        };
        format!("{}_{}.{extension}", self.name, self.task)
    }
}

impl EstimateSize for ChartImage {
    fn estimated_size(&self) -> usize {
        self.data.len()
    }
}

/// Chart images keyed `chart:<taskId>:<chartName>`.
///
/// Handles are revoked from the cache's removal listener, so a value handed
/// out earlier may carry a revoked handle once its entry is gone.
#[derive(Debug)]
pub struct ChartCache {
    charts: TaskScopedCache<ChartImage>,
    registry: Arc<BlobRegistry>,
}

impl ChartCache {
    pub fn new(options: CacheOptions, registry: Arc<BlobRegistry>) -> Result<Self> {
        let releaser = registry.clone();
        let listener: RemovalListener<String, ChartImage> =
            Arc::new(move |key: &String, image: ChartImage, cause: RemovalCause| {
                if releaser.revoke(&image.handle) {
                    trace!(key = %key, ?cause, handle = image.handle.id(), "revoked chart handle");
                }
            });
        let charts = TaskScopedCache::with_removal_listener(CHART_KIND, options, listener)?;
        Ok(Self { charts, registry })
    }

    pub fn registry(&self) -> &Arc<BlobRegistry> {
        &self.registry
    }

    /// Wrap fetched bytes in a new handle
    pub fn image_from(&self, task: &TaskId, name: &ChartName, raw: RawChart) -> ChartImage {
        ChartImage {
            task: task.clone(),
            name: name.clone(),
            handle: self.registry.issue(&raw.data),
            data: raw.data,
            content_type: raw.content_type,
            fetched_at: Utc::now(),
        }
    }

    /// Store `image` under its own task and name.
    ///
    /// Re-caching the value that is already cached refreshes its position
    /// without revoking its handle.
    pub fn cache_chart(&self, image: ChartImage) {
        let task = image.task.clone();
        let name = image.name.to_string();
        if let Some(existing) = self.charts.inner().peek(&self.charts.key(&task, &name)) {
            if existing.handle == image.handle {
                self.charts.inner().get(&self.charts.key(&task, &name));
                return;
            }
        }
        self.charts.cache_item(&task, &name, image);
    }

    pub fn cache_charts<I>(&self, images: I)
    where
        I: IntoIterator<Item = ChartImage>,
    {
        for image in images {
            self.cache_chart(image);
        }
    }

    pub fn get_chart(&self, task: &TaskId, name: &ChartName) -> Option<ChartImage> {
        self.charts.get_item(task, name)
    }

    pub fn peek_chart(&self, task: &TaskId, name: &ChartName) -> Option<ChartImage> {
        self.charts.peek_item(task, name)
    }

    pub fn contains_chart(&self, task: &TaskId, name: &ChartName) -> bool {
        self.charts.contains_item(task, name)
    }

    pub fn remove_chart(&self, task: &TaskId, name: &ChartName) -> bool {
        self.charts.remove_item(task, name)
    }

    /// Every cached chart of `task`
    pub fn task_charts(&self, task: &TaskId) -> Vec<ChartImage> {
        self.charts
            .items_for_task(task)
            .into_iter()
            .map(|(_, image)| image)
            .collect()
    }

    pub fn clear_task_charts(&self, task: &TaskId) -> usize {
        self.charts.clear_task(task)
    }

    /// Fetch and cache several charts concurrently, reporting each outcome
    pub async fn preload_charts(
        &self,
        source: &dyn ChartSource,
        task: &TaskId,
        names: &[ChartName],
    ) -> Vec<WarmupOutcome> {
        let entries = names.iter().map(|name| {
            let fut = async move {
                let raw = source.fetch_chart(task, name, false).await?;
                Ok::<_, forcedash_core::Error>(self.image_from(task, name, raw))
            };
            (name.to_string(), fut)
        });
        self.charts.preload(task, entries).await
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    pub fn clear(&self) {
        self.charts.clear();
    }

    /// Stop the expiry sweep and revoke every cached handle
    pub fn dispose(&self) {
        self.charts.dispose();
    }

    pub fn stats(&self) -> CacheStatistics {
        self.charts.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn raw(bytes: &'static [u8]) -> RawChart {
        RawChart {
            data: Bytes::from_static(bytes),
            content_type: Some("image/png".into()),
        }
    }

    fn cache(capacity: usize) -> ChartCache {
        ChartCache::new(
            CacheOptions::charts()
                .with_capacity(capacity)
                .without_auto_cleanup(),
            Arc::new(BlobRegistry::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_catalog_has_35_unique_names() {
        let mut names = chart_catalog().to_vec();
        assert_eq!(names.len(), 35);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 35);
        assert!(names.iter().all(|n| ChartName::new(*n).is_ok()));
    }

    #[test]
    fn test_eviction_revokes_handle() {
        let cache = cache(2);
        let task = TaskId::new("t").unwrap();
        let images: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| cache.image_from(&task, &ChartName::new(*n).unwrap(), raw(b"png")))
            .collect();
        let first = images[0].handle.clone();

        cache.cache_charts(images);
        assert!(!cache.registry().is_live(&first));
        assert_eq!(cache.registry().live_count(), 2);
    }

    #[test]
    fn test_overwrite_revokes_old_handle_only() {
        let cache = cache(4);
        let task = TaskId::new("t").unwrap();
        let name = ChartName::new("heatmap").unwrap();

        let old = cache.image_from(&task, &name, raw(b"v1"));
        let new = cache.image_from(&task, &name, raw(b"v2"));
        cache.cache_chart(old.clone());
        cache.cache_chart(old.clone());
        assert!(cache.registry().is_live(&old.handle));

        cache.cache_chart(new.clone());
        assert!(!cache.registry().is_live(&old.handle));
        assert!(cache.registry().is_live(&new.handle));
        assert_eq!(cache.get_chart(&task, &name).unwrap().data, Bytes::from_static(b"v2"));
    }

    #[test]
    fn test_clear_task_and_dispose_revoke_everything() {
        let cache = cache(8);
        let (t1, t2) = (TaskId::new("t1").unwrap(), TaskId::new("t2").unwrap());
        for (task, name) in [(&t1, "a"), (&t1, "b"), (&t2, "a")] {
            let image = cache.image_from(task, &ChartName::new(name).unwrap(), raw(b"xx"));
            cache.cache_chart(image);
        }

        assert_eq!(cache.clear_task_charts(&t1), 2);
        assert_eq!(cache.registry().live_count(), 1);
        assert_eq!(cache.task_charts(&t2).len(), 1);

        cache.dispose();
        assert_eq!(cache.registry().live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sweep_revokes_handle() {
        let cache = cache(4);
        let task = TaskId::new("t").unwrap();
        let name = ChartName::new("run_chart").unwrap();
        let image = cache.image_from(&task, &name, raw(b"x"));
        let handle = image.handle.clone();
        cache.charts.cache_item_with_ttl(&task, &name, image, Duration::from_millis(10));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.charts.cleanup(), 1);
        assert!(!cache.registry().is_live(&handle));
    }

    #[test]
    fn test_file_name_uses_content_type() {
        let cache = cache(1);
        let task = TaskId::new("t9").unwrap();
        let mut image = cache.image_from(&task, &ChartName::new("pareto_chart").unwrap(), raw(b""));
        assert_eq!(image.file_name(), "pareto_chart_t9.png");
        image.content_type = Some("image/svg+xml".into());
        assert_eq!(image.file_name(), "pareto_chart_t9.svg");
    }
}
