//! Batch loading against a scripted chart source, on virtual time

mod common;

use common::{chart_cache, loader, names, task, MockCharts};
use forcedash_client::{LoadOptions, Progress};
use forcedash_core::{ChartName, NotificationKind, NotificationLog};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn options(concurrency: usize) -> LoadOptions {
    LoadOptions {
        concurrency,
        ..LoadOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_windows_bound_concurrency_and_report_every_chart() {
    let source = MockCharts::new();
    source.fail("c3", 404);
    source.fail("c7", 500);
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log.clone());
    let requested = names("c", 10);

    let started = Instant::now();
    let report = loader.load_all(&requested, &options(3), None).await;

    // four windows of 100ms each: 3 + 3 + 3 + 1
    assert_eq!(started.elapsed(), Duration::from_millis(400));
    assert_eq!(source.max_in_flight(), 3);
    assert_eq!(source.in_flight(), 0);
    assert_eq!(source.calls().len(), 10);

    assert_eq!(report.len(), 10);
    let order: Vec<&str> = report.results.keys().map(String::as_str).collect();
    assert_eq!(order, requested.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(report.succeeded(), 8);
    assert_eq!(report.get("c3").unwrap().error_message(), Some("resource not found"));
    assert_eq!(report.get("c7").unwrap().error_message(), Some("server error"));
    let image = report.get("c0").unwrap().image().unwrap();
    assert_eq!(image.data.as_ref(), b"png:c0");

    // failures only show up in the summary
    let all = log.notifications();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].kind, NotificationKind::Warning);
    assert_eq!(all[0].message, "Loaded 8 charts, 2 failed");
}

#[tokio::test(start_paused = true)]
async fn test_next_window_waits_for_slowest_item() {
    let source = MockCharts::new();
    source.delay("c0", Duration::from_millis(500));
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log);

    let started = Instant::now();
    let report = loader.load_all(&names("c", 4), &options(3), None).await;

    assert_eq!(report.succeeded(), 4);
    assert_eq!(source.started_at("c1"), Some(started));
    assert_eq!(
        source.started_at("c3"),
        Some(started + Duration::from_millis(500))
    );
    assert_eq!(started.elapsed(), Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_only_the_slow_chart() {
    let source = MockCharts::new();
    source.delay("c1", Duration::from_secs(60));
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log);
    let opts = LoadOptions {
        concurrency: 3,
        timeout: Duration::from_secs(1),
        force: false,
    };

    let started = Instant::now();
    let report = loader.load_all(&names("c", 3), &opts, None).await;

    assert_eq!(started.elapsed(), Duration::from_secs(1));
    assert_eq!(report.get("c1").unwrap().error_message(), Some("timeout"));
    assert!(report.get("c0").unwrap().is_success());
    assert!(report.get("c2").unwrap().is_success());
    // the abandoned request was dropped
    assert_eq!(source.in_flight(), 0);
    assert_eq!(loader.chart_status("c1").unwrap().error.as_deref(), Some("timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_second_load_is_served_from_cache() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log.clone());
    let requested = names("c", 3);

    loader.load_all(&requested, &options(3), None).await;
    assert_eq!(source.calls().len(), 3);

    let started = Instant::now();
    let report = loader.load_all(&requested, &options(3), None).await;
    assert_eq!(report.succeeded(), 3);
    assert_eq!(source.calls().len(), 3);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(log.of_kind(NotificationKind::Success).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_force_bypasses_cache_and_revalidates() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let cache = chart_cache();
    let loader = loader(source.clone(), cache.clone(), log);
    let requested = names("c", 2);

    loader.load_all(&requested, &options(3), None).await;
    let report = loader.refresh_all(&requested).await;
    assert_eq!(report.succeeded(), 2);

    let calls = source.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[..2].iter().all(|(_, force)| !force));
    assert!(calls[2..].iter().all(|(_, force)| *force));
    // replaced images released their old handles
    assert_eq!(cache.registry().live_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_bypassing_cache_still_stores_results() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let cache = chart_cache();
    let loader = loader(source.clone(), cache.clone(), log).bypass_cache(true);
    let requested = names("c", 2);

    loader.load_all(&requested, &options(3), None).await;
    loader.load_all(&requested, &options(3), None).await;

    assert_eq!(source.calls().len(), 4);
    assert!(source.calls().iter().all(|(_, force)| !force));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.registry().live_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_names_load_once() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log);

    let report = loader
        .load_all(&["c0", "c1", "c0"], &options(3), None)
        .await;
    assert_eq!(report.len(), 2);
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_each_settled_chart() {
    let source = MockCharts::new();
    source.delay("c0", Duration::from_millis(300));
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source, chart_cache(), log);
    let seen = Arc::new(Mutex::new(Vec::<Progress>::new()));
    let sink = seen.clone();
    let on_progress: Box<dyn Fn(Progress) + Send + Sync> = Box::new(move |p| sink.lock().push(p));

    loader
        .load_all(&names("c", 3), &options(3), Some(on_progress.as_ref()))
        .await;

    let seen = seen.lock().clone();
    let completed: Vec<usize> = seen.iter().map(|p| p.completed).collect();
    let percents: Vec<u8> = seen.iter().map(|p| p.percent).collect();
    assert_eq!(completed, vec![1, 2, 3]);
    assert_eq!(percents, vec![33, 67, 100]);
    assert!(seen.iter().all(|p| p.total == 3));
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_warns() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log.clone());

    let report = loader.load_all::<&str>(&[], &options(3), None).await;
    assert!(report.is_empty());
    assert!(source.calls().is_empty());
    let warnings = log.of_kind(NotificationKind::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].title, "No charts");
}

#[tokio::test(start_paused = true)]
async fn test_summary_for_all_success_and_all_failure() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log.clone());

    loader.load_all(&names("ok", 2), &options(3), None).await;
    source.fail("bad0", 500);
    source.fail("bad1", 404);
    loader.load_all(&names("bad", 2), &options(3), None).await;

    let all = log.notifications();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].kind, NotificationKind::Success);
    assert_eq!(all[0].message, "Loaded all 2 charts");
    assert_eq!(all[1].kind, NotificationKind::Error);
    assert_eq!(all[1].message, "All 2 charts failed to load");
}

#[tokio::test(start_paused = true)]
async fn test_retry_failed_reloads_only_failures() {
    let source = MockCharts::new();
    source.fail("c1", 500);
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log.clone());

    loader.load_all(&names("c", 3), &options(3), None).await;
    assert_eq!(loader.failed_charts(), vec!["c1".to_string()]);
    assert_eq!(loader.success_rate(), 67);

    source.heal("c1");
    log.clear();
    let report = loader.retry_failed().await;
    assert_eq!(report.len(), 1);
    assert!(report.get("c1").unwrap().is_success());
    assert_eq!(source.calls().last(), Some(&("c1".to_string(), true)));
    assert!(loader.failed_charts().is_empty());
    assert_eq!(loader.success_rate(), 100);

    let infos = log.of_kind(NotificationKind::Info);
    assert_eq!(infos[0].message, "Retrying 1 failed charts");
}

#[tokio::test(start_paused = true)]
async fn test_retry_failed_with_nothing_failed() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source.clone(), chart_cache(), log.clone());

    let report = loader.retry_failed().await;
    assert!(report.is_empty());
    assert!(source.calls().is_empty());
    let infos = log.of_kind(NotificationKind::Info);
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].message, "No failed charts to retry");
}

#[tokio::test(start_paused = true)]
async fn test_chart_info_tracks_failures() {
    let source = MockCharts::new();
    source.fail("broken", 500);
    let log = Arc::new(NotificationLog::new());
    let loader = loader(source, chart_cache(), log);

    assert!(loader.load("fine").await.is_ok());
    assert!(loader.load("broken").await.is_err());
    assert!(loader.refresh_chart("broken").await.is_err());

    let fine = loader.chart_info("fine");
    assert!(fine.is_loaded());
    assert!(!fine.is_loading());

    let broken = loader.chart_info("broken");
    assert!(!broken.is_loaded());
    assert_eq!(broken.error(), Some("server error"));
    assert_eq!(broken.retry_count(), 2);

    assert_eq!(loader.loaded_charts(), vec!["fine".to_string()]);
    assert!(loader.loading_charts().is_empty());
    assert_eq!(loader.success_rate(), 50);

    let unknown = loader.chart_info("never");
    assert!(unknown.image.is_none() && unknown.status.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_chart_info_leaves_cache_statistics_alone() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let cache = chart_cache();
    let loader = loader(source, cache.clone(), log);

    assert!(loader.load("fine").await.is_ok());
    let before = cache.stats();

    for _ in 0..10 {
        assert!(loader.chart_info("fine").is_loaded());
    }

    let after = cache.stats();
    assert_eq!(after.hits, before.hits);
    assert_eq!(after.misses, before.misses);
    assert_eq!(after.total_items, 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_and_dispose_revoke_handles() {
    let source = MockCharts::new();
    let log = Arc::new(NotificationLog::new());
    let cache = chart_cache();
    let loader = loader(source, cache.clone(), log);

    loader.load_all(&names("c", 3), &options(3), None).await;
    assert_eq!(cache.registry().live_count(), 3);

    let first = cache
        .get_chart(&task(), &ChartName::new("c0").unwrap())
        .unwrap();
    loader.clear_chart("c0");
    assert!(!cache.registry().is_live(&first.handle));
    assert!(loader.chart_status("c0").is_none());
    assert_eq!(cache.registry().live_count(), 2);

    loader.dispose();
    assert_eq!(cache.registry().live_count(), 0);
    assert!(cache.is_empty());
    assert!(loader.failed_charts().is_empty() && loader.loaded_charts().is_empty());
}
