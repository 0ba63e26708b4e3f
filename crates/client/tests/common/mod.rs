//! Scripted sources shared by the client integration tests
#![allow(dead_code)]

use bytes::Bytes;
use forcedash_cache::CacheOptions;
use forcedash_client::{
    BatchResourceLoader, BlobRegistry, ChartCache, ChartMetadata, ChartSource, RawChart,
    StatusSource,
};
use forcedash_core::{
    ChartName, Error, NotificationLog, Result, TaskId, TaskSnapshot, TaskStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub fn task() -> TaskId {
    TaskId::new("task-1").unwrap()
}

/// One scripted answer of the status endpoint
#[derive(Debug, Clone)]
pub enum Step {
    Pending,
    Running,
    Completed,
    Failed(&'static str),
    Transport,
    Http(u16),
}

impl Step {
    fn into_result(self) -> Result<TaskSnapshot> {
        match self {
            Step::Pending => Ok(TaskSnapshot::new(TaskStatus::Pending)),
            Step::Running => Ok(TaskSnapshot::new(TaskStatus::Running).with_progress(50.0)),
            Step::Completed => Ok(TaskSnapshot::new(TaskStatus::Completed).with_progress(100.0)),
            Step::Failed(reason) => Ok(TaskSnapshot::new(TaskStatus::Failed).with_error(reason)),
            Step::Transport => Err(Error::transport("/api/task/task-1", "connection refused")),
            Step::Http(status) => Err(Error::http("/api/task/task-1", status, "")),
        }
    }
}

/// Plays back a script; the last step repeats once the script runs out
pub struct ScriptedStatus {
    script: Mutex<Vec<Step>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedStatus {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        let mut script: Vec<Step> = steps.into_iter().collect();
        script.reverse();
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }
}

#[async_trait::async_trait]
impl StatusSource for ScriptedStatus {
    async fn task_status(&self, _task: &TaskId) -> Result<TaskSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());
        let step = {
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop()
            } else {
                script.last().cloned()
            }
        };
        step.unwrap_or(Step::Pending).into_result()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Chart source with per-chart latency and failure status
pub struct MockCharts {
    default_delay: Duration,
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashMap<String, u16>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, bool)>>,
    starts: Mutex<HashMap<String, Instant>>,
}

impl MockCharts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            default_delay: Duration::from_millis(100),
            delays: Mutex::default(),
            failures: Mutex::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::default(),
            starts: Mutex::default(),
        })
    }

    pub fn delay(&self, name: &str, delay: Duration) {
        self.delays.lock().insert(name.to_string(), delay);
    }

    pub fn fail(&self, name: &str, status: u16) {
        self.failures.lock().insert(name.to_string(), status);
    }

    pub fn heal(&self, name: &str) {
        self.failures.lock().remove(name);
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().clone()
    }

    pub fn started_at(&self, name: &str) -> Option<Instant> {
        self.starts.lock().get(name).copied()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChartSource for MockCharts {
    async fn fetch_chart(&self, _task: &TaskId, name: &ChartName, force: bool) -> Result<RawChart> {
        self.calls.lock().push((name.to_string(), force));
        self.starts.lock().insert(name.to_string(), Instant::now());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self
            .delays
            .lock()
            .get(name.as_str())
            .copied()
            .unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;

        let failure = self.failures.lock().get(name.as_str()).copied();
        match failure {
            Some(status) => Err(Error::http(format!("/api/chart/task-1/{name}"), status, "")),
            None => Ok(RawChart {
                data: Bytes::from(format!("png:{name}")),
                content_type: Some("image/png".to_string()),
            }),
        }
    }

    async fn chart_metadata(&self, _task: &TaskId, name: &ChartName) -> Result<ChartMetadata> {
        Ok(ChartMetadata {
            name: name.to_string(),
            size: Some(4),
            content_type: Some("image/png".to_string()),
            last_modified: None,
            url: format!("http://mock/api/chart/task-1/{name}"),
        })
    }
}

pub fn chart_cache() -> Arc<ChartCache> {
    Arc::new(
        ChartCache::new(
            CacheOptions::charts().without_auto_cleanup(),
            Arc::new(BlobRegistry::new()),
        )
        .unwrap(),
    )
}

pub fn loader(
    source: Arc<MockCharts>,
    cache: Arc<ChartCache>,
    log: Arc<NotificationLog>,
) -> BatchResourceLoader {
    BatchResourceLoader::new(task(), source, cache, log)
}

pub fn names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}
