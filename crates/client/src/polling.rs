//! Task status polling
//!
//! A [`PollingController`] watches one analysis task. A session runs in a
//! spawned tokio task:
//! - the first fetch is issued immediately
//! - `running` schedules the next fetch after the running interval, any other
//!   non-terminal status after the idle interval
//! - `completed` or `failed` ends the session with one notification; on
//!   `completed` the navigator is sent to `/results/{taskId}` after the
//!   redirect delay
//! - a retryable failure is retried on the backoff schedule; once the retries
//!   are used up, or on a non-retryable failure, the session ends in
//!   [`PollState::ErrorStopped`] with one persistent error notification

use crate::http::StatusSource;
use forcedash_config::PollingSettings;
use forcedash_core::{
    Error, Navigator, Notification, Notifier, Observable, Result, TaskId, TaskSnapshot, TaskStatus,
};
use forcedash_utils::tracing::poll_span;
use forcedash_utils::{BackoffPolicy, BackoffStrategy, RetryableError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Lifecycle of a polling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PollState {
    #[default]
    Idle,
    Polling,
    Completed,
    Failed,
    /// Gave up after transport failures
    ErrorStopped,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollState::Completed | PollState::Failed | PollState::ErrorStopped
        )
    }
}

/// Cadence and retry bounds for a controller
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub running_interval: Duration,
    pub idle_interval: Duration,
    pub retry: BackoffPolicy,
    pub redirect_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            running_interval: Duration::from_millis(2_000),
            idle_interval: Duration::from_millis(5_000),
            retry: BackoffPolicy::polling(),
            redirect_delay: Duration::from_millis(3_000),
        }
    }
}

impl From<&PollingSettings> for PollSettings {
    fn from(settings: &PollingSettings) -> Self {
        Self {
            running_interval: settings.running_interval(),
            idle_interval: settings.idle_interval(),
            retry: BackoffPolicy {
                max_retries: settings.max_retries,
                initial_delay: settings.retry_base(),
                max_delay: settings.retry_cap(),
                strategy: BackoffStrategy::Linear,
                jitter: false,
            },
            redirect_delay: settings.redirect_delay(),
        }
    }
}

struct Shared {
    task: TaskId,
    source: Arc<dyn StatusSource>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    settings: PollSettings,
    state: Observable<PollState>,
    current: Observable<Option<TaskSnapshot>>,
    last_error: Observable<Option<String>>,
    retry_count: AtomicU32,
    /// Bumped by every start and stop; a session only acts while it matches
    generation: AtomicU64,
    session: Mutex<Option<JoinHandle<()>>>,
    redirect: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Move from `Polling` to `next` if this session is still the live one
    fn finish(&self, generation: u64, next: PollState) -> bool {
        self.state.update(|state| {
            if *state == PollState::Polling && self.is_current(generation) {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    fn record_snapshot(&self, snapshot: &TaskSnapshot) {
        self.current.set(Some(snapshot.clone()));
        self.last_error.set(None);
    }

    fn results_path(&self) -> String {
        format!("/results/{}", self.task)
    }

    fn schedule_redirect(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let delay = self.settings.redirect_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.navigator.navigate_to(&shared.results_path());
        });
        if let Some(previous) = self.redirect.lock().replace(handle) {
            previous.abort();
        }
    }

    async fn run(self: Arc<Self>, generation: u64) {
        loop {
            if !self.is_current(generation) {
                return;
            }
            let delay = match self.source.task_status(&self.task).await {
                Ok(snapshot) => {
                    if !self.is_current(generation) {
                        return;
                    }
                    self.retry_count.store(0, Ordering::SeqCst);
                    self.record_snapshot(&snapshot);
                    debug!(status = %snapshot.status, progress = snapshot.progress, "task status");

                    match snapshot.status {
                        TaskStatus::Completed => {
                            self.on_completed(generation);
                            return;
                        }
                        TaskStatus::Failed => {
                            self.on_failed(generation, &snapshot);
                            return;
                        }
                        TaskStatus::Running => self.settings.running_interval,
                        _ => self.settings.idle_interval,
                    }
                }
                Err(err) => {
                    if !self.is_current(generation) {
                        return;
                    }
                    match self.on_fetch_error(generation, &err) {
                        Some(delay) => delay,
                        None => return,
                    }
                }
            };
            tokio::time::sleep(delay).await;
        }
    }

    fn on_completed(self: &Arc<Self>, generation: u64) {
        if !self.finish(generation, PollState::Completed) {
            return;
        }
        info!("analysis completed");
        self.notifier.notify(Notification::success(
            "Analysis complete",
            "The analysis finished successfully. Opening results.",
        ));
        self.schedule_redirect();
    }

    fn on_failed(&self, generation: u64, snapshot: &TaskSnapshot) {
        if !self.finish(generation, PollState::Failed) {
            return;
        }
        let message = snapshot
            .error
            .clone()
            .unwrap_or_else(|| "The task failed while running".to_string());
        warn!(error = %message, "analysis failed");
        self.notifier
            .notify(Notification::error("Analysis failed", message).persistent());
    }

    /// Delay before the next attempt, or `None` when the session ended
    fn on_fetch_error(&self, generation: u64, err: &Error) -> Option<Duration> {
        self.last_error.set(Some(err.to_string()));
        let retry = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;

        if err.is_retryable() && self.settings.retry.allows_retry(retry) {
            let delay = self.settings.retry.delay_for(retry);
            warn!(
                retry,
                max_retries = self.settings.retry.max_retries,
                ?delay,
                error = %err,
                "status fetch failed, retrying"
            );
            return Some(delay);
        }

        if self.finish(generation, PollState::ErrorStopped) {
            error!(retry, error = %err, "giving up on task status");
            self.notifier.notify(
                Notification::error(
                    "Connection problem",
                    format!(
                        "Could not fetch the task status ({err}). Check the connection and refresh to retry."
                    ),
                )
                .persistent(),
            );
        }
        None
    }
}

/// Polls the status of one analysis task
pub struct PollingController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PollingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingController")
            .field("task", &self.shared.task)
            .field("state", &self.shared.state.get())
            .field("retry_count", &self.retry_count())
            .finish()
    }
}

impl PollingController {
    pub fn new(
        task: TaskId,
        source: Arc<dyn StatusSource>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_settings(task, source, notifier, navigator, PollSettings::default())
    }

    pub fn with_settings(
        task: TaskId,
        source: Arc<dyn StatusSource>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        settings: PollSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                task,
                source,
                notifier,
                navigator,
                settings,
                state: Observable::new(PollState::Idle),
                current: Observable::new(None),
                last_error: Observable::new(None),
                retry_count: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                session: Mutex::new(None),
                redirect: Mutex::new(None),
            }),
        }
    }

    pub fn task(&self) -> &TaskId {
        &self.shared.task
    }

    /// Begin a polling session; no-op while one is running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let shared = &self.shared;
        let started = shared.state.update(|state| {
            if *state == PollState::Polling {
                false
            } else {
                *state = PollState::Polling;
                true
            }
        });
        if !started {
            return;
        }

        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        shared.retry_count.store(0, Ordering::SeqCst);
        shared.last_error.set(None);
        info!(task = %shared.task, "polling started");

        let span = poll_span(&shared.task);
        let handle = tokio::spawn(Arc::clone(shared).run(generation).instrument(span));
        if let Some(previous) = shared.session.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the pending poll and leave `Polling`; idempotent.
    ///
    /// Terminal states are kept. A scheduled redirect is not cancelled.
    pub fn stop(&self) {
        let shared = &self.shared;
        shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = shared.session.lock().take() {
            handle.abort();
        }
        let stopped = shared.state.update(|state| {
            if *state == PollState::Polling {
                *state = PollState::Idle;
                true
            } else {
                false
            }
        });
        if stopped {
            info!(task = %shared.task, "polling stopped");
        }
    }

    pub fn restart(&self) {
        self.stop();
        self.start();
    }

    /// Fetch the status once, outside the schedule.
    ///
    /// Starts a session when the task is still in progress and none is running.
    pub async fn force_refresh(&self) -> Result<TaskSnapshot> {
        let shared = &self.shared;
        match shared.source.task_status(&shared.task).await {
            Ok(snapshot) => {
                shared.record_snapshot(&snapshot);
                if !snapshot.status.is_terminal() && !self.is_polling() {
                    self.start();
                }
                Ok(snapshot)
            }
            Err(err) => {
                shared.last_error.set(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Stop polling and cancel a pending redirect
    pub fn dispose(&self) {
        self.stop();
        if let Some(handle) = self.shared.redirect.lock().take() {
            handle.abort();
        }
    }

    pub fn state(&self) -> PollState {
        self.shared.state.get()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollState> {
        self.shared.state.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollState::Polling
    }

    /// Last status snapshot received
    pub fn current(&self) -> Option<TaskSnapshot> {
        self.shared.current.get()
    }

    pub fn subscribe_current(&self) -> watch::Receiver<Option<TaskSnapshot>> {
        self.shared.current.subscribe()
    }

    /// Message of the last failed fetch, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.get()
    }

    pub fn retry_count(&self) -> u32 {
        self.shared.retry_count.load(Ordering::SeqCst)
    }

    /// Wait until the session reaches a terminal state or `Idle`
    pub async fn wait_until_settled(&self) -> PollState {
        let mut rx = self.subscribe_state();
        let settled = rx
            .wait_for(|state| *state != PollState::Polling)
            .await
            .map(|state| *state);
        settled.unwrap_or_else(|_| self.state())
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let settings = PollSettings::from(&PollingSettings::default());
        assert_eq!(settings, PollSettings::default());
        assert_eq!(settings.retry.delay_for(1), Duration::from_secs(10));
        assert_eq!(settings.retry.delay_for(3), Duration::from_secs(30));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PollState::Idle.is_terminal());
        assert!(!PollState::Polling.is_terminal());
        assert!(PollState::ErrorStopped.is_terminal());
    }
}
