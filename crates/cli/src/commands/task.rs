use forcedash_client::{DashboardContext, PollState};
use forcedash_core::TaskSnapshot;
use std::future::Future;
use tokio::sync::watch;
use tracing::info;

fn print_snapshot(snapshot: &TaskSnapshot) {
    let mut line = format!("{:<10} {:>5.1}%", snapshot.status.as_str(), snapshot.progress);
    if let Some(message) = &snapshot.message {
        line.push_str("  ");
        line.push_str(message);
    }
    if let Some(error) = &snapshot.error {
        line.push_str("  error: ");
        line.push_str(error);
    }
    println!("{line}");
}

pub async fn status(context: &DashboardContext, task: &str) -> eyre::Result<()> {
    let poller = context.poller(task)?;
    let snapshot = poller.force_refresh().await?;
    // a one-shot query must not leave a session behind
    poller.dispose();
    print_snapshot(&snapshot);
    Ok(())
}

/// Print snapshots until the state leaves `Polling` or `stop` resolves.
/// The snapshot that settled the task is always printed.
async fn follow<F>(
    mut current: watch::Receiver<Option<TaskSnapshot>>,
    mut state: watch::Receiver<PollState>,
    stop: F,
    mut emit: impl FnMut(&TaskSnapshot),
) -> bool
where
    F: Future<Output = ()>,
{
    tokio::pin!(stop);
    let mut printed: Option<TaskSnapshot> = None;
    let interrupted = loop {
        tokio::select! {
            biased;
            changed = current.changed() => {
                if changed.is_err() {
                    break false;
                }
                let snapshot = current.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    emit(&snapshot);
                    printed = Some(snapshot);
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break false;
                }
                let now = *state.borrow_and_update();
                if now != PollState::Polling {
                    break false;
                }
            }
            _ = &mut stop => break true,
        }
    };

    let last = current.borrow().clone();
    if let Some(snapshot) = last {
        if printed.as_ref() != Some(&snapshot) {
            emit(&snapshot);
        }
    }
    interrupted
}

/// Follow a task until polling settles, printing every status change
pub async fn watch(context: &DashboardContext, task: &str) -> eyre::Result<()> {
    let poller = context.poller(task)?;
    let current = poller.subscribe_current();
    let state = poller.subscribe_state();
    poller.start();
    info!(task, "watching task");

    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    if follow(current, state, ctrl_c, print_snapshot).await {
        info!("interrupted");
        poller.stop();
    }

    let last = poller.state();
    poller.dispose();
    match last {
        PollState::Completed => {
            println!("completed: results at /results/{task}");
            Ok(())
        }
        PollState::Failed => Err(eyre::eyre!("task {task} failed")),
        PollState::ErrorStopped => Err(eyre::eyre!(
            "gave up polling task {task}: {}",
            poller.last_error().unwrap_or_default()
        )),
        PollState::Idle | PollState::Polling => Ok(()),
    }
}

pub async fn results(context: &DashboardContext, task: &str) -> eyre::Result<()> {
    let document = context.results_for(task).await?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
