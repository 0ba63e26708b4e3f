use eyre::WrapErr;
use forcedash_client::{chart_catalog, DashboardContext, LoadOutcome, Progress};
use std::path::PathBuf;
use tracing::{debug, info};

pub async fn load(
    context: &DashboardContext,
    task: &str,
    names: Vec<String>,
    force: bool,
    out: Option<PathBuf>,
) -> eyre::Result<()> {
    let names = if names.is_empty() {
        chart_catalog().iter().map(|name| name.to_string()).collect()
    } else {
        names
    };

    let loader = context.loader(task)?;
    let mut options = loader.defaults();
    options.force = force;

    let on_progress: &(dyn Fn(Progress) + Send + Sync) =
        &|p: Progress| debug!(completed = p.completed, total = p.total, "{}%", p.percent);
    let report = loader.load_all(&names, &options, Some(on_progress)).await;

    if let Some(dir) = &out {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
    }

    for (name, outcome) in &report.results {
        match outcome {
            LoadOutcome::Success(image) => {
                println!("ok      {name} ({} bytes)", image.data.len());
                if let Some(dir) = &out {
                    let path = dir.join(image.file_name());
                    std::fs::write(&path, &image.data)
                        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
                }
            }
            LoadOutcome::Failure { message } => println!("failed  {name}: {message}"),
        }
    }

    let stats = context.charts().stats();
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        cached = stats.total_items,
        "chart load finished"
    );
    if report.succeeded() == 0 {
        return Err(eyre::eyre!("no charts could be loaded for task {task}"));
    }
    Ok(())
}

pub async fn meta(context: &DashboardContext, task: &str, chart: &str) -> eyre::Result<()> {
    let metadata = context.chart_metadata(task, chart).await?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}
