use clap::Subcommand;
use forcedash_client::DashboardContext;
use forcedash_config::{CliOverrides, ClientConfig};
use forcedash_core::TracingNotifier;
use std::path::PathBuf;
use std::sync::Arc;

pub mod charts;
pub mod task;

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the status of an analysis task once
    #[command(visible_alias = "s")]
    Status {
        /// Task id
        task: String,
    },

    /// Poll a task until it completes, fails, or polling gives up
    #[command(visible_alias = "w")]
    Watch {
        /// Task id
        task: String,
    },

    /// Load the charts of a task
    #[command(visible_alias = "c")]
    Charts {
        /// Task id
        task: String,

        /// Chart names to load (defaults to the full catalog)
        #[arg(short, long, value_delimiter = ',')]
        names: Vec<String>,

        /// Number of charts fetched at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-chart deadline in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Bypass the cache and ask the server to revalidate
        #[arg(short, long)]
        force: bool,

        /// Write every loaded chart into this directory
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Show HEAD metadata for one chart
    Meta {
        /// Task id
        task: String,
        /// Chart name
        chart: String,
    },

    /// Print the analysis results document of a finished task
    Results {
        /// Task id
        task: String,
    },

    /// List the chart names loaded by default
    Catalog,
}

impl Commands {
    /// Command specific configuration overrides
    pub fn overrides(&self) -> CliOverrides {
        match self {
            Commands::Charts {
                concurrency,
                timeout_ms,
                ..
            } => CliOverrides {
                concurrency: *concurrency,
                loader_timeout_ms: *timeout_ms,
                ..CliOverrides::default()
            },
            _ => CliOverrides::default(),
        }
    }

    pub async fn execute(self, config: ClientConfig) -> eyre::Result<()> {
        if let Commands::Catalog = self {
            for name in forcedash_client::chart_catalog() {
                println!("{name}");
            }
            return Ok(());
        }

        let reporter = Arc::new(TracingNotifier);
        let context = DashboardContext::new(config, reporter.clone(), reporter)?;

        match self {
            Commands::Status { task } => task::status(&context, &task).await,
            Commands::Watch { task } => task::watch(&context, &task).await,
            Commands::Charts {
                task,
                names,
                force,
                out,
                ..
            } => charts::load(&context, &task, names, force, out).await,
            Commands::Meta { task, chart } => charts::meta(&context, &task, &chart).await,
            Commands::Results { task } => task::results(&context, &task).await,
            Commands::Catalog => Ok(()),
        }
    }
}
