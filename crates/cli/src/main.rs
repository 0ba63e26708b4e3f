use clap::Parser;
use forcedash_config::{CliOverrides, ConfigLoader};
use std::path::PathBuf;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "forcedash")]
#[command(about = "Terminal client for the force analysis dashboard", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file to read instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and FORCEDASH_API_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Enable or disable reading charts from the cache
    #[arg(long, global = true)]
    cache_enabled: Option<bool>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn loader(&self) -> ConfigLoader {
        let overrides = CliOverrides {
            base_url: self.base_url.clone(),
            cache_enabled: self.cache_enabled,
            ..self.command.overrides()
        };
        let loader = ConfigLoader::new().overrides(overrides);
        match &self.config {
            Some(path) => loader.path(path),
            None => loader,
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    forcedash_utils::tracing::init(cli.verbose)
        .map_err(|e| eyre::eyre!("failed to initialize logging: {e}"))?;

    let config = cli.loader().load()?;
    cli.command.execute(config).await
}
