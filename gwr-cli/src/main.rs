//! GWR CLI - Command line tool for retrieving and summarizing USGS groundwater levels.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gwr-cli",
    version,
    about = "Groundwater level retrieval toolkit"
)]
struct Cli {
    /// TOML file with pipeline defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: gwr_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = gwr_cmd::PipelineConfig::load(cli.config.as_deref())?;
    log::debug!("Pipeline config: {:?}", config);
    gwr_cmd::run(cli.command, &config).await
}
