mod auth;
mod cli;
mod config;
mod error;
mod exporter;
mod providers;
mod web;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Starting Buildkite exporter");
    cli.execute().await?;

    Ok(())
}
