//! Kiln - an asset build orchestrator.
//!
//! Builds declared assets into content-addressed outputs, records them in a
//! manifest and embeds that manifest into a client loader.

mod asset;
mod bootstrap;
mod builder;
mod bundler;
mod cli;
mod config;
mod embed;
mod hash;
mod logger;
mod manifest;
mod session;
mod transform;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::setup_shutdown_handler(cli.is_watch())?;

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }
    logger::set_verbose(cli.build_args().verbose);

    let options = cli::load_options(&cli)?;
    match &cli.command {
        Commands::Build { .. } => cli::build::build_assets(options).await,
        Commands::Watch { .. } => cli::watch::watch_assets(&cli, options).await,
    }
}
