mod commands;
mod config;
mod logging;
mod schedule;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

#[derive(Debug, Parser)]
#[command(name = "radar", version)]
#[command(about = "Append new releases from followed artists to a playlist.")]
struct Cli {
    /// RON config file; missing file means defaults.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Scan state file, overrides config and RADAR_STATE_PATH.
    #[arg(long, global = true, value_name = "PATH")]
    state: Option<PathBuf>,

    /// Target playlist id, overrides config and RADAR_PLAYLIST_ID.
    #[arg(long, global = true, value_name = "ID")]
    playlist: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Perform one bounded scan and exit.
    Run,
    /// Scan now and then at every scheduled time of day.
    Watch,
    /// Show the persisted scan state.
    Status,
    /// Discard the scan state so the next run bootstraps again.
    Reset,
    /// Create the target playlist and print its id.
    CreatePlaylist {
        #[arg(long)]
        name: String,
        #[arg(long)]
        private: bool,
        #[arg(long)]
        description: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    load_dotenv();

    let mut config = AppConfig::load(&cli.config)?;
    config.apply_env(config::env_var);
    if let Some(state) = cli.state {
        config.state_path = state;
    }
    if let Some(playlist) = cli.playlist {
        config.playlist_id = Some(playlist);
    }
    logging::initialize(
        config.log.destination,
        config.log.level_filter()?,
        &config.log.file,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Command::Run => runtime.block_on(commands::run(&config)),
        Command::Watch => runtime.block_on(commands::watch(&config)),
        Command::Status => commands::status(&config),
        Command::Reset => commands::reset(&config),
        Command::CreatePlaylist {
            name,
            private,
            description,
        } => runtime.block_on(commands::create_playlist(
            &config,
            &name,
            !private,
            description.as_deref(),
        )),
    }
}

fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Warning: ignoring .env: {err}");
        }
    }
}
