mod cache;
mod commands;
mod config;
mod db;
mod logging;
mod persist;
mod session;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "diraasti-offline")]
#[command(about = "Offline shell cache and local persistence for Diraasti")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./diraasti.yaml or $XDG_CONFIG_HOME/diraasti/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Origin the precache manifest is resolved against
  #[arg(short, long)]
  origin: Option<String>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override origin if specified on command line
  let config = if let Some(origin) = args.origin {
    config::Config { origin, ..config }
  } else {
    config
  };

  // Held until exit so file logs are flushed
  let _log_guard = logging::init(&config.logging)?;

  commands::run(args.command, &config).await
}
