//! castlink command-line host.

mod app;
mod config;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Discover Cast receivers on the local network and cast media to them.
#[derive(Parser, Debug)]
#[command(name = "castlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "CASTLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run discovery and print what is found
    Discover {
        /// How long to discover for
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
    /// Cast a media URL to a receiver until Ctrl-C
    Cast {
        device_id: String,
        media_url: String,
        /// How long to wait for the device to be discovered
        #[arg(long, default_value_t = 15)]
        wait_secs: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // Logs go to stderr; stdout carries the event stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting castlink");

    let config = config::Config::load(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli.command, config))?;

    tracing::info!("castlink shut down cleanly");
    Ok(())
}
