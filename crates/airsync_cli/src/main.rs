//! AirSync CLI
//!
//! Command-line tools for the AirSync engine.
//!
//! # Commands
//!
//! - `replay` - Replay a recorded session against the in-memory backend
//! - `config` - Print the effective engine configuration

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// AirSync engine tools.
#[derive(Parser)]
#[command(name = "airsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session against the in-memory backend
    Replay {
        /// Session file (JSON)
        session: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the effective engine configuration
    Config,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Replay { session, format } => {
            commands::replay::run(&session, config, &format)?;
        }
        Commands::Config => commands::config::run(&config)?,
        Commands::Version => {
            println!("AirSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
