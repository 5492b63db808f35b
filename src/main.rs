// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Mavenfeed CLI - incremental Maven Central collector and release feed

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use mavenfeed::commands::{self, Output};
use mavenfeed::config;
use mavenfeed::schedule::RunMode;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mavenfeed")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "MAVENFEED_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, env = "MAVENFEED_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect new releases (default when no command is given)
    Collect {
        /// Skip the weekly gate and run incrementally
        #[arg(long, conflicts_with = "deep")]
        incremental: bool,

        /// Force a deep scan regardless of the day
        #[arg(long)]
        deep: bool,
    },

    /// Compact the release queue
    Compact {
        /// Expiry window in minutes (defaults to the configured value)
        #[arg(long)]
        expiry_mins: Option<u64>,
    },

    /// Regenerate the JSON Feed from the release queue
    Feed,

    /// Show watermark, weekly flag, index and queue state
    Status,

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over the flags
    let log_level = match cli.verbose {
        0 if cli.quiet => LevelFilter::ERROR,
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let out = Output {
        json: cli.json,
        color: !cli.no_color && std::io::stdout().is_terminal(),
    };

    let command = cli.command.unwrap_or(Commands::Collect {
        incremental: false,
        deep: false,
    });

    // Completions need no configuration
    let load_config = || config::load(cli.config.as_deref(), cli.data_dir.as_deref());

    // Execute command
    match command {
        Commands::Collect { incremental, deep } => {
            let force = match (incremental, deep) {
                (true, _) => Some(RunMode::Incremental),
                (_, true) => Some(RunMode::DeepScan),
                _ => None,
            };
            commands::collect::run(&load_config()?, force, out)
        }
        Commands::Compact { expiry_mins } => commands::compact::run(&load_config()?, expiry_mins, out),
        Commands::Feed => commands::feed::run(&load_config()?, out),
        Commands::Status => commands::status::run(&load_config()?, out),
        Commands::Completions { shell } => commands::completions::run(shell, &mut Cli::command()),
    }
}
