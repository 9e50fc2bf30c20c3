//! Command-line interface for nailit-reconcile
//!
//! Provides `messages`, `projects` and `init` subcommands. Reports go to
//! stdout; logs go to stderr.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::domain::OutputFormat;

mod init;
mod messages;
mod projects;
mod utils;

/// Find and repair orphaned user/project references on ingested messages
#[derive(Parser)]
#[command(name = "nailit-reconcile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// SQLite database path
    #[arg(long, value_name = "FILE", env = "NAILIT_DATABASE", global = true)]
    pub db: Option<PathBuf>,

    /// Path to config file (nailit.toml or nailit.yml)
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// How long to wait on a locked database before giving up
    #[arg(long, value_name = "MS", global = true)]
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report (and optionally repair) dangling user/project references on messages
    Messages(messages::MessagesArgs),

    /// Report (and optionally repair) projects whose user no longer exists
    Projects(projects::ProjectsArgs),

    /// Create the database schema, optionally loading a seed fixture
    Init(init::InitArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.global.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Messages(args) => messages::run(&cli.global, args),
        Commands::Projects(args) => projects::run(&cli.global, args),
        Commands::Init(args) => init::run(&cli.global, args),
    }
}
