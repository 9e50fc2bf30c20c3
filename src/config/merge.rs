//! CLI override merging

use crate::domain::{Config, OutputFormat};
use std::path::PathBuf;

/// Values given on the command line (or via clap's `env` fallback). `None`
/// leaves the file/default value in place.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub busy_timeout_ms: Option<u64>,
}

pub fn merge_cli_with_config(mut config: Config, cli: CliOverrides) -> Config {
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(timeout) = cli.busy_timeout_ms {
        config.busy_timeout_ms = timeout;
    }
    config
}
