//! Shared CLI utilities.

use anyhow::{Context, Result};
use std::time::Duration;

use super::GlobalArgs;
use crate::config::{load_config, merge_cli_with_config, CliOverrides};
use crate::domain::{Config, OutputFormat};
use crate::error::ReconcileError;
use crate::render::{render_json, render_project_report_text, render_report_text};
use crate::report::PartialReport;
use crate::store::SqliteStore;

/// Resolve settings: CLI flag > environment > config file > defaults.
pub fn resolve_config(global: &GlobalArgs) -> Result<Config> {
    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let file_config = load_config(&cwd, global.config.as_deref())?;
    Ok(merge_cli_with_config(file_config, cli_overrides(global)))
}

fn cli_overrides(global: &GlobalArgs) -> CliOverrides {
    CliOverrides {
        database: global.db.clone(),
        format: global.format,
        busy_timeout_ms: global.busy_timeout_ms,
    }
}

/// Open an existing store. The handle closes its connection when dropped, on
/// success and error paths alike.
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    let store = SqliteStore::open(&config.database, Duration::from_millis(config.busy_timeout_ms))?;
    tracing::info!("using database {}", store.path().display());
    Ok(store)
}

/// Print the report carried by an interrupted fix run, so the operator sees
/// which repairs committed before the error is returned.
pub fn print_partial_report(err: &ReconcileError, format: OutputFormat) -> Result<()> {
    let Some(partial) = err.partial_report() else {
        return Ok(());
    };
    let color = console::colors_enabled();
    let rendered = match (format, partial) {
        (OutputFormat::Json, partial) => render_json(partial)?,
        (OutputFormat::Text, PartialReport::Messages(report)) => render_report_text(report, color),
        (OutputFormat::Text, PartialReport::Projects(report)) => {
            render_project_report_text(report, color)
        }
    };
    print!("{rendered}");
    Ok(())
}

/// Trim a flag value, treating blank input as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
