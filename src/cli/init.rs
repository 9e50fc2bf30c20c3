//! Init command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use super::utils::resolve_config;
use super::GlobalArgs;
use crate::store::fixture::load_fixture;
use crate::store::SqliteStore;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// JSON or YAML fixture with owners, projects and messages to load
    #[arg(long, value_name = "FILE")]
    pub seed: Option<PathBuf>,
}

pub fn run(global: &GlobalArgs, args: InitArgs) -> Result<()> {
    let config = resolve_config(global)?;
    // Parse the fixture first so a bad file leaves no half-created database.
    let fixture = args.seed.as_deref().map(load_fixture).transpose()?;

    let mut store =
        SqliteStore::create(&config.database, Duration::from_millis(config.busy_timeout_ms))?;
    println!("Database ready at {}", store.path().display());

    if let Some(fixture) = fixture {
        store
            .insert_all(&fixture.owners, &fixture.projects, &fixture.messages)
            .context("Failed loading seed fixture")?;
        println!("  users loaded: {}", fixture.owners.len());
        println!("  projects loaded: {}", fixture.projects.len());
        println!("  messages loaded: {}", fixture.messages.len());
    }
    Ok(())
}
