//! Projects command implementation

use anyhow::Result;
use clap::Args;

use super::utils::{non_empty, open_store, print_partial_report, resolve_config};
use super::GlobalArgs;
use crate::domain::OutputFormat;
use crate::reconcile::{ProjectOptions, Reconciler};
use crate::render::{render_json, render_project_report_text};

#[derive(Args, Debug)]
pub struct ProjectsArgs {
    /// Reassign projects whose user no longer exists
    #[arg(long)]
    pub fix: bool,

    /// With --fix, show what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// User id that takes over projects whose user no longer exists
    #[arg(long, value_name = "ID", requires = "fix")]
    pub target_user: Option<String>,
}

pub fn run(global: &GlobalArgs, args: ProjectsArgs) -> Result<()> {
    let config = resolve_config(global)?;
    let mut store = open_store(&config)?;

    let options = ProjectOptions {
        dry_run: args.dry_run,
        fix: args.fix,
        target_owner_id: non_empty(args.target_user),
    };
    let report = match Reconciler::new(&mut store).reconcile_projects(&options) {
        Ok(report) => report,
        Err(err) => {
            print_partial_report(&err, config.format)?;
            return Err(err.into());
        }
    };

    let rendered = match config.format {
        OutputFormat::Json => render_json(&report)?,
        OutputFormat::Text => render_project_report_text(&report, console::colors_enabled()),
    };
    print!("{rendered}");
    Ok(())
}
