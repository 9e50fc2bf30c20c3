//! Messages command implementation

use anyhow::Result;
use clap::Args;

use super::utils::{non_empty, open_store, print_partial_report, resolve_config};
use super::GlobalArgs;
use crate::domain::OutputFormat;
use crate::reconcile::{ReconcileOptions, Reconciler};
use crate::render::{render_json, render_report_text};

#[derive(Args, Debug)]
pub struct MessagesArgs {
    /// Repair dangling references instead of only reporting them
    #[arg(long)]
    pub fix: bool,

    /// With --fix, show what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// User id to assign to messages whose user no longer exists
    #[arg(long, value_name = "ID", requires = "fix")]
    pub target_user: Option<String>,

    /// Project id to assign to messages whose project no longer exists
    /// (default: clear the project reference)
    #[arg(long, value_name = "ID", requires = "fix")]
    pub target_project: Option<String>,
}

pub fn run(global: &GlobalArgs, args: MessagesArgs) -> Result<()> {
    let config = resolve_config(global)?;
    let mut store = open_store(&config)?;
    let mut reconciler = Reconciler::new(&mut store);

    let report = if args.fix {
        let options = ReconcileOptions {
            dry_run: args.dry_run,
            target_owner_id: non_empty(args.target_user),
            target_project_id: non_empty(args.target_project),
        };
        match reconciler.reconcile(&options) {
            Ok(report) => report,
            Err(err) => {
                print_partial_report(&err, config.format)?;
                return Err(err.into());
            }
        }
    } else {
        if args.dry_run {
            tracing::debug!("--dry-run without --fix only analyzes");
        }
        reconciler.analyze()?
    };

    let rendered = match config.format {
        OutputFormat::Json => render_json(&report)?,
        OutputFormat::Text => render_report_text(&report, console::colors_enabled()),
    };
    print!("{rendered}");
    Ok(())
}
