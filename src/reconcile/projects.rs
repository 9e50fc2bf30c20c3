//! Project ownership repair.
//!
//! Same policy as message owners: a project whose owner is gone is only
//! reassigned when the operator names a target user.

use super::{plan, Plan, Reconciler, Snapshot};
use crate::error::{ReconcileError, TargetKind};
use crate::report::{count_fixed, PartialReport, ProjectReport, RepairAction, RunMode};
use crate::store::{ReferenceStore, StoreResult};

/// Options for [`Reconciler::reconcile_projects`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    /// Report only; never write. Ignored when `fix` is false.
    pub dry_run: bool,
    /// Plan and apply repairs. When false the run only analyzes.
    pub fix: bool,
    pub target_owner_id: Option<String>,
}

impl<S: ReferenceStore + ?Sized> Reconciler<'_, S> {
    pub fn reconcile_projects(
        &mut self,
        options: &ProjectOptions,
    ) -> Result<ProjectReport, ReconcileError> {
        let snapshot = Snapshot::capture(&*self.store)?;
        let target = options.target_owner_id.as_deref();
        plan::validate_target(&snapshot.sets, TargetKind::Owner, target)?;

        let mode = match (options.fix, options.dry_run) {
            (false, _) => RunMode::Analyze,
            (true, true) => RunMode::DryRun,
            (true, false) => RunMode::Fix,
        };
        let mut plan = if options.fix {
            plan::plan_project_repairs(&snapshot, target)
        } else {
            Plan::default()
        };
        tracing::info!(
            mode = ?mode,
            projects = snapshot.projects.len(),
            planned = plan.actions.len(),
            "reconciling project owners"
        );
        for record in &plan.unfixed {
            tracing::warn!(
                project = %record.record_id,
                owner = %record.owner_id,
                "project owner is dangling and no target user was given"
            );
        }

        if mode.writes() {
            if let Err(source) = apply_project_actions(&mut *self.store, &mut plan.actions) {
                let report = build_project_report(mode, snapshot, plan);
                tracing::error!(
                    fixed = report.fixed_projects,
                    error = %source,
                    "store write failed; stopping"
                );
                return Err(ReconcileError::WriteFailed {
                    partial: Box::new(PartialReport::Projects(report)),
                    source,
                });
            }
        }
        Ok(build_project_report(mode, snapshot, plan))
    }
}

fn apply_project_actions<S: ReferenceStore + ?Sized>(
    store: &mut S,
    actions: &mut [RepairAction],
) -> StoreResult<()> {
    for action in actions {
        let owner = action.to.as_deref().unwrap_or_default();
        tracing::debug!(project = %action.record_id, from = %action.from, to = %owner, "reassigning project owner");
        store.update_project_owner(&action.record_id, owner)?;
        action.applied = true;
    }
    Ok(())
}

fn build_project_report(mode: RunMode, snapshot: Snapshot, plan: Plan) -> ProjectReport {
    let invalid_owner = snapshot
        .projects
        .iter()
        .filter(|p| !snapshot.sets.has_owner(&p.owner_id))
        .cloned()
        .collect();
    let fixed_projects = count_fixed(&plan.actions);
    ProjectReport {
        mode,
        total_projects: snapshot.projects.len(),
        valid_owners: snapshot.owners,
        invalid_owner,
        actions: plan.actions,
        unfixed: plan.unfixed,
        fixed_projects,
    }
}
