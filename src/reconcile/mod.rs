//! Orphaned reference reconciliation.
//!
//! A run reads one [`Snapshot`] of owners, projects and messages, decides
//! every repair from that snapshot, and then (outside dry-run mode) writes the
//! repairs one at a time in message creation order. Nothing is retried; a
//! store failure aborts the run with whatever writes already committed left in
//! place, and the error carries the report of what was written. Re-running is
//! safe because a repaired reference resolves and is not visited again.

pub mod plan;
mod projects;

pub use plan::{Findings, Plan, Snapshot};
pub use projects::ProjectOptions;

use crate::error::{ReconcileError, TargetKind};
use crate::report::{count_fixed, PartialReport, RepairAction, RepairKind, Report, RunMode};
use crate::store::{ReferenceStore, StoreResult};

/// Options for [`Reconciler::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub dry_run: bool,
    /// Required to repair messages whose owner no longer exists.
    pub target_owner_id: Option<String>,
    /// Replacement for dangling project references. When absent they are
    /// cleared to null.
    pub target_project_id: Option<String>,
}

/// Reconciler over an explicitly provided store handle.
pub struct Reconciler<'s, S: ReferenceStore + ?Sized> {
    store: &'s mut S,
}

impl<'s, S: ReferenceStore + ?Sized> Reconciler<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    /// Report dangling references without writing anything.
    pub fn analyze(&self) -> Result<Report, ReconcileError> {
        let snapshot = Snapshot::capture(&*self.store)?;
        tracing::info!(
            messages = snapshot.messages.len(),
            owners = snapshot.owners.len(),
            projects = snapshot.projects.len(),
            "analyzing message references"
        );
        Ok(build_report(RunMode::Analyze, snapshot, Plan::default()))
    }

    /// Detect and repair dangling references.
    ///
    /// Targets are validated against the fresh snapshot before any write; an
    /// unknown target fails with [`ReconcileError::InvalidTarget`] even in
    /// dry-run mode.
    pub fn reconcile(&mut self, options: &ReconcileOptions) -> Result<Report, ReconcileError> {
        let snapshot = Snapshot::capture(&*self.store)?;
        let target_owner = options.target_owner_id.as_deref();
        let target_project = options.target_project_id.as_deref();
        plan::validate_target(&snapshot.sets, TargetKind::Owner, target_owner)?;
        plan::validate_target(&snapshot.sets, TargetKind::Project, target_project)?;

        let mut plan = plan::plan_message_repairs(&snapshot, target_owner, target_project);
        let mode = if options.dry_run { RunMode::DryRun } else { RunMode::Fix };
        tracing::info!(
            mode = ?mode,
            messages = snapshot.messages.len(),
            planned = plan.actions.len(),
            unfixable = plan.unfixed.len(),
            "reconciling message references"
        );
        for record in &plan.unfixed {
            tracing::warn!(
                message_id = %record.record_id,
                owner = %record.owner_id,
                "owner reference is dangling and no target user was given"
            );
        }

        if mode.writes() {
            if let Err(source) = apply_message_actions(&mut *self.store, &mut plan.actions) {
                let report = build_report(mode, snapshot, plan);
                tracing::error!(
                    fixed = report.fixed_messages,
                    error = %source,
                    "store write failed; stopping"
                );
                return Err(ReconcileError::WriteFailed {
                    partial: Box::new(PartialReport::Messages(report)),
                    source,
                });
            }
        }
        Ok(build_report(mode, snapshot, plan))
    }
}

/// Write actions in order, marking each applied as it commits. Stops at the
/// first failure.
fn apply_message_actions<S: ReferenceStore + ?Sized>(
    store: &mut S,
    actions: &mut [RepairAction],
) -> StoreResult<()> {
    actions.iter_mut().try_for_each(|action| apply_message_action(store, action))
}

fn apply_message_action<S: ReferenceStore + ?Sized>(
    store: &mut S,
    action: &mut RepairAction,
) -> StoreResult<()> {
    tracing::debug!(message_id = %action.record_id, kind = ?action.kind, from = %action.from, to = ?action.to, "applying repair");
    match action.kind {
        RepairKind::ReassignOwner => {
            let owner = action.to.as_deref().unwrap_or_default();
            store.update_message_owner(&action.record_id, owner)?;
        }
        RepairKind::ReassignProject | RepairKind::ClearProject => {
            store.update_message_project(&action.record_id, action.to.as_deref())?;
        }
    }
    action.applied = true;
    Ok(())
}

fn build_report(mode: RunMode, snapshot: Snapshot, plan: Plan) -> Report {
    let findings = plan::detect(&snapshot);
    let fixed_messages = count_fixed(&plan.actions);
    Report {
        mode,
        total_messages: snapshot.messages.len(),
        valid_owners: snapshot.owners,
        valid_projects: snapshot.projects,
        invalid_owner: findings.invalid_owner,
        invalid_project: findings.invalid_project,
        actions: plan.actions,
        unfixed: plan.unfixed,
        fixed_messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, Owner, Project};
    use crate::error::StoreError;
    use crate::report::UnfixableReason;
    use crate::store::memory::FailingStore;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    fn owner(id: &str) -> Owner {
        Owner { id: id.to_string(), email: format!("{id}@example.com") }
    }

    fn project(id: &str, owner_id: &str) -> Project {
        Project { id: id.to_string(), name: format!("Project {id}"), owner_id: owner_id.to_string() }
    }

    fn message(id: &str, owner_id: &str, project_id: Option<&str>, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            external_message_id: format!("<{id}@mail.example>"),
            subject: format!("Re: {id}"),
            owner_id: owner_id.to_string(),
            project_id: project_id.map(str::to_string),
            created_at: Utc.timestamp_opt(secs, 0).single().expect("timestamp"),
        }
    }

    fn fix() -> ReconcileOptions {
        ReconcileOptions::default()
    }

    #[test]
    fn scenario_a_dangling_project_is_cleared() {
        let mut store =
            MemoryStore::new(vec![owner("U1")], Vec::new(), vec![message("M1", "U1", Some("P-deleted"), 1)]);

        let report = Reconciler::new(&mut store).analyze().expect("analyze");
        assert_eq!(report.invalid_project.len(), 1);
        assert_eq!(report.invalid_owner.len(), 0);
        assert_eq!(report.total_messages, 1);

        let report = Reconciler::new(&mut store).reconcile(&fix()).expect("reconcile");
        assert_eq!(report.fixed_messages, 1);
        assert_eq!(store.message("M1").expect("M1").project_id, None);
        assert_eq!(store.message("M1").expect("M1").owner_id, "U1");

        let second = Reconciler::new(&mut store).reconcile(&fix()).expect("second run");
        assert!(second.is_clean());
        assert!(second.actions.is_empty());
    }

    #[test]
    fn scenario_b_owner_repair_requires_target() {
        let mut store =
            MemoryStore::new(vec![owner("U1")], Vec::new(), vec![message("M2", "U-deleted", None, 1)]);
        let before = store.clone();

        let report = Reconciler::new(&mut store).reconcile(&fix()).expect("reconcile");
        assert_eq!(store, before, "no target user means no write");
        assert_eq!(report.unfixed.len(), 1);
        assert_eq!(report.unfixed[0].record_id, "M2");
        assert_eq!(report.unfixed[0].reason, UnfixableReason::MissingTarget);
        assert_eq!(report.fixed_messages, 0);

        let options = ReconcileOptions { target_owner_id: Some("U1".into()), ..fix() };
        let report = Reconciler::new(&mut store).reconcile(&options).expect("reconcile");
        assert_eq!(report.fixed_messages, 1);
        assert!(report.unfixed.is_empty());
        assert_eq!(store.message("M2").expect("M2").owner_id, "U1");
    }

    #[test]
    fn scenario_c_unknown_target_project_fails_without_writes() {
        let mut store = MemoryStore::new(
            vec![owner("U1")],
            vec![project("P1", "U1")],
            vec![message("M1", "U1", Some("P-gone"), 1), message("M2", "U-gone", None, 2)],
        );
        let before = store.clone();
        let options = ReconcileOptions {
            target_owner_id: Some("U1".into()),
            target_project_id: Some("P-nonexistent".into()),
            ..fix()
        };
        let err = Reconciler::new(&mut store).reconcile(&options).expect_err("invalid target");
        assert!(err.is_invalid_target());
        assert!(err.to_string().contains("valid project ids: P1"));
        assert_eq!(store, before);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn unknown_target_owner_fails_even_in_dry_run() {
        let mut store = MemoryStore::new(vec![owner("U1")], Vec::new(), Vec::new());
        let options = ReconcileOptions {
            dry_run: true,
            target_owner_id: Some("U-typo".into()),
            ..fix()
        };
        let err = Reconciler::new(&mut store).reconcile(&options).expect_err("invalid target");
        match err {
            ReconcileError::InvalidTarget { kind, id, valid } => {
                assert_eq!(kind, TargetKind::Owner);
                assert_eq!(id, "U-typo");
                assert_eq!(valid, vec!["U1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dry_run_annotates_without_writing() {
        let mut store = MemoryStore::new(
            vec![owner("U1")],
            vec![project("P1", "U1")],
            vec![message("M1", "U-gone", Some("P-gone"), 1)],
        );
        let before = store.clone();
        let options = ReconcileOptions {
            dry_run: true,
            target_owner_id: Some("U1".into()),
            target_project_id: Some("P1".into()),
        };
        let report = Reconciler::new(&mut store).reconcile(&options).expect("dry run");
        assert_eq!(report.mode, RunMode::DryRun);
        assert_eq!(report.actions.len(), 2);
        assert!(report.actions.iter().all(|a| !a.applied));
        assert_eq!(report.fixed_messages, 0);
        assert_eq!(store, before);
    }

    #[test]
    fn partial_targets_repair_fields_independently() {
        let mut store = MemoryStore::new(
            vec![owner("U1")],
            Vec::new(),
            vec![message("M1", "U-gone", Some("P-gone"), 1)],
        );
        let options = ReconcileOptions { target_owner_id: Some("U1".into()), ..fix() };
        let report = Reconciler::new(&mut store).reconcile(&options).expect("reconcile");
        let m = store.message("M1").expect("M1");
        assert_eq!(m.owner_id, "U1");
        assert_eq!(m.project_id, None);
        assert_eq!(report.fixed_messages, 1);
        assert_eq!(store.writes(), 2, "each field written once");
    }

    #[test]
    fn reports_follow_creation_order() {
        let mut store = MemoryStore::new(
            vec![owner("U1")],
            Vec::new(),
            vec![
                message("late", "U1", Some("P-x"), 30),
                message("early", "U1", Some("P-x"), 10),
                message("middle-a", "U1", Some("P-x"), 20),
                message("middle-b", "U1", Some("P-x"), 20),
            ],
        );
        let report = Reconciler::new(&mut store).reconcile(&fix()).expect("reconcile");
        let order: Vec<_> = report.actions.iter().map(|a| a.record_id.as_str()).collect();
        assert_eq!(order, vec!["early", "middle-a", "middle-b", "late"]);
        let listed: Vec<_> = report.invalid_project.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(listed, order);
    }

    #[test]
    fn analyze_is_repeatable() {
        let mut store = MemoryStore::new(
            vec![owner("U1"), owner("U2")],
            vec![project("P1", "U1")],
            vec![message("M1", "U3", Some("P2"), 1), message("M2", "U1", Some("P1"), 2)],
        );
        let first = Reconciler::new(&mut store).analyze().expect("first");
        let second = Reconciler::new(&mut store).analyze().expect("second");
        assert_eq!(
            serde_json::to_string(&first).expect("json"),
            serde_json::to_string(&second).expect("json")
        );
        assert_eq!(first.valid_owners.len(), 2);
        assert_eq!(first.mode, RunMode::Analyze);
    }

    struct UnreachableStore;

    impl ReferenceStore for UnreachableStore {
        fn list_owners(&self) -> StoreResult<Vec<Owner>> {
            Err(StoreError::Unavailable {
                path: PathBuf::from("db.sqlite"),
                reason: "connection refused".to_string(),
            })
        }
        fn list_projects(&self) -> StoreResult<Vec<Project>> {
            Ok(Vec::new())
        }
        fn list_messages(&self) -> StoreResult<Vec<Message>> {
            Ok(Vec::new())
        }
        fn update_message_owner(&mut self, _: &str, _: &str) -> StoreResult<()> {
            unreachable!("no writes after a failed snapshot")
        }
        fn update_message_project(&mut self, _: &str, _: Option<&str>) -> StoreResult<()> {
            unreachable!("no writes after a failed snapshot")
        }
        fn update_project_owner(&mut self, _: &str, _: &str) -> StoreResult<()> {
            unreachable!("no writes after a failed snapshot")
        }
    }

    #[test]
    fn unreachable_store_is_surfaced() {
        let mut store = UnreachableStore;
        let err = Reconciler::new(&mut store).reconcile(&fix()).expect_err("unavailable");
        assert!(matches!(err, ReconcileError::StoreUnavailable(StoreError::Unavailable { .. })));
        let err = Reconciler::new(&mut store).analyze().expect_err("unavailable");
        assert!(err.to_string().contains("connection refused"));
    }

    /// Stands in for an ingest that commits a new project and a message
    /// filed under it right after the project list was read.
    struct IngestDuringRead {
        inner: RefCell<MemoryStore>,
    }

    impl ReferenceStore for IngestDuringRead {
        fn list_owners(&self) -> StoreResult<Vec<Owner>> {
            self.inner.borrow().list_owners()
        }
        fn list_projects(&self) -> StoreResult<Vec<Project>> {
            let mut inner = self.inner.borrow_mut();
            let listed = inner.list_projects()?;
            if inner.project("P-new").is_none() {
                inner.projects.push(project("P-new", "U1"));
                inner.messages.push(message("M-new", "U1", Some("P-new"), 5));
            }
            Ok(listed)
        }
        fn list_messages(&self) -> StoreResult<Vec<Message>> {
            self.inner.borrow().list_messages()
        }
        fn update_message_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
            self.inner.get_mut().update_message_owner(id, owner_id)
        }
        fn update_message_project(&mut self, id: &str, project_id: Option<&str>) -> StoreResult<()> {
            self.inner.get_mut().update_message_project(id, project_id)
        }
        fn update_project_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
            self.inner.get_mut().update_project_owner(id, owner_id)
        }
    }

    #[test]
    fn message_ingested_during_snapshot_keeps_its_project() {
        let mut store = IngestDuringRead {
            inner: RefCell::new(MemoryStore::new(
                vec![owner("U1")],
                Vec::new(),
                vec![message("M1", "U1", Some("P-gone"), 1)],
            )),
        };
        let report = Reconciler::new(&mut store).reconcile(&fix()).expect("reconcile");
        let ids: Vec<_> = report.actions.iter().map(|a| a.record_id.as_str()).collect();
        assert_eq!(ids, vec!["M1"]);

        let inner = store.inner.into_inner();
        assert_eq!(inner.message("M-new").expect("M-new").project_id.as_deref(), Some("P-new"));
        assert_eq!(inner.message("M1").expect("M1").project_id, None);
    }

    #[test]
    fn write_failure_returns_what_was_committed() {
        let inner = MemoryStore::new(
            vec![owner("U1")],
            Vec::new(),
            vec![message("M1", "U1", Some("P-gone"), 1), message("M2", "U1", Some("P-gone"), 2)],
        );
        let mut store = FailingStore::new(inner, 2);
        let err = Reconciler::new(&mut store).reconcile(&fix()).expect_err("second write fails");
        assert!(err.to_string().starts_with("Store write failed after 1 committed repair(s)"));

        let Some(PartialReport::Messages(report)) = err.partial_report() else {
            panic!("expected a partial message report, got {err}");
        };
        assert_eq!(report.mode, RunMode::Fix);
        assert!(report.is_interrupted());
        assert_eq!(report.fixed_messages, 1);
        let applied: Vec<_> = report.actions.iter().map(|a| (a.record_id.as_str(), a.applied)).collect();
        assert_eq!(applied, vec![("M1", true), ("M2", false)]);

        assert_eq!(store.inner.message("M1").expect("M1").project_id, None);
        assert_eq!(store.inner.message("M2").expect("M2").project_id.as_deref(), Some("P-gone"));

        let rerun = Reconciler::new(&mut store.inner).reconcile(&fix()).expect("rerun");
        assert_eq!(rerun.fixed_messages, 1);
        assert_eq!(rerun.actions[0].record_id, "M2");
    }

    fn arb_store() -> impl Strategy<Value = MemoryStore> {
        let owners = ["U1", "U2"];
        let projects = ["P1", "P2"];
        let owner_refs = prop::sample::select(vec!["U1", "U2", "U-gone"]);
        let project_refs = prop::option::of(prop::sample::select(vec!["P1", "P2", "P-gone"]));
        prop::collection::vec((owner_refs, project_refs, 0i64..5), 0..12).prop_map(move |rows| {
            let messages = rows
                .into_iter()
                .enumerate()
                .map(|(i, (o, p, t))| message(&format!("M{i}"), o, p, t))
                .collect();
            MemoryStore::new(
                owners.iter().map(|id| owner(id)).collect(),
                projects.iter().map(|id| project(id, "U1")).collect(),
                messages,
            )
        })
    }

    proptest! {
        #[test]
        fn reconcile_is_idempotent(store in arb_store(), target_owner in prop::option::of(Just("U2")), target_project in prop::option::of(Just("P2"))) {
            let options = ReconcileOptions {
                dry_run: false,
                target_owner_id: target_owner.map(str::to_string),
                target_project_id: target_project.map(str::to_string),
            };
            let mut once = store.clone();
            Reconciler::new(&mut once).reconcile(&options).expect("first");
            let mut twice = once.clone();
            let second = Reconciler::new(&mut twice).reconcile(&options).expect("second");
            prop_assert_eq!(&once.messages, &twice.messages);
            prop_assert!(second.actions.is_empty());
            prop_assert!(second.invalid_project.is_empty());
            if target_owner.is_some() {
                prop_assert!(second.is_clean());
            }
        }

        #[test]
        fn dry_run_never_writes(store in arb_store(), target_owner in prop::option::of(Just("U1"))) {
            let options = ReconcileOptions {
                dry_run: true,
                target_owner_id: target_owner.map(str::to_string),
                target_project_id: None,
            };
            let mut after = store.clone();
            Reconciler::new(&mut after).reconcile(&options).expect("dry run");
            prop_assert_eq!(after, store);
        }

        #[test]
        fn default_repair_clears_project_and_keeps_owner(store in arb_store()) {
            let mut after = store.clone();
            Reconciler::new(&mut after).reconcile(&ReconcileOptions::default()).expect("fix");
            for (old, new) in store.messages.iter().zip(after.messages.iter()) {
                prop_assert_eq!(&old.owner_id, &new.owner_id);
                if old.project_id.as_deref() == Some("P-gone") {
                    prop_assert_eq!(new.project_id.as_deref(), None);
                } else {
                    prop_assert_eq!(&old.project_id, &new.project_id);
                }
            }
        }
    }
}
