//! Pure detection and repair planning over a snapshot.

use crate::domain::{Message, Owner, Project, ValidEntitySets};
use crate::error::{ReconcileError, StoreError, TargetKind};
use crate::report::{MessageRef, RepairAction, RepairKind, UnfixableReason, UnfixedRecord};
use crate::store::{Records, ReferenceStore};

/// Owners, projects and messages read once at the start of a run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub owners: Vec<Owner>,
    pub projects: Vec<Project>,
    /// In creation order.
    pub messages: Vec<Message>,
    pub sets: ValidEntitySets,
}

impl Snapshot {
    pub fn capture<S: ReferenceStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let Records { owners, projects, mut messages } = store.snapshot()?;
        // Stores promise creation order already; a stable sort keeps their
        // insertion tie-break while not trusting default iteration order.
        messages.sort_by_key(|m| m.created_at);
        let sets = ValidEntitySets::from_records(&owners, &projects);
        Ok(Self { owners, projects, messages, sets })
    }
}

/// Messages whose references do not resolve against the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    pub invalid_owner: Vec<MessageRef>,
    pub invalid_project: Vec<MessageRef>,
}

pub fn detect(snapshot: &Snapshot) -> Findings {
    let mut findings = Findings::default();
    for message in &snapshot.messages {
        if !snapshot.sets.has_owner(&message.owner_id) {
            findings.invalid_owner.push(MessageRef::from(message));
        }
        if let Some(project_id) = message.project_id.as_deref() {
            if !snapshot.sets.has_project(project_id) {
                findings.invalid_project.push(MessageRef::from(message));
            }
        }
    }
    findings
}

/// Check caller-supplied targets against the current id sets.
pub fn validate_target(
    sets: &ValidEntitySets,
    kind: TargetKind,
    target: Option<&str>,
) -> Result<(), ReconcileError> {
    let Some(id) = target else {
        return Ok(());
    };
    let valid = match kind {
        TargetKind::Owner => &sets.owner_ids,
        TargetKind::Project => &sets.project_ids,
    };
    if valid.contains(id) {
        return Ok(());
    }
    Err(ReconcileError::InvalidTarget {
        kind,
        id: id.to_string(),
        valid: valid.iter().cloned().collect(),
    })
}

/// Repairs to perform and records left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<RepairAction>,
    pub unfixed: Vec<UnfixedRecord>,
}

/// Plan message repairs in creation order.
///
/// Owner and project repairs on one message are independent: a blocked owner
/// repair does not stop the project reference being reassigned or cleared.
/// Within a message the owner write comes first.
pub fn plan_message_repairs(
    snapshot: &Snapshot,
    target_owner_id: Option<&str>,
    target_project_id: Option<&str>,
) -> Plan {
    let mut plan = Plan::default();
    for message in &snapshot.messages {
        if !snapshot.sets.has_owner(&message.owner_id) {
            match target_owner_id {
                Some(target) => plan.actions.push(RepairAction {
                    record_id: message.id.clone(),
                    kind: RepairKind::ReassignOwner,
                    from: message.owner_id.clone(),
                    to: Some(target.to_string()),
                    applied: false,
                }),
                None => plan.unfixed.push(UnfixedRecord {
                    record_id: message.id.clone(),
                    owner_id: message.owner_id.clone(),
                    reason: UnfixableReason::MissingTarget,
                }),
            }
        }

        let Some(project_id) = message.project_id.as_deref() else {
            continue;
        };
        if snapshot.sets.has_project(project_id) {
            continue;
        }
        let (kind, to) = match target_project_id {
            Some(target) => (RepairKind::ReassignProject, Some(target.to_string())),
            None => (RepairKind::ClearProject, None),
        };
        plan.actions.push(RepairAction {
            record_id: message.id.clone(),
            kind,
            from: project_id.to_string(),
            to,
            applied: false,
        });
    }
    plan
}

/// Plan project ownership repairs, ordered by project id.
pub fn plan_project_repairs(snapshot: &Snapshot, target_owner_id: Option<&str>) -> Plan {
    let mut plan = Plan::default();
    for project in snapshot.projects.iter().filter(|p| !snapshot.sets.has_owner(&p.owner_id)) {
        match target_owner_id {
            Some(target) => plan.actions.push(RepairAction {
                record_id: project.id.clone(),
                kind: RepairKind::ReassignOwner,
                from: project.owner_id.clone(),
                to: Some(target.to_string()),
                applied: false,
            }),
            None => plan.unfixed.push(UnfixedRecord {
                record_id: project.id.clone(),
                owner_id: project.owner_id.clone(),
                reason: UnfixableReason::MissingTarget,
            }),
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(owner_ids: &[&str], project_ids: &[&str], messages: Vec<Message>) -> Snapshot {
        let owners: Vec<Owner> = owner_ids
            .iter()
            .map(|id| Owner { id: id.to_string(), email: format!("{id}@example.com") })
            .collect();
        let projects: Vec<Project> = project_ids
            .iter()
            .map(|id| Project { id: id.to_string(), name: id.to_uppercase(), owner_id: "u1".into() })
            .collect();
        let sets = ValidEntitySets::from_records(&owners, &projects);
        Snapshot { owners, projects, messages, sets }
    }

    fn message(id: &str, owner: &str, project: Option<&str>) -> Message {
        Message {
            id: id.to_string(),
            external_message_id: format!("<{id}@mail>"),
            subject: "Estimate".to_string(),
            owner_id: owner.to_string(),
            project_id: project.map(str::to_string),
            created_at: Utc.timestamp_opt(0, 0).single().expect("timestamp"),
        }
    }

    #[test]
    fn detect_separates_owner_and_project_issues() {
        let snap = snapshot(
            &["u1"],
            &["p1"],
            vec![
                message("ok", "u1", Some("p1")),
                message("no-project", "u1", None),
                message("bad-owner", "u-gone", None),
                message("bad-project", "u1", Some("p-gone")),
                message("both", "u-gone", Some("p-gone")),
            ],
        );
        let findings = detect(&snap);
        let owners: Vec<_> = findings.invalid_owner.iter().map(|m| m.id.as_str()).collect();
        let projects: Vec<_> = findings.invalid_project.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(owners, vec!["bad-owner", "both"]);
        assert_eq!(projects, vec!["bad-project", "both"]);
    }

    #[test]
    fn missing_owner_target_blocks_owner_but_not_project() {
        let snap = snapshot(&["u1"], &[], vec![message("both", "u-gone", Some("p-gone"))]);
        let plan = plan_message_repairs(&snap, None, None);
        assert_eq!(plan.unfixed.len(), 1);
        assert_eq!(plan.unfixed[0].owner_id, "u-gone");
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].kind, RepairKind::ClearProject);
        assert_eq!(plan.actions[0].to, None);
    }

    #[test]
    fn targets_produce_reassignments_owner_first() {
        let snap = snapshot(&["u1"], &["p1"], vec![message("both", "u-gone", Some("p-gone"))]);
        let plan = plan_message_repairs(&snap, Some("u1"), Some("p1"));
        assert!(plan.unfixed.is_empty());
        let kinds: Vec<_> = plan.actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![RepairKind::ReassignOwner, RepairKind::ReassignProject]);
        assert_eq!(plan.actions[1].from, "p-gone");
        assert_eq!(plan.actions[1].to.as_deref(), Some("p1"));
    }

    #[test]
    fn validate_target_accepts_none_and_known_ids() {
        let snap = snapshot(&["u1"], &["p1"], Vec::new());
        assert!(validate_target(&snap.sets, TargetKind::Owner, None).is_ok());
        assert!(validate_target(&snap.sets, TargetKind::Owner, Some("u1")).is_ok());
        assert!(validate_target(&snap.sets, TargetKind::Project, Some("p1")).is_ok());
    }

    #[test]
    fn validate_target_rejects_cross_kind_ids() {
        let snap = snapshot(&["u1"], &["p1"], Vec::new());
        let err = validate_target(&snap.sets, TargetKind::Project, Some("u1")).expect_err("kind");
        match err {
            ReconcileError::InvalidTarget { kind, id, valid } => {
                assert_eq!(kind, TargetKind::Project);
                assert_eq!(id, "u1");
                assert_eq!(valid, vec!["p1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn project_plan_covers_only_dangling_owners() {
        let mut snap = snapshot(&["u1"], &["p1", "p2"], Vec::new());
        snap.projects[1].owner_id = "u-gone".to_string();
        let plan = plan_project_repairs(&snap, None);
        assert!(plan.actions.is_empty());
        assert_eq!(plan.unfixed[0].record_id, "p2");

        let plan = plan_project_repairs(&snap, Some("u1"));
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].record_id, "p2");
    }
}
