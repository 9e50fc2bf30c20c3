//! Structured results of a reconciliation run.
//!
//! Reports carry no timestamps and every list is in a fixed order, so two
//! runs over the same store state serialize identically.

use crate::domain::{Message, Owner, Project};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Analyze,
    DryRun,
    Fix,
}

impl RunMode {
    pub fn writes(self) -> bool {
        matches!(self, RunMode::Fix)
    }
}

/// A message as shown in issue listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRef {
    pub id: String,
    pub external_message_id: String,
    pub subject: String,
    pub owner_id: String,
    pub project_id: Option<String>,
}

impl From<&Message> for MessageRef {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.clone(),
            external_message_id: m.external_message_id.clone(),
            subject: m.subject.clone(),
            owner_id: m.owner_id.clone(),
            project_id: m.project_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    ReassignOwner,
    ReassignProject,
    ClearProject,
}

/// One field write on one record. `applied` is false for "would fix" entries
/// produced by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairAction {
    pub record_id: String,
    pub kind: RepairKind,
    pub from: String,
    pub to: Option<String>,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfixableReason {
    /// The owner reference is dangling and no target user was supplied.
    MissingTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnfixedRecord {
    pub record_id: String,
    pub owner_id: String,
    pub reason: UnfixableReason,
}

/// Result of `analyze` or `reconcile` over messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub mode: RunMode,
    pub total_messages: usize,
    pub valid_owners: Vec<Owner>,
    pub valid_projects: Vec<Project>,
    pub invalid_owner: Vec<MessageRef>,
    pub invalid_project: Vec<MessageRef>,
    pub actions: Vec<RepairAction>,
    pub unfixed: Vec<UnfixedRecord>,
    pub fixed_messages: usize,
}

impl Report {
    pub fn issue_count(&self) -> usize {
        self.invalid_owner.len() + self.invalid_project.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    /// True when a fix run stopped before every planned repair was written.
    pub fn is_interrupted(&self) -> bool {
        self.mode.writes() && self.actions.iter().any(|a| !a.applied)
    }
}

/// Result of project ownership reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectReport {
    pub mode: RunMode,
    pub total_projects: usize,
    pub valid_owners: Vec<Owner>,
    pub invalid_owner: Vec<Project>,
    pub actions: Vec<RepairAction>,
    pub unfixed: Vec<UnfixedRecord>,
    pub fixed_projects: usize,
}

impl ProjectReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_owner.is_empty()
    }

    pub fn is_interrupted(&self) -> bool {
        self.mode.writes() && self.actions.iter().any(|a| !a.applied)
    }
}

/// What a fix run had done when a store write failed. Actions written before
/// the failure have `applied` set; the rest were never attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PartialReport {
    Messages(Report),
    Projects(ProjectReport),
}

impl PartialReport {
    pub fn actions(&self) -> &[RepairAction] {
        match self {
            PartialReport::Messages(report) => &report.actions,
            PartialReport::Projects(report) => &report.actions,
        }
    }

    /// Field writes that committed before the failure.
    pub fn committed(&self) -> usize {
        self.actions().iter().filter(|a| a.applied).count()
    }
}

/// Count distinct records touched by applied actions.
pub(crate) fn count_fixed(actions: &[RepairAction]) -> usize {
    count_records(actions.iter().filter(|a| a.applied))
}

/// Count distinct records among `actions`. Actions for one record are
/// adjacent because plans are built record by record.
pub(crate) fn count_records<'a>(actions: impl IntoIterator<Item = &'a RepairAction>) -> usize {
    let mut count = 0;
    let mut last: Option<&str> = None;
    for action in actions {
        if last != Some(action.record_id.as_str()) {
            count += 1;
            last = Some(action.record_id.as_str());
        }
    }
    count
}
