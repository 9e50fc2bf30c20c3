//! Error taxonomy for the store and the reconciler.
//!
//! Structural failures abort a run and surface to the caller. Records that
//! cannot be repaired safely are not errors; they are collected in the report.

use crate::report::PartialReport;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a [`crate::store::ReferenceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No {table} record with id '{id}'")]
    MissingRecord { table: &'static str, id: String },

    #[error("Store data is corrupt: {0}")]
    Corrupt(String),
}

/// Which reference a caller-supplied target is meant to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Owner,
    Project,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Owner => write!(f, "user"),
            TargetKind::Project => write!(f, "project"),
        }
    }
}

/// Failures that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("Target {kind} '{id}' does not exist; valid {kind} ids: {}", format_valid(.valid))]
    InvalidTarget { kind: TargetKind, id: String, valid: Vec<String> },

    /// A write failed part way through a fix run. Earlier writes stay
    /// committed and are marked applied in `partial`.
    #[error(
        "Store write failed after {} committed repair(s); remaining repairs were not applied: {source}",
        .partial.committed()
    )]
    WriteFailed { partial: Box<PartialReport>, source: StoreError },
}

impl ReconcileError {
    pub fn is_invalid_target(&self) -> bool {
        matches!(self, ReconcileError::InvalidTarget { .. })
    }

    /// The report of an interrupted fix run, if this error carries one.
    pub fn partial_report(&self) -> Option<&PartialReport> {
        match self {
            ReconcileError::WriteFailed { partial, .. } => Some(&**partial),
            _ => None,
        }
    }
}

fn format_valid(valid: &[String]) -> String {
    if valid.is_empty() {
        "(none)".to_string()
    } else {
        valid.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_target_lists_valid_ids() {
        let err = ReconcileError::InvalidTarget {
            kind: TargetKind::Project,
            id: "p-typo".to_string(),
            valid: vec!["p1".to_string(), "p2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Target project 'p-typo' does not exist; valid project ids: p1, p2"
        );
        assert!(err.is_invalid_target());
    }

    #[test]
    fn invalid_target_with_empty_set() {
        let err = ReconcileError::InvalidTarget {
            kind: TargetKind::Owner,
            id: "u9".to_string(),
            valid: Vec::new(),
        };
        assert!(err.to_string().ends_with("valid user ids: (none)"));
    }

    #[test]
    fn store_error_is_transparent() {
        let err: ReconcileError = StoreError::Unavailable {
            path: PathBuf::from("/nope/db.sqlite"),
            reason: "unable to open database file".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Store unavailable at /nope/db.sqlite"));
        assert!(!err.is_invalid_target());
    }

    #[test]
    fn write_failure_reports_committed_count() {
        use crate::report::{ProjectReport, RepairAction, RepairKind, RunMode};

        let action = |id: &str, applied| RepairAction {
            record_id: id.to_string(),
            kind: RepairKind::ReassignOwner,
            from: "u-gone".to_string(),
            to: Some("u1".to_string()),
            applied,
        };
        let partial = PartialReport::Projects(ProjectReport {
            mode: RunMode::Fix,
            total_projects: 2,
            valid_owners: Vec::new(),
            invalid_owner: Vec::new(),
            actions: vec![action("p1", true), action("p2", false)],
            unfixed: Vec::new(),
            fixed_projects: 1,
        });
        let err = ReconcileError::WriteFailed {
            partial: Box::new(partial),
            source: StoreError::MissingRecord { table: "projects", id: "p2".to_string() },
        };
        assert_eq!(
            err.to_string(),
            "Store write failed after 1 committed repair(s); remaining repairs were not applied: \
             No projects record with id 'p2'"
        );
        assert_eq!(err.partial_report().map(PartialReport::committed), Some(1));
    }
}
