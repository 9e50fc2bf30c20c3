//! Reference reconciliation for NailIt.
//!
//! Ingested contractor messages point at an owning user and, optionally, a
//! renovation project. When users or projects are deleted or re-keyed those
//! references dangle. [`reconcile::Reconciler`] finds them against a single
//! snapshot of the store and repairs them under an explicit dry-run/fix
//! switch: dangling projects are reassigned or cleared, dangling owners are
//! only reassigned when an operator names a target.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod reconcile;
pub mod render;
pub mod report;
pub mod store;

pub use error::{ReconcileError, StoreError};
pub use reconcile::{ReconcileOptions, Reconciler};
pub use report::Report;
