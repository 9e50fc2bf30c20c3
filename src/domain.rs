//! Core records shared by the store, reconciler and renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A human account. Referenced by projects and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub email: String,
}

/// A renovation project owned by exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

/// An ingested communication record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Stable dedup key assigned by the mail provider.
    pub external_message_id: String,
    pub subject: String,
    pub owner_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time membership of every owner and project id.
///
/// Built once at the start of a run and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidEntitySets {
    pub owner_ids: BTreeSet<String>,
    pub project_ids: BTreeSet<String>,
}

impl ValidEntitySets {
    pub fn from_records(owners: &[Owner], projects: &[Project]) -> Self {
        Self {
            owner_ids: owners.iter().map(|o| o.id.clone()).collect(),
            project_ids: projects.iter().map(|p| p.id.clone()).collect(),
        }
    }

    pub fn has_owner(&self, id: &str) -> bool {
        self.owner_ids.contains(id)
    }

    pub fn has_project(&self, id: &str) -> bool {
        self.project_ids.contains(id)
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Settings resolved from config file, environment and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding owners, projects and messages.
    pub database: PathBuf,
    pub format: OutputFormat,
    /// How long a write waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("nailit.sqlite"),
            format: OutputFormat::Text,
            busy_timeout_ms: 5_000,
        }
    }
}
