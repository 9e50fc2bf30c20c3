//! Seed fixtures for `init --seed`.

use crate::domain::{Message, Owner, Project};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Owners, projects and messages to load into a fresh store. References may
/// dangle; nothing here checks them.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Fixture {
    pub owners: Vec<Owner>,
    pub projects: Vec<Project>,
    pub messages: Vec<Message>,
}

impl Fixture {
    /// Reject duplicate ids so a bad fixture fails before touching the store.
    fn check_unique(&self) -> Result<()> {
        check_ids("owner", self.owners.iter().map(|o| o.id.as_str()))?;
        check_ids("project", self.projects.iter().map(|p| p.id.as_str()))?;
        check_ids("message", self.messages.iter().map(|m| m.id.as_str()))?;
        check_ids(
            "external message",
            self.messages.iter().map(|m| m.external_message_id.as_str()),
        )
    }
}

fn check_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            anyhow::bail!("Duplicate {kind} id '{id}' in fixture");
        }
    }
    Ok(())
}

pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed reading fixture file: {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    let fixture: Fixture = match ext.as_str() {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON fixture: {}", path.display()))?,
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML fixture: {}", path.display()))?,
        other => anyhow::bail!(
            "Unsupported fixture extension '.{}' for file {}",
            other,
            path.display()
        ),
    };
    fixture.check_unique()?;
    Ok(fixture)
}
