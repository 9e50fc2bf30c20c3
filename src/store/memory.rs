//! In-memory store backed by plain vectors.

use super::{ReferenceStore, StoreResult};
use crate::domain::{Message, Owner, Project};
use crate::error::StoreError;

/// Vector-backed store. Messages keep their insertion order as the
/// tie-breaker for equal `created_at` values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    pub owners: Vec<Owner>,
    pub projects: Vec<Project>,
    pub messages: Vec<Message>,
    writes: usize,
}

impl MemoryStore {
    pub fn new(owners: Vec<Owner>, projects: Vec<Project>, messages: Vec<Message>) -> Self {
        Self { owners, projects, messages, writes: 0 }
    }

    /// Number of update calls that reached this store.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    fn message_mut(&mut self, id: &str) -> StoreResult<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::MissingRecord { table: "messages", id: id.to_string() })
    }
}

impl ReferenceStore for MemoryStore {
    fn list_owners(&self) -> StoreResult<Vec<Owner>> {
        let mut owners = self.owners.clone();
        owners.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owners)
    }

    fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut projects = self.projects.clone();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(projects)
    }

    fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let mut messages = self.messages.clone();
        // Stable: equal timestamps keep insertion order.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    fn update_message_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
        self.message_mut(id)?.owner_id = owner_id.to_string();
        self.writes += 1;
        Ok(())
    }

    fn update_message_project(&mut self, id: &str, project_id: Option<&str>) -> StoreResult<()> {
        self.message_mut(id)?.project_id = project_id.map(str::to_string);
        self.writes += 1;
        Ok(())
    }

    fn update_project_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::MissingRecord { table: "projects", id: id.to_string() })?;
        project.owner_id = owner_id.to_string();
        self.writes += 1;
        Ok(())
    }
}

/// A [`MemoryStore`] whose `n`th update (1-based) fails as if the
/// connection dropped. Earlier updates go through.
#[cfg(test)]
pub(crate) struct FailingStore {
    pub inner: MemoryStore,
    pub fail_on_write: usize,
    attempts: usize,
}

#[cfg(test)]
impl FailingStore {
    pub fn new(inner: MemoryStore, fail_on_write: usize) -> Self {
        Self { inner, fail_on_write, attempts: 0 }
    }

    fn attempt(&mut self) -> StoreResult<()> {
        self.attempts += 1;
        if self.attempts == self.fail_on_write {
            return Err(StoreError::Unavailable {
                path: std::path::PathBuf::from("memory"),
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
impl ReferenceStore for FailingStore {
    fn list_owners(&self) -> StoreResult<Vec<Owner>> {
        self.inner.list_owners()
    }

    fn list_projects(&self) -> StoreResult<Vec<Project>> {
        self.inner.list_projects()
    }

    fn list_messages(&self) -> StoreResult<Vec<Message>> {
        self.inner.list_messages()
    }

    fn update_message_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
        self.attempt()?;
        self.inner.update_message_owner(id, owner_id)
    }

    fn update_message_project(&mut self, id: &str, project_id: Option<&str>) -> StoreResult<()> {
        self.attempt()?;
        self.inner.update_message_project(id, project_id)
    }

    fn update_project_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
        self.attempt()?;
        self.inner.update_project_owner(id, owner_id)
    }
}
