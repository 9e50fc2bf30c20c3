//! Persistence contract consumed by the reconciler.

pub mod fixture;
pub mod memory;
pub mod sqlite;

use crate::domain::{Message, Owner, Project};
use crate::error::StoreError;
use std::collections::BTreeSet;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Every owner, project and message as of one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Records {
    pub owners: Vec<Owner>,
    pub projects: Vec<Project>,
    /// In creation order.
    pub messages: Vec<Message>,
}

/// Minimal read/write surface over owners, projects and messages.
///
/// `list_messages` must return messages in creation order: ascending
/// `created_at`, ties broken by insertion sequence.
pub trait ReferenceStore {
    fn list_owners(&self) -> StoreResult<Vec<Owner>>;

    fn list_projects(&self) -> StoreResult<Vec<Project>>;

    fn list_messages(&self) -> StoreResult<Vec<Message>>;

    fn update_message_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()>;

    fn update_message_project(&mut self, id: &str, project_id: Option<&str>) -> StoreResult<()>;

    fn update_project_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()>;

    /// Read owners, projects and messages together.
    ///
    /// The default reads messages first, so a message ingested during the
    /// read together with its project is never seen without that project.
    /// Stores with transactions should override this with a single read
    /// transaction.
    fn snapshot(&self) -> StoreResult<Records> {
        let messages = self.list_messages()?;
        let owners = self.list_owners()?;
        let projects = self.list_projects()?;
        Ok(Records { owners, projects, messages })
    }

    fn list_owner_ids(&self) -> StoreResult<BTreeSet<String>> {
        Ok(self.list_owners()?.into_iter().map(|o| o.id).collect())
    }

    fn list_project_ids(&self) -> StoreResult<BTreeSet<String>> {
        Ok(self.list_projects()?.into_iter().map(|p| p.id).collect())
    }
}
