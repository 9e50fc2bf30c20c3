//! SQLite-backed store.
//!
//! The schema deliberately carries no foreign-key constraints between
//! messages, projects and owners: dangling references must be representable
//! so they can be found and repaired.

use super::{Records, ReferenceStore, StoreResult};
use crate::domain::{Message, Owner, Project};
use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SCHEMA_VERSION: i64 = 1;

/// Store over a single SQLite connection. The connection is closed when the
/// store is dropped.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Open an existing, initialised database. A missing file is reported as
    /// unavailable rather than silently created.
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::Unavailable {
                path: path.to_path_buf(),
                reason: "database file does not exist (run `init` first)".to_string(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Unavailable { path: path.to_path_buf(), reason: e.to_string() })?;
        configure_connection(&conn, busy_timeout)?;

        let current: Option<i64> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .optional()
            .map_err(|e| StoreError::Unavailable {
                path: path.to_path_buf(),
                reason: format!("not a NailIt database ({e})"),
            })?;
        match current {
            Some(version) if version == SCHEMA_VERSION => {}
            Some(version) => {
                return Err(StoreError::Corrupt(format!(
                    "Unsupported schema version {version}; expected {SCHEMA_VERSION}"
                )));
            }
            None => return Err(StoreError::Corrupt("schema_version table is empty".to_string())),
        }

        tracing::debug!("opened store at {}", path.display());
        Ok(Self { conn, path: path.to_path_buf() })
    }

    /// Open the database at `path`, creating the file and schema if needed.
    pub fn create(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable { path: path.to_path_buf(), reason: e.to_string() })?;
        configure_connection(&conn, busy_timeout)?;
        create_schema(&conn)?;
        Ok(Self { conn, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert every record in one transaction.
    pub fn insert_all(
        &mut self,
        owners: &[Owner],
        projects: &[Project],
        messages: &[Message],
    ) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        for owner in owners {
            tx.execute("INSERT INTO owners(id, email) VALUES(?1, ?2)", params![owner.id, owner.email])?;
        }
        for project in projects {
            tx.execute(
                "INSERT INTO projects(id, name, owner_id) VALUES(?1, ?2, ?3)",
                params![project.id, project.name, project.owner_id],
            )?;
        }
        for message in messages {
            tx.execute(
                "INSERT INTO messages(id, external_message_id, subject, owner_id, project_id, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id,
                    message.external_message_id,
                    message.subject,
                    message.owner_id,
                    message.project_id,
                    format_timestamp(&message.created_at),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl ReferenceStore for SqliteStore {
    fn list_owners(&self) -> StoreResult<Vec<Owner>> {
        query_owners(&self.conn)
    }

    fn list_projects(&self) -> StoreResult<Vec<Project>> {
        query_projects(&self.conn)
    }

    fn list_messages(&self) -> StoreResult<Vec<Message>> {
        query_messages(&self.conn)
    }

    /// All three reads share one deferred transaction, so writers that
    /// commit between them are not observed.
    fn snapshot(&self) -> StoreResult<Records> {
        let tx = self.conn.unchecked_transaction()?;
        let records = Records {
            owners: query_owners(&tx)?,
            projects: query_projects(&tx)?,
            messages: query_messages(&tx)?,
        };
        tx.commit()?;
        Ok(records)
    }

    fn update_message_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("UPDATE messages SET owner_id = ?1 WHERE id = ?2", params![owner_id, id])?;
        require_changed(changed, "messages", id)
    }

    fn update_message_project(&mut self, id: &str, project_id: Option<&str>) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("UPDATE messages SET project_id = ?1 WHERE id = ?2", params![project_id, id])?;
        require_changed(changed, "messages", id)
    }

    fn update_project_owner(&mut self, id: &str, owner_id: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("UPDATE projects SET owner_id = ?1 WHERE id = ?2", params![owner_id, id])?;
        require_changed(changed, "projects", id)
    }
}

fn query_owners(conn: &Connection) -> StoreResult<Vec<Owner>> {
    let mut stmt = conn.prepare("SELECT id, email FROM owners ORDER BY id")?;
    let owners = stmt
        .query_map([], |row| Ok(Owner { id: row.get(0)?, email: row.get(1)? }))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(owners)
}

fn query_projects(conn: &Connection) -> StoreResult<Vec<Project>> {
    let mut stmt = conn.prepare("SELECT id, name, owner_id FROM projects ORDER BY id")?;
    let projects = stmt
        .query_map([], |row| {
            Ok(Project { id: row.get(0)?, name: row.get(1)?, owner_id: row.get(2)? })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

fn query_messages(conn: &Connection) -> StoreResult<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_message_id, subject, owner_id, project_id, created_at
         FROM messages ORDER BY created_at, seq",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, external_message_id, subject, owner_id, project_id, created_at)| {
            let created_at = parse_timestamp(&created_at).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "message '{id}' has unparsable created_at '{created_at}'"
                ))
            })?;
            Ok(Message { id, external_message_id, subject, owner_id, project_id, created_at })
        })
        .collect()
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

fn create_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS owners (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            external_message_id TEXT NOT NULL UNIQUE,
            subject TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            project_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS messages_created_at ON messages(created_at, seq);
        ",
    )?;

    let current: Option<i64> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match current {
        None => {
            conn.execute("INSERT INTO schema_version(version) VALUES(?1)", [SCHEMA_VERSION])?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            return Err(StoreError::Corrupt(format!(
                "Unsupported schema version {version}; expected {SCHEMA_VERSION}"
            )));
        }
    }
    Ok(())
}

fn require_changed(changed: usize, table: &'static str, id: &str) -> StoreResult<()> {
    if changed == 0 {
        return Err(StoreError::MissingRecord { table, id: id.to_string() });
    }
    Ok(())
}

/// Fixed-width UTC form so lexical order in SQL matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
}
