//! Audit entries and the `history` table writer.
//!
//! # Responsibility
//! - Build creation snapshots and old/new field diffs as JSON.
//! - Write entries through the `AuditTrail` seam; `SqliteAuditTrail` inserts
//!   into `history` on the caller's connection.
//!
//! # Invariants
//! - A blank `sys_user_id` is rejected before any row is written.
//! - `activity` is stored as the single-letter code `I`, `U` or `D`.
//! - The writer joins whatever transaction or savepoint is open on the
//!   connection, so a rolled-back change takes its history row with it.

use crate::db::DbError;
use log::debug;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AuditResult<T> = Result<T, AuditError>;

/// Kind of change being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    Insert,
    Update,
    Delete,
}

impl AuditEvent {
    /// Single-letter code stored in `history.activity`.
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Insert => "I",
            Self::Update => "U",
            Self::Delete => "D",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(Self::Insert),
            "U" => Some(Self::Update),
            "D" => Some(Self::Delete),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum AuditError {
    Db(DbError),
    Snapshot(serde_json::Error),
    MissingSysUserId,
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "audit history write failed: {err}"),
            Self::Snapshot(err) => write!(f, "audit snapshot failed: {err}"),
            Self::MissingSysUserId => write!(f, "audit entry requires sys_user_id"),
        }
    }
}

impl Error for AuditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Snapshot(err) => Some(err),
            Self::MissingSysUserId => None,
        }
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(value: serde_json::Error) -> Self {
        Self::Snapshot(value)
    }
}

/// One audit trail record, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub reference_id: Option<i64>,
    pub table_name: String,
    pub sys_user_id: String,
    pub event: AuditEvent,
    /// For inserts the full new snapshot; for updates/deletes a
    /// `{field: {"old": .., "new": ..}}` object of changed fields.
    pub changes: Value,
}

impl AuditEntry {
    /// Entry for a newly created record.
    pub fn record_creation(
        new_state: &impl serde::Serialize,
        sys_user_id: &str,
        table_name: &str,
    ) -> AuditResult<Self> {
        let snapshot = serde_json::to_value(new_state)?;
        Ok(Self {
            reference_id: snapshot_id(&snapshot),
            table_name: table_name.to_string(),
            sys_user_id: sys_user_id.to_string(),
            event: AuditEvent::Insert,
            changes: snapshot,
        })
    }

    /// Entry comparing `old_state` against `new_state`.
    ///
    /// The reference id is taken from the old snapshot first, since delete
    /// entries compare against an empty record.
    pub fn record_change(
        new_state: &impl serde::Serialize,
        old_state: &impl serde::Serialize,
        sys_user_id: &str,
        event: AuditEvent,
        table_name: &str,
    ) -> AuditResult<Self> {
        let new_snapshot = serde_json::to_value(new_state)?;
        let old_snapshot = serde_json::to_value(old_state)?;
        Ok(Self {
            reference_id: snapshot_id(&old_snapshot).or_else(|| snapshot_id(&new_snapshot)),
            table_name: table_name.to_string(),
            sys_user_id: sys_user_id.to_string(),
            event,
            changes: diff_snapshots(&old_snapshot, &new_snapshot),
        })
    }
}

/// Collaborator receiving audit entries from repositories.
pub trait AuditTrail {
    fn save_history(&self, entry: &AuditEntry) -> AuditResult<()>;
}

/// Audit trail writing to the `history` table on the caller's connection.
///
/// Shares the repository connection, so history rows commit or roll back
/// with the caller's transaction.
pub struct SqliteAuditTrail<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditTrail<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AuditTrail for SqliteAuditTrail<'_> {
    fn save_history(&self, entry: &AuditEntry) -> AuditResult<()> {
        if entry.sys_user_id.trim().is_empty() {
            return Err(AuditError::MissingSysUserId);
        }

        let changes = serde_json::to_string(&entry.changes)?;
        self.conn.execute(
            "INSERT INTO history (
                reference_id,
                reference_table,
                sys_user_id,
                activity,
                changes
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                entry.reference_id,
                entry.table_name.as_str(),
                entry.sys_user_id.as_str(),
                entry.event.as_code(),
                changes,
            ],
        )?;

        debug!(
            "event=audit_write module=audit status=ok table={} activity={} reference_id={}",
            entry.table_name,
            entry.event.as_code(),
            entry
                .reference_id
                .map_or_else(|| "none".to_string(), |id| id.to_string())
        );
        Ok(())
    }
}

fn snapshot_id(snapshot: &Value) -> Option<i64> {
    snapshot.get("id").and_then(Value::as_i64)
}

fn diff_snapshots(old: &Value, new: &Value) -> Value {
    let empty = Map::new();
    let old_fields = old.as_object().unwrap_or(&empty);
    let new_fields = new.as_object().unwrap_or(&empty);

    let mut changes = Map::new();
    for (field, old_value) in old_fields {
        let new_value = new_fields.get(field).unwrap_or(&Value::Null);
        if old_value != new_value {
            changes.insert(field.clone(), change_pair(old_value, new_value));
        }
    }
    for (field, new_value) in new_fields {
        if !old_fields.contains_key(field) && !new_value.is_null() {
            changes.insert(field.clone(), change_pair(&Value::Null, new_value));
        }
    }
    Value::Object(changes)
}

fn change_pair(old: &Value, new: &Value) -> Value {
    let mut pair = Map::new();
    pair.insert("old".to_string(), old.clone());
    pair.insert("new".to_string(), new.clone());
    Value::Object(pair)
}
