//! Audit trail contracts and SQLite history writer.
//!
//! # Responsibility
//! - Describe who changed which record, how, and what the values were.
//! - Persist those entries to the `history` table.
//!
//! # Invariants
//! - Every entry carries a non-empty `sys_user_id` and table name.
//! - Change entries only record fields whose value differs.

pub mod history;

pub use history::{
    AuditEntry, AuditError, AuditEvent, AuditResult, AuditTrail, SqliteAuditTrail,
};
