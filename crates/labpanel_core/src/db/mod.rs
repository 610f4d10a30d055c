//! Panel database bootstrap: connections, migrations and SQL functions.
//!
//! # Responsibility
//! - Open SQLite connections holding the `panels` and `history` tables.
//! - Register the panel SQL functions every repository query relies on.
//! - Bring the schema up to the version this build understands.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`; a database written by a
//!   newer build is refused, never downgraded.
//! - `panel_key`/`panel_fold` are registered before any panel query runs.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod functions;
pub mod migrations;
mod open;

pub use functions::{register_panel_functions, PANEL_FOLD_FN, PANEL_KEY_FN};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures opening, migrating or querying the panel database.
#[derive(Debug)]
pub enum DbError {
    /// SQLite rejected a statement or connection setting.
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer build than this one.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// True when SQLite gave up waiting on another writer's lock.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::DatabaseBusy
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "panel database error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "panel database is at schema version {db_version}, but this build only understands up to {latest_supported}; upgrade labpanel before opening it"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
