//! Panel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, listing, search and navigation over the `panels` table.
//! - Record audit history for inserts and deletes.
//! - Serve id/name/description lookups from the shared `PanelLookupCache`.
//!
//! # Invariants
//! - No two panels share a `panel_name` key, and the same holds for
//!   `description`. The key is the full Unicode lower-case with leading and
//!   trailing chars up to U+0020 stripped (`normalize_key`), compared through
//!   the `panel_key` SQL function. Checked here, not by the schema.
//! - Prefix search folds both sides with `panel_fold`, so it ignores case
//!   for non-ASCII letters too.
//! - Lookup maps are rebuilt from active panels only, lazily on first read.
//! - An insert and its audit row, and each single delete and its audit row,
//!   commit or roll back together (one SAVEPOINT each, nested inside the
//!   caller's transaction when there is one).
//! - A whole batch is only atomic when the caller passes a `Transaction`
//!   (it derefs to `Connection`).

use crate::audit::{AuditEntry, AuditError, AuditEvent, AuditTrail, SqliteAuditTrail};
use crate::cache::{PanelLookupCache, PanelLookupSnapshot};
use crate::config::PageSizeProvider;
use crate::db::migrations::latest_version;
use crate::db::{register_panel_functions, DbError};
use crate::model::panel::{fold_case, Panel, PanelId, PanelValidationError};
use log::{error, info, warn};
use rusqlite::{params, Connection, Params, Row};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Table name recorded in audit history.
pub const PANEL_TABLE_NAME: &str = "PANEL";

const PANEL_SELECT_SQL: &str = "SELECT
    id,
    panel_name,
    description,
    is_active,
    sort_order
FROM panels";

const ACTIVE_FLAG: &str = "Y";
const INACTIVE_FLAG: &str = "N";
const NEIGHBOR_LIMIT: i64 = 2;

pub type RepoResult<T> = Result<T, RepoError>;

/// Panel field whose uniqueness was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Name,
    Description,
}

impl Display for DuplicateField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "panel name"),
            Self::Description => write!(f, "panel description"),
        }
    }
}

/// Repository error for panel persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(PanelValidationError),
    /// Another panel already uses this name/description (case and
    /// surrounding whitespace ignored).
    DuplicateConflict {
        field: DuplicateField,
        value: String,
    },
    NotFound(PanelId),
    Persistence(DbError),
    Audit(AuditError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateConflict { field, value } => {
                write!(f, "duplicate record exists for {field} `{value}`")
            }
            Self::NotFound(id) => write!(f, "panel not found: {id}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::Audit(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "panel repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid panel data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::Audit(err) => Some(err),
            Self::DuplicateConflict { .. } => None,
            Self::NotFound(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<PanelValidationError> for RepoError {
    fn from(value: PanelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Persistence(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(DbError::Sqlite(value))
    }
}

impl From<AuditError> for RepoError {
    fn from(value: AuditError) -> Self {
        Self::Audit(value)
    }
}

/// Repository interface for panel operations.
pub trait PanelRepository {
    /// Inserts a new panel and writes the generated id back onto `panel`.
    fn insert_panel(&self, panel: &mut Panel) -> RepoResult<PanelId>;
    /// Replaces the stored fields of an existing panel.
    fn update_panel(&self, panel: &Panel) -> RepoResult<()>;
    /// Deletes each panel after auditing its stored state.
    fn delete_panels(&self, panels: &[Panel]) -> RepoResult<()>;
    fn get_panel_by_id(&self, id: PanelId) -> RepoResult<Option<Panel>>;
    /// Exact name match. Returns the lowest id when several rows match.
    fn get_panel_by_name(&self, name: &str) -> RepoResult<Option<Panel>>;
    /// Active panels ordered by name.
    fn list_active_panels(&self) -> RepoResult<Vec<Panel>>;
    /// All panels ordered by `sort_order`.
    fn list_all_panels(&self) -> RepoResult<Vec<Panel>>;
    /// Up to `page_size + 1` panels in name order from a 1-based record number.
    fn list_page(&self, starting_record_number: u32) -> RepoResult<Vec<Panel>>;
    /// Case-insensitive name prefix search over active panels.
    fn search_active_panels(&self, prefix: &str) -> RepoResult<Vec<Panel>>;
    /// Up to two panels following `id` in name order.
    fn next_panels(&self, id: PanelId) -> RepoResult<Vec<Panel>>;
    /// Up to two panels preceding `id` in name order, nearest first.
    fn previous_panels(&self, id: PanelId) -> RepoResult<Vec<Panel>>;
    fn total_panel_count(&self) -> RepoResult<u64>;
    fn duplicate_name_exists(&self, panel: &Panel) -> RepoResult<bool>;
    fn duplicate_description_exists(&self, panel: &Panel) -> RepoResult<bool>;
    fn id_for_name(&self, name: &str) -> RepoResult<Option<PanelId>>;
    fn name_for_id(&self, id: PanelId) -> RepoResult<Option<String>>;
    fn description_for_id(&self, id: PanelId) -> RepoResult<Option<String>>;
    fn invalidate_caches(&self);
    fn page_size(&self) -> u32;
}

/// SQLite-backed panel repository.
pub struct SqlitePanelRepository<'conn, A: AuditTrail = SqliteAuditTrail<'conn>> {
    conn: &'conn Connection,
    cache: Arc<PanelLookupCache>,
    audit: A,
    page_size: u32,
}

impl<'conn> SqlitePanelRepository<'conn> {
    /// Constructs a repository writing audit history to the same connection.
    pub fn try_new(
        conn: &'conn Connection,
        cache: Arc<PanelLookupCache>,
        config: &impl PageSizeProvider,
    ) -> RepoResult<Self> {
        Self::try_with_audit(conn, cache, config, SqliteAuditTrail::new(conn))
    }
}

impl<'conn, A: AuditTrail> SqlitePanelRepository<'conn, A> {
    /// Constructs a repository with a caller-supplied audit trail.
    pub fn try_with_audit(
        conn: &'conn Connection,
        cache: Arc<PanelLookupCache>,
        config: &impl PageSizeProvider,
        audit: A,
    ) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            cache,
            audit,
            page_size: config.default_page_size().max(1),
        })
    }

    fn insert_inner(&self, panel: &mut Panel) -> RepoResult<PanelId> {
        panel.validate()?;
        let id = self.with_savepoint("panel_insert", || self.insert_audited(panel))?;
        panel.id = Some(id);

        self.cache.invalidate();
        info!("event=panel_insert module=panel_repo status=ok panel_id={id}");
        Ok(id)
    }

    fn insert_audited(&self, panel: &Panel) -> RepoResult<PanelId> {
        self.ensure_unique(panel)?;

        self.conn.execute(
            "INSERT INTO panels (
                panel_name,
                description,
                is_active,
                sort_order
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                panel.panel_name.as_str(),
                panel.description.as_str(),
                active_flag(panel.is_active),
                panel.sort_order,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        let stored = Panel {
            id: Some(id),
            ..panel.clone()
        };
        let entry = AuditEntry::record_creation(&stored, &panel.sys_user_id, PANEL_TABLE_NAME)?;
        self.audit.save_history(&entry)?;
        Ok(id)
    }

    fn update_inner(&self, panel: &Panel) -> RepoResult<()> {
        panel.validate()?;
        let id = panel.id.ok_or_else(|| {
            RepoError::InvalidData("update requires a persisted panel id".to_string())
        })?;
        self.ensure_unique(panel)?;

        // Update history is not recorded; only inserts and deletes are audited.
        let changed = self.conn.execute(
            "UPDATE panels
             SET
                panel_name = ?1,
                description = ?2,
                is_active = ?3,
                sort_order = ?4,
                last_updated = (strftime('%s', 'now') * 1000)
             WHERE id = ?5;",
            params![
                panel.panel_name.as_str(),
                panel.description.as_str(),
                active_flag(panel.is_active),
                panel.sort_order,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        self.cache.invalidate();
        info!("event=panel_update module=panel_repo status=ok panel_id={id}");
        Ok(())
    }

    fn delete_inner(&self, panels: &[Panel]) -> RepoResult<()> {
        let mut deleted = 0usize;
        let result = panels
            .iter()
            .try_for_each(|panel| {
                self.with_savepoint("panel_delete", || self.delete_one(panel))
                    .map(|()| deleted += 1)
            });

        // Rows deleted before a failure stay deleted, so the cache must not
        // keep serving them.
        if deleted > 0 {
            self.cache.invalidate();
        }
        result?;

        info!("event=panel_delete module=panel_repo status=ok count={deleted}");
        Ok(())
    }

    fn delete_one(&self, panel: &Panel) -> RepoResult<()> {
        let id = panel.id.ok_or_else(|| {
            RepoError::InvalidData("delete requires a persisted panel id".to_string())
        })?;
        let stored = self.find_by_id(id)?.ok_or(RepoError::NotFound(id))?;

        let entry = AuditEntry::record_change(
            &Value::Null,
            &stored,
            &panel.sys_user_id,
            AuditEvent::Delete,
            PANEL_TABLE_NAME,
        )?;
        self.audit.save_history(&entry)?;

        let changed = self
            .conn
            .execute("DELETE FROM panels WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    /// Runs `work` inside a named SAVEPOINT: released on success, rolled
    /// back on any error. Outside a transaction the savepoint is its own
    /// transaction; inside one it nests.
    fn with_savepoint<T>(
        &self,
        name: &'static str,
        work: impl FnOnce() -> RepoResult<T>,
    ) -> RepoResult<T> {
        self.conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        let result = work().and_then(|value| {
            self.conn.execute_batch(&format!("RELEASE {name};"))?;
            Ok(value)
        });
        if result.is_err() {
            if let Err(rollback_err) = self
                .conn
                .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};"))
            {
                error!(
                    "event=panel_savepoint module=panel_repo status=error savepoint={name} error={rollback_err}"
                );
            }
        }
        result
    }

    fn ensure_unique(&self, panel: &Panel) -> RepoResult<()> {
        if self.name_taken(panel)? {
            return Err(RepoError::DuplicateConflict {
                field: DuplicateField::Name,
                value: panel.panel_name.clone(),
            });
        }
        if self.description_taken(panel)? {
            return Err(RepoError::DuplicateConflict {
                field: DuplicateField::Description,
                value: panel.description.clone(),
            });
        }
        Ok(())
    }

    fn name_taken(&self, panel: &Panel) -> RepoResult<bool> {
        self.exists(
            "SELECT EXISTS(
                SELECT 1
                FROM panels
                WHERE panel_key(panel_name) = ?1
                  AND id != ?2
            );",
            params![panel.normalized_name(), panel.duplicate_check_id()],
        )
    }

    fn description_taken(&self, panel: &Panel) -> RepoResult<bool> {
        self.exists(
            "SELECT EXISTS(
                SELECT 1
                FROM panels
                WHERE panel_key(description) = ?1
                  AND id != ?2
            );",
            params![panel.normalized_description(), panel.duplicate_check_id()],
        )
    }

    fn exists(&self, sql: &str, params: impl Params) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(exists == 1)
    }

    fn find_by_id(&self, id: PanelId) -> RepoResult<Option<Panel>> {
        let mut panels = self.query_panels(&format!("{PANEL_SELECT_SQL} WHERE id = ?1;"), [id])?;
        Ok(panels.pop())
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Option<Panel>> {
        let mut panels = self.query_panels(
            &format!("{PANEL_SELECT_SQL} WHERE panel_name = ?1 ORDER BY id ASC LIMIT 1;"),
            [name],
        )?;
        Ok(panels.pop())
    }

    fn load_active_panels(&self) -> RepoResult<Vec<Panel>> {
        self.query_panels(
            &format!("{PANEL_SELECT_SQL} WHERE is_active = ?1 ORDER BY panel_name ASC, id ASC;"),
            [ACTIVE_FLAG],
        )
    }

    fn load_page(&self, starting_record_number: u32) -> RepoResult<Vec<Panel>> {
        let offset = i64::from(starting_record_number.saturating_sub(1));
        let limit = i64::from(self.page_size) + 1;
        self.query_panels(
            &format!("{PANEL_SELECT_SQL} ORDER BY panel_name ASC, id ASC LIMIT ?1 OFFSET ?2;"),
            params![limit, offset],
        )
    }

    fn load_search(&self, prefix: &str) -> RepoResult<Vec<Panel>> {
        let pattern = format!("{}%", escape_like(&fold_case(prefix)));
        self.query_panels(
            &format!(
                "{PANEL_SELECT_SQL}
                 WHERE is_active = ?1
                   AND panel_fold(panel_name) LIKE ?2 ESCAPE '\\'
                 ORDER BY panel_fold(panel_name) ASC, id ASC;"
            ),
            params![ACTIVE_FLAG, pattern],
        )
    }

    fn load_neighbors(&self, id: PanelId, direction: Direction) -> RepoResult<Vec<Panel>> {
        let anchor = self.find_by_id(id)?.ok_or(RepoError::NotFound(id))?;
        let sql = match direction {
            Direction::Next => format!(
                "{PANEL_SELECT_SQL}
                 WHERE panel_name > ?1 OR (panel_name = ?1 AND id > ?2)
                 ORDER BY panel_name ASC, id ASC
                 LIMIT ?3;"
            ),
            Direction::Previous => format!(
                "{PANEL_SELECT_SQL}
                 WHERE panel_name < ?1 OR (panel_name = ?1 AND id < ?2)
                 ORDER BY panel_name DESC, id DESC
                 LIMIT ?3;"
            ),
        };
        self.query_panels(&sql, params![anchor.panel_name, id, NEIGHBOR_LIMIT])
    }

    fn query_panels(&self, sql: &str, params: impl Params) -> RepoResult<Vec<Panel>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut panels = Vec::new();
        while let Some(row) = rows.next()? {
            panels.push(parse_panel_row(row)?);
        }
        Ok(panels)
    }

    fn lookup_snapshot(&self) -> RepoResult<Arc<PanelLookupSnapshot>> {
        self.cache
            .snapshot_or_load(|| logged("load_lookup_maps", self.load_active_panels()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Next,
    Previous,
}

impl<A: AuditTrail> PanelRepository for SqlitePanelRepository<'_, A> {
    fn insert_panel(&self, panel: &mut Panel) -> RepoResult<PanelId> {
        logged("insert_panel", self.insert_inner(panel))
    }

    fn update_panel(&self, panel: &Panel) -> RepoResult<()> {
        logged("update_panel", self.update_inner(panel))
    }

    fn delete_panels(&self, panels: &[Panel]) -> RepoResult<()> {
        logged("delete_panels", self.delete_inner(panels))
    }

    fn get_panel_by_id(&self, id: PanelId) -> RepoResult<Option<Panel>> {
        logged("get_panel_by_id", self.find_by_id(id))
    }

    fn get_panel_by_name(&self, name: &str) -> RepoResult<Option<Panel>> {
        logged("get_panel_by_name", self.find_by_name(name))
    }

    fn list_active_panels(&self) -> RepoResult<Vec<Panel>> {
        logged("list_active_panels", self.load_active_panels())
    }

    fn list_all_panels(&self) -> RepoResult<Vec<Panel>> {
        logged(
            "list_all_panels",
            self.query_panels(
                &format!("{PANEL_SELECT_SQL} ORDER BY sort_order ASC, id ASC;"),
                [],
            ),
        )
    }

    fn list_page(&self, starting_record_number: u32) -> RepoResult<Vec<Panel>> {
        logged("list_page", self.load_page(starting_record_number))
    }

    fn search_active_panels(&self, prefix: &str) -> RepoResult<Vec<Panel>> {
        logged("search_active_panels", self.load_search(prefix))
    }

    fn next_panels(&self, id: PanelId) -> RepoResult<Vec<Panel>> {
        logged("next_panels", self.load_neighbors(id, Direction::Next))
    }

    fn previous_panels(&self, id: PanelId) -> RepoResult<Vec<Panel>> {
        logged("previous_panels", self.load_neighbors(id, Direction::Previous))
    }

    fn total_panel_count(&self) -> RepoResult<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM panels;", [], |row| row.get::<_, i64>(0))
            .map_err(RepoError::from)
            .and_then(|count| {
                u64::try_from(count)
                    .map_err(|_| RepoError::InvalidData(format!("negative panel count {count}")))
            });
        logged("total_panel_count", count)
    }

    fn duplicate_name_exists(&self, panel: &Panel) -> RepoResult<bool> {
        logged("duplicate_name_exists", self.name_taken(panel))
    }

    fn duplicate_description_exists(&self, panel: &Panel) -> RepoResult<bool> {
        logged("duplicate_description_exists", self.description_taken(panel))
    }

    fn id_for_name(&self, name: &str) -> RepoResult<Option<PanelId>> {
        Ok(self.lookup_snapshot()?.id_for_name(name))
    }

    fn name_for_id(&self, id: PanelId) -> RepoResult<Option<String>> {
        Ok(self.lookup_snapshot()?.name_for_id(id).map(str::to_string))
    }

    fn description_for_id(&self, id: PanelId) -> RepoResult<Option<String>> {
        Ok(self
            .lookup_snapshot()?
            .description_for_id(id)
            .map(str::to_string))
    }

    fn invalidate_caches(&self) {
        self.cache.invalidate();
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}

fn logged<T>(operation: &'static str, result: RepoResult<T>) -> RepoResult<T> {
    if let Err(err) = &result {
        match err {
            RepoError::DuplicateConflict { .. }
            | RepoError::NotFound(_)
            | RepoError::Validation(_) => warn!(
                "event=panel_repo module=panel_repo op={operation} status=rejected error={err}"
            ),
            _ => error!(
                "event=panel_repo module=panel_repo op={operation} status=error error={err}"
            ),
        }
    }
    result
}

fn parse_panel_row(row: &Row<'_>) -> RepoResult<Panel> {
    let flag: String = row.get("is_active")?;
    let panel = Panel {
        id: Some(row.get("id")?),
        panel_name: row.get("panel_name")?,
        description: row.get("description")?,
        is_active: flag == ACTIVE_FLAG,
        sort_order: row.get("sort_order")?,
        sys_user_id: String::new(),
    };
    Ok(panel)
}

fn active_flag(is_active: bool) -> &'static str {
    if is_active {
        ACTIVE_FLAG
    } else {
        INACTIVE_FLAG
    }
}

/// Escapes LIKE wildcards so the prefix is matched literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    register_panel_functions(conn)?;
    let actual_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
