//! Panel domain model.
//!
//! # Responsibility
//! - Define the panel record: a named, orderable grouping of lab tests.
//! - Provide write validation and the id sentinel used by duplicate checks.
//! - Own the name/description normalization behind uniqueness and search.
//!
//! # Invariants
//! - `id` is `None` until the repository persists the panel.
//! - `panel_name` and `description` are never blank for a writable panel.
//! - Two values collide when their `normalize_key` forms are equal.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Database-assigned panel identifier.
pub type PanelId = i64;

/// Id used by duplicate checks for panels that have not been persisted.
pub const UNSAVED_PANEL_ID: PanelId = 0;

/// Named, orderable grouping of laboratory test entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    /// `None` for panels not yet inserted.
    pub id: Option<PanelId>,
    pub panel_name: String,
    pub description: String,
    /// Stored as `'Y'`/`'N'`; drives active-panel queries and lookups.
    pub is_active: bool,
    /// Display ordering used by `list_all_panels`, distinct from name order.
    pub sort_order: i64,
    /// Acting user for audit attribution. Not part of the stored row.
    #[serde(skip)]
    pub sys_user_id: String,
}

/// Validation failures for panel writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelValidationError {
    EmptyName,
    EmptyDescription,
    MissingSysUserId,
}

impl Display for PanelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "panel name cannot be blank"),
            Self::EmptyDescription => write!(f, "panel description cannot be blank"),
            Self::MissingSysUserId => write!(f, "sys_user_id is required for panel writes"),
        }
    }
}

impl Error for PanelValidationError {}

impl Panel {
    /// Creates an unsaved, active panel with sort order `0`.
    pub fn new(
        panel_name: impl Into<String>,
        description: impl Into<String>,
        sys_user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            panel_name: panel_name.into(),
            description: description.into(),
            is_active: true,
            sort_order: 0,
            sys_user_id: sys_user_id.into(),
        }
    }

    /// Same as [`Panel::new`] but bound to an existing id.
    pub fn with_id(
        id: PanelId,
        panel_name: impl Into<String>,
        description: impl Into<String>,
        sys_user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id),
            ..Self::new(panel_name, description, sys_user_id)
        }
    }

    /// Checks the fields every write path depends on.
    pub fn validate(&self) -> Result<(), PanelValidationError> {
        if self.panel_name.trim().is_empty() {
            return Err(PanelValidationError::EmptyName);
        }
        if self.description.trim().is_empty() {
            return Err(PanelValidationError::EmptyDescription);
        }
        if self.sys_user_id.trim().is_empty() {
            return Err(PanelValidationError::MissingSysUserId);
        }
        Ok(())
    }

    /// Name key used for uniqueness.
    pub fn normalized_name(&self) -> String {
        normalize_key(&self.panel_name)
    }

    /// Description key used for uniqueness.
    pub fn normalized_description(&self) -> String {
        normalize_key(&self.description)
    }

    /// Id excluded from duplicate searches; `0` for unsaved panels.
    pub fn duplicate_check_id(&self) -> PanelId {
        self.id.unwrap_or(UNSAVED_PANEL_ID)
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Unicode lower-casing used for case-insensitive name matching.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Uniqueness key: lower-cased, then stripped of leading/trailing control
/// characters and spaces (every char <= U+0020). Other Unicode whitespace,
/// such as U+00A0, is kept.
pub fn normalize_key(value: &str) -> String {
    fold_case(value)
        .trim_matches(|ch: char| ch <= '\u{20}')
        .to_string()
}
