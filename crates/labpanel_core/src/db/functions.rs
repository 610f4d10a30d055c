//! Panel-specific SQL scalar functions.
//!
//! # Responsibility
//! - Expose the Rust name normalization to SQL so stored and candidate
//!   values are folded by the same code.
//!
//! # Invariants
//! - `panel_key(x)` equals `model::panel::normalize_key(x)`.
//! - `panel_fold(x)` equals `model::panel::fold_case(x)`.
//! - Both are deterministic and return NULL for NULL input.

use crate::model::panel::{fold_case, normalize_key};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// SQL name of the uniqueness key function.
pub const PANEL_KEY_FN: &str = "panel_key";
/// SQL name of the case-folding function used by prefix search.
pub const PANEL_FOLD_FN: &str = "panel_fold";

/// Registers panel SQL functions on `conn`. Re-registering replaces them.
pub fn register_panel_functions(conn: &Connection) -> rusqlite::Result<()> {
    register_text_fn(conn, PANEL_KEY_FN, normalize_key)?;
    register_text_fn(conn, PANEL_FOLD_FN, fold_case)?;
    Ok(())
}

fn register_text_fn(
    conn: &Connection,
    name: &'static str,
    transform: fn(&str) -> String,
) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        name,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let value = ctx.get::<Option<String>>(0)?;
            Ok(value.map(|value| transform(&value)))
        },
    )
}
