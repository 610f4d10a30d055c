//! In-memory lookup tables derived from active panels.
//!
//! # Responsibility
//! - Serve id→name, id→description and name→id lookups without a query.
//! - Rebuild lazily from the active panel list after invalidation.
//!
//! # Invariants
//! - The three maps are always built and swapped together as one snapshot.
//! - A snapshot loaded before an invalidation is never installed after it.

mod lookup;

pub use lookup::{PanelLookupCache, PanelLookupSnapshot};
