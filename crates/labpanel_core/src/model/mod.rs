//! Domain model for laboratory panels.
//!
//! # Responsibility
//! - Define the canonical panel record shared by repository and services.
//!
//! # Invariants
//! - Persisted panels are identified by a database-assigned `PanelId`.
//! - Name and description uniqueness is compared trimmed and lower-cased.

pub mod panel;
