//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for panels.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Writes validate the panel and enforce name/description uniqueness
//!   before any SQL mutation.
//! - Every successful write invalidates the shared lookup cache.
//! - Repository APIs return semantic errors (`NotFound`,
//!   `DuplicateConflict`) in addition to persistence errors.

pub mod panel_repo;
