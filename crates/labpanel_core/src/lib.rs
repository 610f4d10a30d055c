//! Core panel catalog logic for LabPanel.
//! This crate is the single source of truth for panel persistence invariants.

pub mod audit;
pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use audit::{
    AuditEntry, AuditError, AuditEvent, AuditResult, AuditTrail, SqliteAuditTrail,
};
pub use cache::{PanelLookupCache, PanelLookupSnapshot};
pub use config::{ConfigError, PageSizeProvider, PanelConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::panel::{Panel, PanelId, PanelValidationError};
pub use repo::panel_repo::{
    DuplicateField, PanelRepository, RepoError, RepoResult, SqlitePanelRepository,
};
pub use service::panel_service::{NewPanelRequest, PanelNeighbors, PanelPage, PanelService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
