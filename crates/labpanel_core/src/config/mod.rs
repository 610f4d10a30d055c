//! Runtime configuration for panel persistence.
//!
//! # Responsibility
//! - Load repository settings from JSON with an environment override.
//! - Expose page sizing through `PageSizeProvider`.
//!
//! # Invariants
//! - `default_page_size` is always >= 1 after validation.

use log::warn;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable overriding `default_page_size`.
pub const PAGE_SIZE_ENV: &str = "LABPANEL_PAGE_SIZE";
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Source of the page size used by paginated listings.
pub trait PageSizeProvider {
    fn default_page_size(&self) -> u32;
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    InvalidPageSize(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidPageSize(value) => {
                write!(f, "default_page_size must be a positive integer, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidPageSize(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings consumed by panel repositories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelConfig {
    pub default_page_size: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PanelConfig {
    /// Parses and validates a JSON config document. Missing keys use defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Applies `LABPANEL_PAGE_SIZE` when set.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        match std::env::var(PAGE_SIZE_ENV) {
            Ok(value) => self.with_page_size_override(&value),
            Err(std::env::VarError::NotPresent) => Ok(self),
            Err(std::env::VarError::NotUnicode(_)) => {
                warn!("event=config_env module=config status=ignored var={PAGE_SIZE_ENV} reason=not_unicode");
                Ok(self)
            }
        }
    }

    fn with_page_size_override(mut self, value: &str) -> Result<Self, ConfigError> {
        self.default_page_size = parse_page_size(value)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidPageSize("0".to_string()));
        }
        Ok(())
    }
}

impl PageSizeProvider for PanelConfig {
    fn default_page_size(&self) -> u32 {
        self.default_page_size
    }
}

fn parse_page_size(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(ConfigError::InvalidPageSize(value.to_string())),
    }
}
