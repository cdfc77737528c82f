//! Configuration management for feedstate

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, Result};

const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_EVENT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size for lists without an override
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Per-list page sizes, keyed by list name (e.g. "followers")
    #[serde(default)]
    pub lists: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events buffered per subscriber before the oldest are dropped
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            lists: HashMap::new(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PaginationConfig {
    /// Page size for `list`, falling back to the default
    pub fn page_size_for(&self, list: &str) -> usize {
        self.lists
            .get(list)
            .copied()
            .unwrap_or(self.default_page_size)
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error; every setting has a default.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the state layer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pagination.default_page_size == 0 {
            return Err(invalid("pagination.default_page_size", "must be greater than zero").into());
        }

        if let Some((list, _)) = self.pagination.lists.iter().find(|(_, size)| **size == 0) {
            return Err(invalid(
                &format!("pagination.lists.{}", list),
                "must be greater than zero",
            )
            .into());
        }

        if self.events.capacity == 0 {
            return Err(invalid("events.capacity", "must be greater than zero").into());
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Resolve the configuration file path (`FEEDSTATE_CONFIG`, else the XDG config dir)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FEEDSTATE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("feedstate").join("config.toml"))
}
