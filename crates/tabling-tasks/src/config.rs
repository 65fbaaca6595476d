//! Controller configuration
//!
//! Loaded from TOML; every field has a default so partial files work:
//!
//! ```toml
//! search_debounce_ms = 250
//! history_max_depth = 100
//! log_filter = "info,tabling_engine=debug"
//! log_json = false
//! page_size = 100
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tabling_engine::DEFAULT_HISTORY_DEPTH;

/// Default debounce before a search refetches
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 250;

/// Table controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablingConfig {
    /// Delay between the last search keystroke and the refetch
    pub search_debounce_ms: u64,
    /// Undo entries kept per table
    pub history_max_depth: usize,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Rows requested per list fetch
    pub page_size: usize,
}

impl Default for TablingConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            history_max_depth: DEFAULT_HISTORY_DEPTH,
            log_filter: "info".to_string(),
            log_json: false,
            page_size: 100,
        }
    }
}

impl TablingConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or a value is out of range
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns the first out-of-range field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "history_max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// With search debounce
    #[inline]
    #[must_use]
    pub fn with_search_debounce_ms(mut self, ms: u64) -> Self {
        self.search_debounce_ms = ms;
        self
    }

    /// With history depth
    #[inline]
    #[must_use]
    pub fn with_history_max_depth(mut self, depth: usize) -> Self {
        self.history_max_depth = depth;
        self
    }

    /// With log filter
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// With JSON logs
    #[inline]
    #[must_use]
    pub fn with_log_json(mut self, json: bool) -> Self {
        self.log_json = json;
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Search debounce as a duration
    #[inline]
    #[must_use]
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}
