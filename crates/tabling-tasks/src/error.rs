//! Error types for the task layer

use crate::api::ApiError;
use tabling_engine::TableError;

/// Task layer error
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Change rejected by the reducer
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// API call failed
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Configuration invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid config: {0}")]
    Parse(String),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
