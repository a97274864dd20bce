//! Errors raised while loading or validating a [`TetherConfig`](super::TetherConfig).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// A source could not be read or did not fit the schema.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// A setting that the rest of the configuration makes mandatory is unset.
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::ValidationError { message }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::MissingField { field }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
