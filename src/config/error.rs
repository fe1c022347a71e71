//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment value could not be parsed into the expected type.
    #[error("invalid value '{value}' for {name}: expected {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Value parsed but lies outside the accepted range.
    #[error("{name} = {value} is out of range: {reason}")]
    OutOfRange {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Database path exists but is not a file.
    #[error("database path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Engine quality ranking could not be parsed.
    #[error("invalid engine quality policy: {0}")]
    Policy(#[from] crate::model::ValidationError),
}
