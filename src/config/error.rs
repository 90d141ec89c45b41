//! Configuration errors
//!
//! Loading merges three sources (base file, environment overlay, `RANKER__*`
//! variables) and then validates the result. Each variant pins the stage that
//! failed.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No base configuration file in the config directory
    #[error("Base configuration file not found at '{}'", path.display())]
    BaseFileMissing { path: PathBuf },

    /// A source could not be read or parsed while layering
    #[error("Failed to merge configuration for environment '{environment}': {error}")]
    SourceMerge { environment: String, error: String },

    /// The merged sources do not fit the configuration structs
    #[error("Merged configuration for environment '{environment}' has the wrong shape: {error}")]
    ShapeMismatch { environment: String, error: String },

    #[error("Missing required configuration field '{field}' in {section}")]
    MissingField { field: String, section: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

impl ConfigurationError {
    pub fn base_file_missing(path: impl Into<PathBuf>) -> Self {
        Self::BaseFileMissing { path: path.into() }
    }

    pub fn source_merge(environment: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::SourceMerge {
            environment: environment.into(),
            error: error.to_string(),
        }
    }

    pub fn shape_mismatch(environment: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::ShapeMismatch {
            environment: environment.into(),
            error: error.to_string(),
        }
    }

    pub fn missing_field(field: impl Into<String>, section: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            section: section.into(),
        }
    }

    /// A loaded value that is out of range or malformed
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
