//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration rejected after CLI overrides
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Polling loop failure
    #[error("Pipeline execution failed: {message}")]
    PipelineExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }
}
