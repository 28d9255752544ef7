//! Layered error definitions
//!
//! Categorized by source: config / controller / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Controller Errors =====
    /// Controller connection unavailable (whole batch / shard lost)
    #[error("controller connection '{connection}' error: {message}")]
    ControllerConnection { connection: String, message: String },

    /// Batched read did not complete in time
    #[error("controller read on '{connection}' timed out after {waited_ms}ms")]
    ReadTimeout { connection: String, waited_ms: u64 },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create controller connection error
    pub fn controller_connection(
        connection: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ControllerConnection {
            connection: connection.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a configuration problem (fatal before the loop starts)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigParse { .. } | Self::ConfigValidation { .. })
    }
}
