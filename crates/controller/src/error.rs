//! Controller error types

use contracts::ContractError;
use thiserror::Error;

/// Controller specific error
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Connection could not be opened
    #[error("failed to open connection to {endpoint} for worker {worker}: {message}")]
    OpenFailed {
        endpoint: String,
        worker: usize,
        message: String,
    },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ControllerError {
    /// Create connection open error
    pub fn open_failed(endpoint: impl Into<String>, worker: usize, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            endpoint: endpoint.into(),
            worker,
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ControllerError>;
