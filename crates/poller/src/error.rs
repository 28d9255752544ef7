//! Poller error types

use contracts::ContractError;
use thiserror::Error;

use crate::scheduler::SchedulerState;

#[derive(Debug, Error)]
pub enum PollerError {
    /// Invalid worker count, batch size, period or address list
    #[error("invalid configuration at '{field}': {message}")]
    Configuration { field: String, message: String },

    /// Operation not allowed in the scheduler's current state
    #[error("scheduler is {state:?}, expected {expected:?}")]
    InvalidState {
        state: SchedulerState,
        expected: SchedulerState,
    },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl PollerError {
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PollerError>;
