//! Engine error taxonomy

use std::fmt;

use thiserror::Error;

use crate::{state::TimerStatus, store::StoreError};

/// Commands whose legality depends on the current status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Stop,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Stop => "stop",
        })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Timer {0} not found")]
    NotFound(String),

    #[error("Duration must be greater than zero")]
    InvalidDuration,

    #[error("Badge must not be empty")]
    InvalidBadge,

    #[error("Cannot {command} a timer that is {from}")]
    InvalidTransition { from: TimerStatus, command: Command },

    #[error("Timer {0} has no time left; reset it first")]
    AlreadyExpired(String),

    /// Persistence failures, never a validation problem
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// True for failures caused by the request rather than the store
    pub fn is_validation(&self) -> bool {
        !matches!(self, EngineError::Store(_))
    }
}
