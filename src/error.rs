use thiserror::Error;

use crate::session::SessionPhase;
use crate::store::SessionId;

/// Errors raised by a typing session. Always caller error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {operation} while session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: SessionPhase,
    },
}

impl SessionError {
    pub fn invalid_state(operation: &'static str, phase: SessionPhase) -> Self {
        Self::InvalidState { operation, phase }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
