use shared::protocol::{Rejection, RejectionKind};
use shared::{RuleError, SessionId};
use thiserror::Error;

/// Errors surfaced by the session engine to the caller that issued a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl SessionError {
    /// Structured rejection sent back to the requester.
    pub fn to_rejection(&self) -> Rejection {
        let kind = match self {
            SessionError::NotFound(_) => RejectionKind::NotFound,
            SessionError::AlreadyExists(_) => RejectionKind::AlreadyExists,
            SessionError::Rule(err) => RejectionKind::Rule(err.kind()),
        };
        Rejection {
            kind,
            reason: self.to_string(),
        }
    }
}
