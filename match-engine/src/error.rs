use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("A pending invitation already exists for this player")]
    DuplicateInvitation,

    #[error("A pending join request already exists for this match")]
    DuplicateRequest,

    #[error("Match is full")]
    MatchFull,

    #[error("Player is not a participant of this match")]
    NotParticipant,

    #[error("Player is already a participant of this match")]
    AlreadyParticipant,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("Concurrent update on {0}, retries exhausted")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        WorkflowError::InvalidState(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        WorkflowError::Forbidden(msg.into())
    }
}
