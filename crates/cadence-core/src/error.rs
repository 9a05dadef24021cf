use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("habit not found: {0}")]
    HabitNotFound(Uuid),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reserved. Same-day duplicate completions resolve as idempotent
    /// no-ops, so no current operation returns this.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CdResult<T> = Result<T, CadenceError>;
