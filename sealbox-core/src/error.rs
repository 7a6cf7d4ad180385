use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SealError>;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("Invalid schedule: commit deadline {commit_deadline} must be before reveal deadline {reveal_deadline}")]
    InvalidSchedule {
        commit_deadline: DateTime<Utc>,
        reveal_deadline: DateTime<Utc>,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Item {item_id} is already attached to ledger item {contract_item_id}")]
    LedgerIdConflict { item_id: i64, contract_item_id: u64 },

    #[error("A commitment record already exists for item {0}")]
    RecordExists(i64),

    #[error("No commitment record for item {0}")]
    RecordNotFound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SealError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors caused by the caller's input rather than the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SealError::InvalidSchedule { .. }
                | SealError::Validation(_)
                | SealError::NotFound(_)
                | SealError::LedgerIdConflict { .. }
        )
    }
}

impl From<reqwest::Error> for SealError {
    fn from(err: reqwest::Error) -> Self {
        SealError::Http(err.to_string())
    }
}
