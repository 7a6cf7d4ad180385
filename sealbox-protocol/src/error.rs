use sealbox_core::{Phase, Salt, SealError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Whether the participant can still act on their secret after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretStatus {
    /// Nothing was committed; the participant may start over (same salt is fine).
    NotCreated,
    /// The local record is present and unchanged; retrying is safe.
    Intact,
    /// No usable local record; the item cannot be revealed from this device.
    Lost,
    /// The failure happened before the local state could be inspected.
    Unknown,
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Item {item_id} is in the {actual} phase, expected {expected}")]
    WrongPhase {
        item_id: i64,
        expected: Phase,
        actual: Phase,
        secret: SecretStatus,
    },

    #[error("A commitment for item {0} already exists")]
    AlreadyCommitted(i64),

    #[error("No local commitment found for item {0}; reveal from the device used to commit")]
    NoCommitmentFound(i64),

    #[error("Ledger rejected the reveal for item {0}: values do not match the stored commitment")]
    RevealMismatch(i64),

    #[error("Ledger rejected the request: {reason}")]
    LedgerRejected { reason: String, secret: SecretStatus },

    #[error("Item {0} has not been confirmed on the ledger yet")]
    NotOnLedger(i64),

    #[error("A reveal for item {0} is already in flight")]
    RevealInProgress(i64),

    #[error("Commitment for item {item_id} was accepted by the ledger (tx {transaction_hash}) but could not be saved locally: {source}")]
    CommitNotRecorded {
        item_id: i64,
        transaction_hash: String,
        secret_value: u64,
        salt: Salt,
        #[source]
        source: SealError,
    },

    #[error(transparent)]
    Core(#[from] SealError),
}

impl ProtocolError {
    pub fn secret_status(&self) -> SecretStatus {
        match self {
            ProtocolError::WrongPhase { secret, .. } => *secret,
            ProtocolError::LedgerRejected { secret, .. } => *secret,
            ProtocolError::AlreadyCommitted(_) | ProtocolError::RevealInProgress(_) => {
                SecretStatus::Intact
            }
            ProtocolError::NoCommitmentFound(_)
            | ProtocolError::RevealMismatch(_)
            | ProtocolError::CommitNotRecorded { .. } => SecretStatus::Lost,
            ProtocolError::NotOnLedger(_) => SecretStatus::NotCreated,
            ProtocolError::Core(_) => SecretStatus::Unknown,
        }
    }

    /// Secret and salt that only survive inside this error, if any.
    pub fn recovery(&self) -> Option<(u64, &str)> {
        match self {
            ProtocolError::CommitNotRecorded {
                secret_value, salt, ..
            } => Some((*secret_value, salt.as_str())),
            _ => None,
        }
    }
}
