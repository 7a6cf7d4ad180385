//! Commit-reveal state machine for a single participant.
//!
//! Per item the participant moves `NoCommitment -> Committed -> Revealed`.
//! The local record is written only after the ledger accepted the commitment,
//! so a failed submission never leaves a record that cannot be revealed.

use crate::commitment::CommitmentScheme;
use crate::error::{ProtocolError, Result, SecretStatus};
use crate::ledger::{Ledger, LedgerError, Verification};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sealbox_core::{
    Clock, CommitmentRecord, CommitmentValue, Item, Phase, RecordStatus, Salt, SecretStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantState {
    NoCommitment,
    Committed,
    Revealed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    pub item_id: i64,
    pub commitment: CommitmentValue,
    pub transaction_hash: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealReceipt {
    pub item_id: i64,
    pub option: u64,
    pub transaction_hash: String,
    /// True when the item had been revealed before this call.
    pub already_revealed: bool,
}

/// Marks an item as having a submission in flight until dropped.
struct InFlight<'a> {
    items: &'a Mutex<HashSet<i64>>,
    item_id: i64,
}

impl<'a> InFlight<'a> {
    fn acquire(items: &'a Mutex<HashSet<i64>>, item_id: i64) -> Option<Self> {
        if items.lock().insert(item_id) {
            Some(Self { items, item_id })
        } else {
            None
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.items.lock().remove(&self.item_id);
    }
}

pub struct Participant {
    address: String,
    ledger: Arc<dyn Ledger>,
    secrets: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    scheme: Arc<dyn CommitmentScheme>,
    commits_in_flight: Mutex<HashSet<i64>>,
    reveals_in_flight: Mutex<HashSet<i64>>,
}

impl Participant {
    pub fn new(
        address: impl Into<String>,
        ledger: Arc<dyn Ledger>,
        secrets: Arc<dyn SecretStore>,
        clock: Arc<dyn Clock>,
        scheme: Arc<dyn CommitmentScheme>,
    ) -> Self {
        Self {
            address: address.into(),
            ledger,
            secrets,
            clock,
            scheme,
            commits_in_flight: Mutex::new(HashSet::new()),
            reveals_in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn state(&self, item: &Item) -> Result<ParticipantState> {
        let state = match self.secrets.get(item.id).await? {
            None => ParticipantState::NoCommitment,
            Some(record) if record.is_revealed() => ParticipantState::Revealed,
            Some(_) => ParticipantState::Committed,
        };
        Ok(state)
    }

    pub async fn records(&self) -> Result<Vec<CommitmentRecord>> {
        Ok(self.secrets.load_all().await?)
    }

    /// Commits to `secret` (an option index or bid amount) on `item`.
    pub async fn submit_commit(&self, item: &Item, secret: u64, salt: Salt) -> Result<CommitReceipt> {
        // Held until the record is written, so the existence check below
        // cannot race another commit for the same item.
        let _in_flight = InFlight::acquire(&self.commits_in_flight, item.id)
            .ok_or(ProtocolError::AlreadyCommitted(item.id))?;

        if self.secrets.get(item.id).await?.is_some() {
            return Err(ProtocolError::AlreadyCommitted(item.id));
        }

        let phase = item.phase_at(self.clock.now());
        if phase != Phase::Commit {
            tracing::warn!("Commit on item {} refused in {} phase", item.id, phase);
            return Err(ProtocolError::WrongPhase {
                item_id: item.id,
                expected: Phase::Commit,
                actual: phase,
                secret: SecretStatus::NotCreated,
            });
        }

        let contract_item_id = item
            .contract_item_id
            .ok_or(ProtocolError::NotOnLedger(item.id))?;

        let commitment = self.scheme.commit(item.kind, secret, &salt);
        let tx = self
            .ledger
            .submit(contract_item_id, &self.address, &commitment)
            .await
            .map_err(|e| ledger_failure(e, SecretStatus::NotCreated))?;

        let committed_at = self.clock.now();
        let record = CommitmentRecord {
            item_id: item.id,
            secret_value: secret,
            salt: salt.clone(),
            commitment: commitment.clone(),
            transaction_hash: tx.as_str().to_string(),
            reveal_transaction_hash: None,
            status: RecordStatus::Committed,
            committed_at,
        };

        if let Err(source) = self.secrets.insert(record).await {
            tracing::warn!(
                "Commitment for item {} accepted by ledger but not saved locally: {}",
                item.id,
                source
            );
            return Err(ProtocolError::CommitNotRecorded {
                item_id: item.id,
                transaction_hash: tx.as_str().to_string(),
                secret_value: secret,
                salt,
                source,
            });
        }

        tracing::info!("{} committed on item {} (tx {})", self.address, item.id, tx);
        Ok(CommitReceipt {
            item_id: item.id,
            commitment,
            transaction_hash: tx.as_str().to_string(),
            committed_at,
        })
    }

    /// Reveals the stored secret for `item`. Repeating a completed reveal
    /// returns the original receipt.
    pub async fn submit_reveal(&self, item: &Item) -> Result<RevealReceipt> {
        let record = self.secrets.get(item.id).await?;

        if let Some(record) = record.as_ref().filter(|r| r.is_revealed()) {
            return Ok(RevealReceipt {
                item_id: item.id,
                option: record.secret_value,
                transaction_hash: record.reveal_transaction_hash.clone().unwrap_or_default(),
                already_revealed: true,
            });
        }

        let phase = item.phase_at(self.clock.now());
        if phase != Phase::Reveal {
            tracing::warn!("Reveal on item {} refused in {} phase", item.id, phase);
            return Err(ProtocolError::WrongPhase {
                item_id: item.id,
                expected: Phase::Reveal,
                actual: phase,
                secret: if record.is_some() {
                    SecretStatus::Intact
                } else {
                    SecretStatus::NotCreated
                },
            });
        }

        let record = record.ok_or(ProtocolError::NoCommitmentFound(item.id))?;
        let contract_item_id = item
            .contract_item_id
            .ok_or(ProtocolError::NotOnLedger(item.id))?;

        let _in_flight = InFlight::acquire(&self.reveals_in_flight, item.id)
            .ok_or(ProtocolError::RevealInProgress(item.id))?;

        let verification = self
            .ledger
            .verify(contract_item_id, &self.address, record.secret_value, &record.salt)
            .await
            .map_err(|e| ledger_failure(e, SecretStatus::Intact))?;

        let tx = match verification {
            Verification::Accepted(tx) => tx,
            Verification::Mismatch => return Err(ProtocolError::RevealMismatch(item.id)),
        };

        let updated = self
            .secrets
            .mark_revealed(item.id, tx.as_str())
            .await?;

        tracing::info!("{} revealed on item {} (tx {})", self.address, item.id, tx);
        Ok(RevealReceipt {
            item_id: item.id,
            option: updated.secret_value,
            transaction_hash: tx.as_str().to_string(),
            already_revealed: false,
        })
    }
}

fn ledger_failure(err: LedgerError, if_rejected: SecretStatus) -> ProtocolError {
    let secret = match err {
        LedgerError::Rejected(_) => if_rejected,
        // The request may or may not have landed.
        LedgerError::Unavailable(_) => SecretStatus::Unknown,
    };
    ProtocolError::LedgerRejected {
        reason: err.to_string(),
        secret,
    }
}
