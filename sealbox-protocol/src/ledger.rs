//! The external system of record for commitments, reveals and tallies.
//!
//! The state machine only talks to the [`Ledger`] trait. [`LocalLedger`] is a
//! single-node development ledger over SQLite that enforces the same rules a
//! contract would: phases, one commitment per participant, hash check on reveal.

use crate::commitment::CommitmentScheme;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use sealbox_core::storage::LedgerStore;
use sealbox_core::{Clock, CommitmentValue, ItemKind, Phase, Salt, SealError, Storage, Tally};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Transaction reference returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Random 32-byte identifier from the OS CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Accepted(TxRef),
    /// The revealed values do not hash to the stored commitment.
    Mismatch,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<SealError> for LedgerError {
    fn from(err: SealError) -> Self {
        LedgerError::Unavailable(err.to_string())
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Registers an item; returns the ledger-assigned id and the creation transaction.
    async fn create_item(
        &self,
        kind: ItemKind,
        commit_deadline: DateTime<Utc>,
        reveal_deadline: DateTime<Utc>,
    ) -> LedgerResult<(u64, TxRef)>;

    async fn submit(
        &self,
        contract_item_id: u64,
        participant: &str,
        commitment: &CommitmentValue,
    ) -> LedgerResult<TxRef>;

    async fn verify(
        &self,
        contract_item_id: u64,
        participant: &str,
        secret: u64,
        salt: &Salt,
    ) -> LedgerResult<Verification>;

    /// Authoritative per-option counts of accepted reveals.
    async fn read_tally(&self, contract_item_id: u64) -> LedgerResult<Tally>;
}

pub struct LocalLedger {
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
    scheme: Arc<dyn CommitmentScheme>,
}

impl LocalLedger {
    pub fn new(
        storage: Arc<Storage>,
        clock: Arc<dyn Clock>,
        scheme: Arc<dyn CommitmentScheme>,
    ) -> Self {
        Self {
            storage,
            clock,
            scheme,
        }
    }

    async fn phase_of(&self, contract_item_id: u64) -> LedgerResult<(ItemKind, Phase)> {
        let item = LedgerStore::new(&self.storage)
            .load_item(contract_item_id)
            .await?
            .ok_or_else(|| {
                LedgerError::Rejected(format!("unknown ledger item {}", contract_item_id))
            })?;

        let phase = Phase::classify(self.clock.now(), item.commit_deadline, item.reveal_deadline);
        Ok((item.kind, phase))
    }
}

#[async_trait]
impl Ledger for LocalLedger {
    async fn create_item(
        &self,
        kind: ItemKind,
        commit_deadline: DateTime<Utc>,
        reveal_deadline: DateTime<Utc>,
    ) -> LedgerResult<(u64, TxRef)> {
        if commit_deadline >= reveal_deadline {
            return Err(LedgerError::Rejected(
                "commit deadline must precede reveal deadline".to_string(),
            ));
        }

        let tx = TxRef::random();
        let id = LedgerStore::new(&self.storage)
            .insert_item(kind, commit_deadline, reveal_deadline, tx.as_str())
            .await?;

        tracing::info!("Ledger created {} item {} (tx {})", kind, id, tx);
        Ok((id, tx))
    }

    async fn submit(
        &self,
        contract_item_id: u64,
        participant: &str,
        commitment: &CommitmentValue,
    ) -> LedgerResult<TxRef> {
        let (_, phase) = self.phase_of(contract_item_id).await?;
        if phase != Phase::Commit {
            return Err(LedgerError::Rejected(format!(
                "commit window closed ({} phase)",
                phase
            )));
        }

        let tx = TxRef::random();
        let inserted = LedgerStore::new(&self.storage)
            .insert_commitment(contract_item_id, participant, commitment, tx.as_str())
            .await?;
        if !inserted {
            return Err(LedgerError::Rejected(format!(
                "{} already committed on item {}",
                participant, contract_item_id
            )));
        }

        tracing::info!(
            "Ledger accepted commitment from {} on item {} (tx {})",
            participant,
            contract_item_id,
            tx
        );
        Ok(tx)
    }

    async fn verify(
        &self,
        contract_item_id: u64,
        participant: &str,
        secret: u64,
        salt: &Salt,
    ) -> LedgerResult<Verification> {
        let (kind, phase) = self.phase_of(contract_item_id).await?;
        if phase != Phase::Reveal {
            return Err(LedgerError::Rejected(format!(
                "reveal window not open ({} phase)",
                phase
            )));
        }

        let store = LedgerStore::new(&self.storage);
        let stored = store
            .load_commitment(contract_item_id, participant)
            .await?
            .ok_or_else(|| {
                LedgerError::Rejected(format!(
                    "no commitment from {} on item {}",
                    participant, contract_item_id
                ))
            })?;

        if !self.scheme.verify(&stored.commitment, kind, secret, salt) {
            tracing::warn!(
                "Reveal from {} on item {} does not match its commitment",
                participant,
                contract_item_id
            );
            return Ok(Verification::Mismatch);
        }

        // A repeated valid reveal returns the original transaction without recounting
        if let (Some(_), Some(reveal_tx)) = (stored.revealed_option, stored.reveal_tx) {
            return Ok(Verification::Accepted(TxRef::new(reveal_tx)));
        }

        let tx = TxRef::random();
        store
            .record_reveal(contract_item_id, participant, secret, tx.as_str())
            .await?;

        tracing::info!(
            "Ledger accepted reveal from {} on item {} (tx {})",
            participant,
            contract_item_id,
            tx
        );
        Ok(Verification::Accepted(tx))
    }

    async fn read_tally(&self, contract_item_id: u64) -> LedgerResult<Tally> {
        let item = LedgerStore::new(&self.storage)
            .load_item(contract_item_id)
            .await?
            .ok_or_else(|| {
                LedgerError::Rejected(format!("unknown ledger item {}", contract_item_id))
            })?;
        Ok(item.tally)
    }
}
