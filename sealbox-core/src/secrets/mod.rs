//! Participant-side storage of committed secrets.
//!
//! A record only exists after the ledger accepted the commitment. Losing it
//! makes the commitment impossible to reveal, so every mutation rewrites the
//! whole collection atomically.

pub mod encryption;

use crate::error::{Result, SealError};
use crate::types::{CommitmentRecord, RecordStatus};
use async_trait::async_trait;
use encryption::SealedPayload;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<CommitmentRecord>>;

    async fn get(&self, item_id: i64) -> Result<Option<CommitmentRecord>>;

    /// Fails with `RecordExists` if the item already has a record.
    async fn insert(&self, record: CommitmentRecord) -> Result<()>;

    /// Flips `committed` to `revealed`; already revealed records are returned unchanged.
    async fn mark_revealed(&self, item_id: i64, reveal_tx: &str) -> Result<CommitmentRecord>;
}

/// JSON array of records in a single file, optionally passphrase-encrypted.
pub struct FileSecretStore {
    path: PathBuf,
    passphrase: Option<String>,
    write_lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            path: path.into(),
            passphrase,
            write_lock: Mutex::new(()),
        }
    }

    /// One file per participant under `<data_dir>/secrets/`, named by the
    /// hex-encoded address so distinct addresses never share a file.
    pub fn for_participant(data_dir: &Path, participant: &str, passphrase: Option<String>) -> Self {
        Self::new(
            data_dir
                .join("secrets")
                .join(format!("{}.json", hex::encode(participant))),
            passphrase,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<CommitmentRecord>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let value: serde_json::Value = serde_json::from_slice(&content)?;
        if value.is_array() {
            if self.passphrase.is_some() {
                tracing::warn!("Secret file {} is not encrypted", self.path.display());
            }
            return Ok(serde_json::from_value(value)?);
        }

        let passphrase = self.passphrase.as_deref().ok_or_else(|| {
            SealError::crypto("Secret file is encrypted; a passphrase is required")
        })?;
        let payload: SealedPayload = serde_json::from_value(value)?;
        let plaintext = encryption::open(&payload, passphrase)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    async fn write_records(&self, records: Vec<CommitmentRecord>) -> Result<()> {
        let path = self.path.clone();
        let passphrase = self.passphrase.clone();

        tokio::task::spawn_blocking(move || persist_records(&path, passphrase.as_deref(), &records))
            .await
            .map_err(|e| SealError::internal(format!("Secret file writer failed: {}", e)))?
    }
}

fn persist_records(
    path: &Path,
    passphrase: Option<&str>,
    records: &[CommitmentRecord],
) -> Result<()> {
    let plaintext = serde_json::to_vec_pretty(records)?;
    let content = match passphrase {
        Some(passphrase) => serde_json::to_vec_pretty(&encryption::seal(&plaintext, passphrase)?)?,
        None => plaintext,
    };

    let dir = path
        .parent()
        .ok_or_else(|| SealError::config("Secret file path has no parent directory"))?;
    std::fs::create_dir_all(dir)?;

    // Write next to the target, then rename over it
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SealError::Io(e.error))?;

    Ok(())
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn load_all(&self) -> Result<Vec<CommitmentRecord>> {
        self.read_records().await
    }

    async fn get(&self, item_id: i64) -> Result<Option<CommitmentRecord>> {
        let records = self.read_records().await?;
        Ok(records.into_iter().find(|r| r.item_id == item_id))
    }

    async fn insert(&self, record: CommitmentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_records().await?;
        if records.iter().any(|r| r.item_id == record.item_id) {
            return Err(SealError::RecordExists(record.item_id));
        }

        let item_id = record.item_id;
        records.push(record);
        self.write_records(records).await?;

        tracing::debug!("Stored commitment record for item {}", item_id);
        Ok(())
    }

    async fn mark_revealed(&self, item_id: i64, reveal_tx: &str) -> Result<CommitmentRecord> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_records().await?;
        let record = records
            .iter_mut()
            .find(|r| r.item_id == item_id)
            .ok_or(SealError::RecordNotFound(item_id))?;

        if record.status == RecordStatus::Revealed {
            return Ok(record.clone());
        }

        record.status = RecordStatus::Revealed;
        record.reveal_transaction_hash = Some(reveal_tx.to_string());
        let updated = record.clone();
        self.write_records(records).await?;

        tracing::debug!("Marked commitment record for item {} as revealed", item_id);
        Ok(updated)
    }
}
