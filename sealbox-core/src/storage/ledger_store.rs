use crate::error::{Result, SealError};
use crate::storage::{from_millis, invalid_column, to_millis, Storage};
use crate::types::{CommitmentValue, ItemKind, Tally};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct LedgerItemRow {
    pub contract_item_id: u64,
    pub kind: ItemKind,
    pub commit_deadline: DateTime<Utc>,
    pub reveal_deadline: DateTime<Utc>,
    pub creation_tx: String,
    pub tally: Tally,
}

#[derive(Debug, Clone)]
pub struct LedgerCommitmentRow {
    pub contract_item_id: u64,
    pub participant: String,
    pub commitment: CommitmentValue,
    pub commit_tx: String,
    pub revealed_option: Option<u64>,
    pub reveal_tx: Option<String>,
}

/// Persistence behind the development ledger.
pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn insert_item(
        &self,
        kind: ItemKind,
        commit_deadline: DateTime<Utc>,
        reveal_deadline: DateTime<Utc>,
        creation_tx: &str,
    ) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO ledger_items (kind, commit_deadline, reveal_deadline, creation_tx, tally)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind.as_str(),
                to_millis(commit_deadline),
                to_millis(reveal_deadline),
                creation_tx,
                serde_json::to_string(&Tally::new())?,
            ],
        )?;

        Ok(conn.last_insert_rowid() as u64)
    }

    pub async fn load_item(&self, contract_item_id: u64) -> Result<Option<LedgerItemRow>> {
        let conn = self.storage.get_connection().await;

        let row = conn
            .query_row(
                "SELECT contract_item_id, kind, commit_deadline, reveal_deadline, creation_tx, tally
                 FROM ledger_items WHERE contract_item_id = ?1",
                params![contract_item_id as i64],
                |row| {
                    let id: i64 = row.get(0)?;
                    let kind_str: String = row.get(1)?;
                    let tally_str: String = row.get(5)?;

                    Ok(LedgerItemRow {
                        contract_item_id: id as u64,
                        kind: kind_str.parse().map_err(|_| invalid_column(1, "kind"))?,
                        commit_deadline: from_millis(2, row.get(2)?)?,
                        reveal_deadline: from_millis(3, row.get(3)?)?,
                        creation_tx: row.get(4)?,
                        tally: serde_json::from_str(&tally_str)
                            .map_err(|_| invalid_column(5, "tally"))?,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }

    /// Returns false if the participant already has a commitment on this item.
    pub async fn insert_commitment(
        &self,
        contract_item_id: u64,
        participant: &str,
        commitment: &CommitmentValue,
        commit_tx: &str,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO ledger_commitments
             (contract_item_id, participant, commitment, commit_tx)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                contract_item_id as i64,
                participant,
                commitment.as_str(),
                commit_tx
            ],
        )?;

        Ok(inserted == 1)
    }

    pub async fn load_commitment(
        &self,
        contract_item_id: u64,
        participant: &str,
    ) -> Result<Option<LedgerCommitmentRow>> {
        let conn = self.storage.get_connection().await;

        let row = conn
            .query_row(
                "SELECT commitment, commit_tx, revealed_option, reveal_tx
                 FROM ledger_commitments WHERE contract_item_id = ?1 AND participant = ?2",
                params![contract_item_id as i64, participant],
                |row| {
                    let commitment_str: String = row.get(0)?;
                    let revealed_option: Option<i64> = row.get(2)?;

                    Ok(LedgerCommitmentRow {
                        contract_item_id,
                        participant: participant.to_string(),
                        commitment: CommitmentValue::parse(&commitment_str)
                            .map_err(|_| invalid_column(0, "commitment"))?,
                        commit_tx: row.get(1)?,
                        revealed_option: revealed_option.map(|o| o as u64),
                        reveal_tx: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }

    /// Marks the commitment revealed and bumps the item's tally in one transaction.
    pub async fn record_reveal(
        &self,
        contract_item_id: u64,
        participant: &str,
        option: u64,
        reveal_tx: &str,
    ) -> Result<Tally> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE ledger_commitments SET revealed_option = ?1, reveal_tx = ?2
             WHERE contract_item_id = ?3 AND participant = ?4 AND revealed_option IS NULL",
            params![option as i64, reveal_tx, contract_item_id as i64, participant],
        )?;
        if updated != 1 {
            return Err(SealError::internal(format!(
                "No unrevealed commitment for {} on ledger item {}",
                participant, contract_item_id
            )));
        }

        let tally_str: String = tx.query_row(
            "SELECT tally FROM ledger_items WHERE contract_item_id = ?1",
            params![contract_item_id as i64],
            |row| row.get(0),
        )?;
        let mut tally: Tally = serde_json::from_str(&tally_str)?;
        tally.increment(option);

        tx.execute(
            "UPDATE ledger_items SET tally = ?1 WHERE contract_item_id = ?2",
            params![serde_json::to_string(&tally)?, contract_item_id as i64],
        )?;
        tx.commit()?;

        Ok(tally)
    }
}
