use crate::error::Result;
use crate::storage::{from_millis, invalid_column, to_millis, Storage};
use crate::types::{Item, ItemKind, ItemStatus, NewItem, Tally};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const ITEM_COLUMNS: &str = "id, kind, title, description, creator_address, commit_deadline, \
     reveal_deadline, contract_item_id, transaction_hash, status, tally, created_at";

pub struct ItemStore<'a> {
    storage: &'a Storage,
}

impl<'a> ItemStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn insert_item(&self, new_item: &NewItem, created_at: DateTime<Utc>) -> Result<Item> {
        let conn = self.storage.get_connection().await;
        let tally = Tally::new();

        conn.execute(
            "INSERT INTO items (kind, title, description, creator_address, commit_deadline,
                                reveal_deadline, status, tally, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new_item.kind.as_str(),
                new_item.title,
                new_item.description,
                new_item.creator_address,
                to_millis(new_item.commit_deadline),
                to_millis(new_item.reveal_deadline),
                ItemStatus::Pending.as_str(),
                serde_json::to_string(&tally)?,
                to_millis(created_at),
            ],
        )?;

        // Read back so deadlines carry the stored millisecond precision
        let item = conn.query_row(
            &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
            params![conn.last_insert_rowid()],
            item_from_row,
        )?;

        Ok(item)
    }

    pub async fn load_item(&self, id: i64) -> Result<Option<Item>> {
        let conn = self.storage.get_connection().await;

        let item = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                item_from_row,
            )
            .optional()?;

        Ok(item)
    }

    pub async fn list_items(&self, kind: Option<ItemKind>) -> Result<Vec<Item>> {
        let conn = self.storage.get_connection().await;

        let mut items = Vec::new();
        match kind {
            Some(kind) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM items WHERE kind = ?1 ORDER BY id ASC",
                    ITEM_COLUMNS
                ))?;
                for item in stmt.query_map(params![kind.as_str()], item_from_row)? {
                    items.push(item?);
                }
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM items ORDER BY id ASC", ITEM_COLUMNS))?;
                for item in stmt.query_map([], item_from_row)? {
                    items.push(item?);
                }
            }
        }

        Ok(items)
    }

    /// Sets the ledger reference unless one is already present. Returns false
    /// when the item was already attached (or does not exist).
    pub async fn set_ledger_ref(
        &self,
        id: i64,
        contract_item_id: u64,
        transaction_hash: &str,
        status: ItemStatus,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE items SET contract_item_id = ?1, transaction_hash = ?2, status = ?3
             WHERE id = ?4 AND contract_item_id IS NULL",
            params![contract_item_id as i64, transaction_hash, status.as_str(), id],
        )?;

        Ok(updated == 1)
    }

    /// Folds `incoming` into the stored tally (per-option maximum) under a
    /// single lock. Returns the resulting tally, or None for an unknown item.
    pub async fn merge_tally(&self, id: i64, incoming: &Tally) -> Result<Option<Tally>> {
        let conn = self.storage.get_connection().await;

        let stored: Option<String> = conn
            .query_row("SELECT tally FROM items WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(stored) = stored else {
            return Ok(None);
        };

        let mut tally: Tally = serde_json::from_str(&stored)?;
        if tally.merge_max(incoming) {
            conn.execute(
                "UPDATE items SET tally = ?1 WHERE id = ?2",
                params![serde_json::to_string(&tally)?, id],
            )?;
        }

        Ok(Some(tally))
    }

    /// Marks every active item whose reveal deadline has passed as completed.
    pub async fn complete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE items SET status = ?1 WHERE status = ?2 AND reveal_deadline <= ?3",
            params![
                ItemStatus::Completed.as_str(),
                ItemStatus::Active.as_str(),
                to_millis(now),
            ],
        )?;

        if updated > 0 {
            tracing::info!("Marked {} items as completed", updated);
        }
        Ok(updated)
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let kind_str: String = row.get(1)?;
    let contract_item_id: Option<i64> = row.get(7)?;
    let status_str: String = row.get(9)?;
    let tally_str: String = row.get(10)?;

    let kind: ItemKind = kind_str.parse().map_err(|_| invalid_column(1, "kind"))?;
    let status: ItemStatus = status_str.parse().map_err(|_| invalid_column(9, "status"))?;
    let tally: Tally = serde_json::from_str(&tally_str).map_err(|_| invalid_column(10, "tally"))?;

    Ok(Item {
        id: row.get(0)?,
        kind,
        title: row.get(2)?,
        description: row.get(3)?,
        creator_address: row.get(4)?,
        commit_deadline: from_millis(5, row.get(5)?)?,
        reveal_deadline: from_millis(6, row.get(6)?)?,
        contract_item_id: contract_item_id.map(|id| id as u64),
        transaction_hash: row.get(8)?,
        status,
        tally,
        created_at: from_millis(11, row.get(11)?)?,
    })
}
