pub mod item_store;
pub mod ledger_store;

pub use item_store::ItemStore;
pub use ledger_store::{LedgerCommitmentRow, LedgerItemRow, LedgerStore};

use crate::error::{Result, SealError};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SealError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn).await
    }

    /// Throwaway database, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Registry items (polls and auctions)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                creator_address TEXT NOT NULL,
                commit_deadline INTEGER NOT NULL,
                reveal_deadline INTEGER NOT NULL,
                contract_item_id INTEGER,
                transaction_hash TEXT,
                status TEXT NOT NULL,
                tally TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Development ledger: one row per on-ledger item
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_items (
                contract_item_id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                commit_deadline INTEGER NOT NULL,
                reveal_deadline INTEGER NOT NULL,
                creation_tx TEXT NOT NULL,
                tally TEXT NOT NULL
            )",
            [],
        )?;

        // Development ledger: commitments per participant
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_commitments (
                contract_item_id INTEGER NOT NULL,
                participant TEXT NOT NULL,
                commitment TEXT NOT NULL,
                commit_tx TEXT NOT NULL,
                revealed_option INTEGER,
                reveal_tx TEXT,
                FOREIGN KEY (contract_item_id) REFERENCES ledger_items(contract_item_id),
                PRIMARY KEY (contract_item_id, participant)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(col: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(col, millis))
}

pub(crate) fn invalid_column(col: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(col, name.to_string(), rusqlite::types::Type::Text)
}
