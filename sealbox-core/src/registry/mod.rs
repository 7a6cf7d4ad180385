//! Item registry: creation, lookup and the one-time ledger attachment of
//! polls and auctions.

pub mod client;
pub mod local;

pub use client::HttpRegistry;
pub use local::SqliteRegistry;

use crate::error::Result;
use crate::types::{Item, ItemKind, NewItem, Tally};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait ItemRegistry: Send + Sync {
    async fn create(&self, new_item: NewItem) -> Result<Item>;

    async fn get(&self, kind: ItemKind, id: i64) -> Result<Item>;

    async fn list(&self, kind: ItemKind) -> Result<Vec<Item>>;

    /// Records the ledger-assigned id after the creation transaction confirms.
    /// Repeating the same attachment is a no-op; a different one is rejected.
    async fn attach_ledger_id(
        &self,
        kind: ItemKind,
        id: i64,
        contract_item_id: u64,
        transaction_hash: &str,
    ) -> Result<Item>;

    /// Reconciles the cached tally with ledger-confirmed counts.
    async fn sync_tally(&self, kind: ItemKind, id: i64, counts: Tally) -> Result<Item>;
}

/// Body of `PATCH /api/{items}/:id/contract-id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachLedgerIdRequest {
    pub contract_item_id: u64,
    pub transaction_hash: String,
}

/// Body of `POST /api/{items}/:id/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTallyRequest {
    pub counts: Tally,
}

/// Body of `POST /api/{items}`; the kind comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub creator_address: String,
    pub commit_deadline: chrono::DateTime<chrono::Utc>,
    pub reveal_deadline: chrono::DateTime<chrono::Utc>,
}

impl CreateItemRequest {
    pub fn into_new_item(self, kind: ItemKind) -> NewItem {
        NewItem {
            kind,
            title: self.title,
            description: self.description,
            creator_address: self.creator_address,
            commit_deadline: self.commit_deadline,
            reveal_deadline: self.reveal_deadline,
        }
    }
}

impl From<&NewItem> for CreateItemRequest {
    fn from(item: &NewItem) -> Self {
        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            creator_address: item.creator_address.clone(),
            commit_deadline: item.commit_deadline,
            reveal_deadline: item.reveal_deadline,
        }
    }
}

/// Error body returned by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
