use crate::error::{Result, SealError};
use crate::phase::{Clock, Phase};
use crate::registry::ItemRegistry;
use crate::storage::{ItemStore, Storage};
use crate::types::{Item, ItemKind, ItemStatus, NewItem, Tally};
use async_trait::async_trait;
use std::sync::Arc;

/// Registry backed by the local SQLite database. This is what the HTTP
/// server serves and what the CLI uses when no server is configured.
pub struct SqliteRegistry {
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
}

impl SqliteRegistry {
    pub fn new(storage: Arc<Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    async fn load(&self, kind: ItemKind, id: i64) -> Result<Item> {
        let store = ItemStore::new(&self.storage);
        store.complete_expired(self.clock.now()).await?;

        store
            .load_item(id)
            .await?
            .filter(|item| item.kind == kind)
            .ok_or_else(|| SealError::not_found(format!("{} {}", capitalize(kind.as_str()), id)))
    }
}

#[async_trait]
impl ItemRegistry for SqliteRegistry {
    async fn create(&self, new_item: NewItem) -> Result<Item> {
        new_item.validate()?;

        let store = ItemStore::new(&self.storage);
        let item = store.insert_item(&new_item, self.clock.now()).await?;

        tracing::info!(
            "Created {} {} '{}' (commit until {}, reveal until {})",
            item.kind,
            item.id,
            item.title,
            item.commit_deadline,
            item.reveal_deadline
        );
        Ok(item)
    }

    async fn get(&self, kind: ItemKind, id: i64) -> Result<Item> {
        self.load(kind, id).await
    }

    async fn list(&self, kind: ItemKind) -> Result<Vec<Item>> {
        let store = ItemStore::new(&self.storage);
        store.complete_expired(self.clock.now()).await?;
        store.list_items(Some(kind)).await
    }

    async fn attach_ledger_id(
        &self,
        kind: ItemKind,
        id: i64,
        contract_item_id: u64,
        transaction_hash: &str,
    ) -> Result<Item> {
        if transaction_hash.trim().is_empty() {
            return Err(SealError::validation("Transaction hash cannot be empty"));
        }

        let item = self.load(kind, id).await?;
        let now = self.clock.now();
        let status = if item.phase_at(now) == Phase::Ended {
            ItemStatus::Completed
        } else {
            ItemStatus::Active
        };

        let store = ItemStore::new(&self.storage);
        if store
            .set_ledger_ref(id, contract_item_id, transaction_hash, status)
            .await?
        {
            tracing::info!(
                "Attached {} {} to ledger item {} (tx {})",
                kind,
                id,
                contract_item_id,
                transaction_hash
            );
            return self.load(kind, id).await;
        }

        // Already attached: same reference is a no-op, anything else conflicts
        let current = self.load(kind, id).await?;
        let same_ref = current.contract_item_id == Some(contract_item_id)
            && current.transaction_hash.as_deref() == Some(transaction_hash);
        if same_ref {
            tracing::debug!("Ledger id for {} {} already attached", kind, id);
            Ok(current)
        } else {
            tracing::warn!(
                "Rejected re-attachment of {} {} to ledger item {}",
                kind,
                id,
                contract_item_id
            );
            Err(SealError::LedgerIdConflict {
                item_id: id,
                contract_item_id: current.contract_item_id.unwrap_or(contract_item_id),
            })
        }
    }

    async fn sync_tally(&self, kind: ItemKind, id: i64, counts: Tally) -> Result<Item> {
        let item = self.load(kind, id).await?;

        if !item.is_on_ledger() {
            return Err(SealError::validation(format!(
                "{} {} has no ledger id yet",
                capitalize(kind.as_str()),
                id
            )));
        }

        if item.phase_at(self.clock.now()) == Phase::Commit && !counts.is_empty() {
            return Err(SealError::validation(
                "Tally cannot change before the commit deadline",
            ));
        }

        let store = ItemStore::new(&self.storage);
        store.merge_tally(id, &counts).await?;

        tracing::debug!("Synced tally for {} {}", kind, id);
        self.load(kind, id).await
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    async fn registry() -> (SqliteRegistry, Arc<ManualClock>) {
        let storage = Arc::new(Storage::open_in_memory().await.unwrap());
        let clock = Arc::new(ManualClock::new(t0()));
        (SqliteRegistry::new(storage, clock.clone()), clock)
    }

    fn poll(commit_minutes: i64, reveal_minutes: i64) -> NewItem {
        NewItem {
            kind: ItemKind::Poll,
            title: "Ship it?".to_string(),
            description: "Release vote".to_string(),
            creator_address: "0x0abc".to_string(),
            commit_deadline: t0() + Duration::minutes(commit_minutes),
            reveal_deadline: t0() + Duration::minutes(reveal_minutes),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_bad_schedule() {
        let (registry, _) = registry().await;

        let err = registry.create(poll(60, 60)).await.unwrap_err();
        assert!(matches!(err, SealError::InvalidSchedule { .. }));
        assert!(registry.list(ItemKind::Poll).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_respects_kind() {
        let (registry, _) = registry().await;
        let item = registry.create(poll(60, 120)).await.unwrap();

        assert_eq!(registry.get(ItemKind::Poll, item.id).await.unwrap().title, "Ship it?");
        assert!(matches!(
            registry.get(ItemKind::Auction, item.id).await,
            Err(SealError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_ledger_id_is_idempotent() {
        let (registry, _) = registry().await;
        let item = registry.create(poll(60, 120)).await.unwrap();
        assert_eq!(item.status, ItemStatus::Pending);

        let attached = registry
            .attach_ledger_id(ItemKind::Poll, item.id, 42, "0xtx")
            .await
            .unwrap();
        assert_eq!(attached.contract_item_id, Some(42));
        assert_eq!(attached.status, ItemStatus::Active);

        let again = registry
            .attach_ledger_id(ItemKind::Poll, item.id, 42, "0xtx")
            .await
            .unwrap();
        assert_eq!(again.contract_item_id, Some(42));

        let conflict = registry
            .attach_ledger_id(ItemKind::Poll, item.id, 43, "0xother")
            .await
            .unwrap_err();
        assert!(matches!(
            conflict,
            SealError::LedgerIdConflict { contract_item_id: 42, .. }
        ));
    }

    #[tokio::test]
    async fn test_status_completes_after_reveal_deadline() {
        let (registry, clock) = registry().await;
        let item = registry.create(poll(60, 120)).await.unwrap();
        registry
            .attach_ledger_id(ItemKind::Poll, item.id, 1, "0xtx")
            .await
            .unwrap();

        clock.advance(Duration::minutes(121));
        let item = registry.get(ItemKind::Poll, item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn test_sync_tally_rules() {
        let (registry, clock) = registry().await;
        let item = registry.create(poll(60, 120)).await.unwrap();
        let counts: Tally = [(0, 1), (1, 2)].into_iter().collect();

        // not on the ledger yet
        assert!(matches!(
            registry.sync_tally(ItemKind::Poll, item.id, counts.clone()).await,
            Err(SealError::Validation(_))
        ));

        registry
            .attach_ledger_id(ItemKind::Poll, item.id, 1, "0xtx")
            .await
            .unwrap();

        // still in the commit phase
        assert!(matches!(
            registry.sync_tally(ItemKind::Poll, item.id, counts.clone()).await,
            Err(SealError::Validation(_))
        ));

        clock.advance(Duration::minutes(90));
        let synced = registry
            .sync_tally(ItemKind::Poll, item.id, counts.clone())
            .await
            .unwrap();
        assert_eq!(synced.tally, counts);

        let stale: Tally = [(1, 1)].into_iter().collect();
        let resynced = registry.sync_tally(ItemKind::Poll, item.id, stale).await.unwrap();
        assert_eq!(resynced.tally, counts);
    }
}
