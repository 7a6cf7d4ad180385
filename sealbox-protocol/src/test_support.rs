use crate::commitment::Sha256Commitment;
use crate::ledger::{Ledger, LocalLedger};
use crate::participant::Participant;
use crate::publish::publish_item;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sealbox_core::{
    FileSecretStore, Item, ItemKind, ManualClock, NewItem, SqliteRegistry, Storage,
};
use std::sync::Arc;
use tempfile::TempDir;

/// 2025-03-01 12:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<LocalLedger>,
    pub registry: Arc<SqliteRegistry>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let storage = Arc::new(Storage::open_in_memory().await.unwrap());
        let clock = Arc::new(ManualClock::new(t0()));
        let ledger = Arc::new(LocalLedger::new(
            storage.clone(),
            clock.clone(),
            Arc::new(Sha256Commitment),
        ));
        let registry = Arc::new(SqliteRegistry::new(storage, clock.clone()));

        Self {
            clock,
            ledger,
            registry,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Publishes an item whose deadlines are offsets from `t0`.
    pub async fn publish(&self, kind: ItemKind, commit_in: Duration, reveal_in: Duration) -> Item {
        let new_item = NewItem {
            kind,
            title: "Lunch spot".to_string(),
            description: String::new(),
            creator_address: "0xcreator".to_string(),
            commit_deadline: t0() + commit_in,
            reveal_deadline: t0() + reveal_in,
        };
        publish_item(&*self.registry, &*self.ledger, new_item)
            .await
            .unwrap()
    }

    pub fn participant(&self, address: &str) -> Participant {
        self.participant_on(address, self.ledger.clone())
    }

    pub fn participant_on(&self, address: &str, ledger: Arc<dyn Ledger>) -> Participant {
        let secrets = FileSecretStore::for_participant(self.dir.path(), address, None);
        Participant::new(
            address,
            ledger,
            Arc::new(secrets),
            self.clock.clone(),
            Arc::new(Sha256Commitment),
        )
    }

    pub fn at(&self, offset: Duration) {
        self.clock.set(t0() + offset);
    }
}
