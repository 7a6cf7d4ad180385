use crate::error::{ProtocolError, Result, SecretStatus};
use crate::ledger::Ledger;
use sealbox_core::{Clock, Item, ItemKind, ItemRegistry, Phase, Tally};
use serde::Serialize;
use std::sync::Arc;

/// Per-option counts of an item together with how final they are.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyView {
    pub item_id: i64,
    pub kind: ItemKind,
    pub counts: Tally,
    pub phase: Phase,
    /// True until the reveal deadline has passed.
    pub provisional: bool,
    pub total: u64,
}

impl TallyView {
    pub fn new(item: &Item, counts: Tally, phase: Phase) -> Self {
        Self {
            item_id: item.id,
            kind: item.kind,
            total: counts.total(),
            counts,
            phase,
            provisional: phase != Phase::Ended,
        }
    }

    /// Option with the most reveals; ties go to the lowest option.
    pub fn winning_option(&self) -> Option<u64> {
        let mut best: Option<(u64, u64)> = None;
        for (option, count) in self.counts.iter() {
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((option, count)),
            }
        }
        best.map(|(option, _)| option)
    }

    /// Largest revealed bid. Only meaningful for auctions.
    pub fn highest_bid(&self) -> Option<u64> {
        if self.kind != ItemKind::Auction {
            return None;
        }
        self.counts
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(amount, _)| amount)
            .max()
    }
}

/// Keeps the registry's cached tally in line with the ledger.
pub struct TallyAggregator {
    ledger: Arc<dyn Ledger>,
    registry: Arc<dyn ItemRegistry>,
    clock: Arc<dyn Clock>,
}

impl TallyAggregator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        registry: Arc<dyn ItemRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            registry,
            clock,
        }
    }

    async fn ledger_counts(&self, item: &Item) -> Result<Tally> {
        let contract_item_id = item
            .contract_item_id
            .ok_or(ProtocolError::NotOnLedger(item.id))?;

        self.ledger
            .read_tally(contract_item_id)
            .await
            .map_err(|e| ProtocolError::LedgerRejected {
                reason: e.to_string(),
                secret: SecretStatus::Intact,
            })
    }

    /// Pushes the ledger's authoritative counts for `item` to the registry.
    pub async fn record_reveal(&self, item: &Item) -> Result<Item> {
        let counts = self.ledger_counts(item).await?;
        let updated = self.registry.sync_tally(item.kind, item.id, counts).await?;

        tracing::debug!(
            "Synced tally for {} {}: {} reveals",
            item.kind,
            item.id,
            updated.tally.total()
        );
        Ok(updated)
    }

    /// Current counts from the ledger, or the registry cache for items that
    /// never reached the ledger.
    pub async fn get_tally(&self, item: &Item) -> Result<TallyView> {
        let counts = if item.is_on_ledger() {
            self.ledger_counts(item).await?
        } else {
            item.tally.clone()
        };

        Ok(TallyView::new(item, counts, item.phase_at(self.clock.now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::generate_salt;
    use crate::test_support::Harness;
    use chrono::Duration;
    use sealbox_core::ItemStatus;

    fn aggregator(harness: &Harness) -> TallyAggregator {
        TallyAggregator::new(
            harness.ledger.clone(),
            harness.registry.clone(),
            harness.clock.clone(),
        )
    }

    #[tokio::test]
    async fn test_poll_round_with_two_voters() {
        let harness = Harness::new().await;
        let tallies = aggregator(&harness);
        let item = harness
            .publish(ItemKind::Poll, Duration::hours(1), Duration::hours(2))
            .await;
        let alice = harness.participant("0xalice");
        let bob = harness.participant("0xbob");

        harness.at(Duration::minutes(30));
        alice.submit_commit(&item, 1, generate_salt()).await.unwrap();
        bob.submit_commit(&item, 0, generate_salt()).await.unwrap();

        let during_commit = tallies.get_tally(&item).await.unwrap();
        assert!(during_commit.provisional);
        assert_eq!(during_commit.total, 0);

        harness.at(Duration::minutes(90));
        alice.submit_reveal(&item).await.unwrap();
        let synced = tallies.record_reveal(&item).await.unwrap();
        assert_eq!(synced.tally.count(1), 1);

        bob.submit_reveal(&item).await.unwrap();
        tallies.record_reveal(&item).await.unwrap();

        let during_reveal = tallies.get_tally(&item).await.unwrap();
        assert!(during_reveal.provisional);
        assert_eq!(during_reveal.phase, Phase::Reveal);

        harness.at(Duration::minutes(150));
        let final_view = tallies.get_tally(&item).await.unwrap();
        assert!(!final_view.provisional);
        assert_eq!(final_view.counts.count(0), 1);
        assert_eq!(final_view.counts.count(1), 1);
        assert_eq!(final_view.total, 2);
        assert_eq!(final_view.winning_option(), Some(0));

        let cached = harness.registry.get(ItemKind::Poll, item.id).await.unwrap();
        assert_eq!(cached.status, ItemStatus::Completed);
        assert_eq!(cached.tally, final_view.counts);
    }

    #[tokio::test]
    async fn test_unrevealed_commitments_do_not_count() {
        let harness = Harness::new().await;
        let tallies = aggregator(&harness);
        let item = harness
            .publish(ItemKind::Auction, Duration::hours(1), Duration::hours(2))
            .await;
        let alice = harness.participant("0xalice");
        let bob = harness.participant("0xbob");

        alice.submit_commit(&item, 150, generate_salt()).await.unwrap();
        bob.submit_commit(&item, 900, generate_salt()).await.unwrap();

        harness.at(Duration::minutes(90));
        alice.submit_reveal(&item).await.unwrap();

        harness.at(Duration::hours(3));
        let view = tallies.get_tally(&item).await.unwrap();
        assert_eq!(view.total, 1);
        assert_eq!(view.highest_bid(), Some(150));
    }

    #[tokio::test]
    async fn test_record_reveal_requires_ledger_id() {
        let harness = Harness::new().await;
        let mut item = harness
            .publish(ItemKind::Poll, Duration::hours(1), Duration::hours(2))
            .await;
        item.contract_item_id = None;

        let err = aggregator(&harness).record_reveal(&item).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotOnLedger(_)));
    }

    #[test]
    fn test_winner_ties_go_to_lowest_option() {
        let item = Item {
            id: 1,
            kind: ItemKind::Poll,
            title: "t".to_string(),
            description: String::new(),
            creator_address: "0xcreator".to_string(),
            commit_deadline: crate::test_support::t0(),
            reveal_deadline: crate::test_support::t0() + Duration::hours(1),
            contract_item_id: Some(1),
            transaction_hash: None,
            status: ItemStatus::Completed,
            tally: Tally::new(),
            created_at: crate::test_support::t0(),
        };
        let counts: Tally = [(0, 0), (2, 3), (5, 3)].into_iter().collect();
        let view = TallyView::new(&item, counts, Phase::Ended);

        assert_eq!(view.winning_option(), Some(2));
        assert_eq!(view.highest_bid(), None);
        let empty = TallyView::new(&item, Tally::new(), Phase::Ended);
        assert_eq!(empty.winning_option(), None);
    }
}
