use crate::error::{ProtocolError, Result, SecretStatus};
use crate::ledger::Ledger;
use sealbox_core::{Item, ItemRegistry, NewItem};

/// Creates an item in the registry, registers it on the ledger and attaches
/// the ledger-assigned id. The item stays `pending` if the ledger step fails.
pub async fn publish_item(
    registry: &dyn ItemRegistry,
    ledger: &dyn Ledger,
    new_item: NewItem,
) -> Result<Item> {
    new_item.validate()?;
    let item = registry.create(new_item).await?;

    let (contract_item_id, tx) = ledger
        .create_item(item.kind, item.commit_deadline, item.reveal_deadline)
        .await
        .map_err(|e| ProtocolError::LedgerRejected {
            reason: e.to_string(),
            secret: SecretStatus::NotCreated,
        })?;

    let item = registry
        .attach_ledger_id(item.kind, item.id, contract_item_id, tx.as_str())
        .await?;

    tracing::info!(
        "Published {} {} as ledger item {}",
        item.kind,
        item.id,
        contract_item_id
    );
    Ok(item)
}
