use super::{format_time, option_label, App};
use anyhow::{bail, Result};
use chrono::Duration;
use comfy_table::{presets::UTF8_FULL, Table};
use sealbox_core::{ItemKind, NewItem};
use sealbox_protocol::publish_item;

pub async fn create_item(
    app: &App,
    kind: ItemKind,
    title: String,
    description: String,
    creator: String,
    commit_minutes: i64,
    reveal_minutes: i64,
) -> Result<()> {
    if commit_minutes <= 0 || reveal_minutes <= 0 {
        bail!("Commit and reveal windows must be at least one minute long");
    }

    let now = app.clock.now();
    let commit_deadline = now + Duration::minutes(commit_minutes);
    let new_item = NewItem {
        kind,
        title,
        description,
        creator_address: creator,
        commit_deadline,
        reveal_deadline: commit_deadline + Duration::minutes(reveal_minutes),
    };

    let item = publish_item(&*app.registry, &*app.ledger, new_item).await?;

    println!("Created {} {}: {}", item.kind, item.id, item.title);
    if let (Some(contract_id), Some(tx)) = (item.contract_item_id, &item.transaction_hash) {
        println!("Ledger item: {} (tx {})", contract_id, tx);
    }
    println!("Commit until: {}", format_time(item.commit_deadline));
    println!("Reveal until: {}", format_time(item.reveal_deadline));
    println!();
    println!("Participants commit with:");
    println!("sealbox commit {} {} <value> --as <address>", item.kind.path_segment(), item.id);

    Ok(())
}

pub async fn list_items(app: &App, kind: ItemKind) -> Result<()> {
    let items = app.registry.list(kind).await?;
    if items.is_empty() {
        println!("No {} yet", kind.path_segment());
        return Ok(());
    }

    let now = app.clock.now();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "ID",
        "Title",
        "Status",
        "Phase",
        "Commit Until",
        "Reveal Until",
        "Reveals",
    ]);

    for item in &items {
        table.add_row(vec![
            item.id.to_string(),
            item.title.clone(),
            item.status.to_string(),
            item.phase_at(now).to_string(),
            format_time(item.commit_deadline),
            format_time(item.reveal_deadline),
            item.tally.total().to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn show_item(app: &App, kind: ItemKind, id: i64) -> Result<()> {
    let item = app.registry.get(kind, id).await?;
    let phase = item.phase_at(app.clock.now());

    println!("{} {}: {}", item.kind, item.id, item.title);
    if !item.description.is_empty() {
        println!("{}", item.description);
    }
    println!();
    println!("Creator: {}", item.creator_address);
    println!("Status: {}", item.status);
    println!("Phase: {}", phase);
    println!("Commit until: {}", format_time(item.commit_deadline));
    println!("Reveal until: {}", format_time(item.reveal_deadline));
    match (item.contract_item_id, &item.transaction_hash) {
        (Some(contract_id), Some(tx)) => println!("Ledger item: {} (tx {})", contract_id, tx),
        _ => println!("Ledger item: not confirmed"),
    }
    println!("Revealed so far: {}", item.tally.total());

    Ok(())
}

pub async fn show_tally(app: &App, kind: ItemKind, id: i64) -> Result<()> {
    let item = app.registry.get(kind, id).await?;
    let view = app.tallies().get_tally(&item).await?;

    if view.provisional {
        println!(
            "Provisional tally ({} phase): unrevealed commitments are not counted yet",
            view.phase
        );
    } else {
        println!("Final tally");
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Option", "Count"]);
    for (option, count) in view.counts.iter() {
        table.add_row(vec![option_label(view.kind, option), count.to_string()]);
    }
    println!("{}", table);
    println!("Total reveals: {}", view.total);

    if !view.provisional {
        match view.kind {
            ItemKind::Poll => {
                if let Some(option) = view.winning_option() {
                    println!("Winner: {}", option_label(view.kind, option));
                }
            }
            ItemKind::Auction => {
                if let Some(bid) = view.highest_bid() {
                    println!("Highest bid: {}", bid);
                }
            }
        }
    }

    Ok(())
}
