use super::{format_time, option_label, parse_secret, App};
use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};
use sealbox_core::{ItemKind, Salt};
use sealbox_protocol::generate_salt;

pub async fn commit(
    app: &App,
    kind: ItemKind,
    id: i64,
    value: &str,
    address: &str,
    salt: Option<String>,
) -> Result<()> {
    let secret = parse_secret(kind, value)?;
    let salt = match salt {
        Some(raw) => Salt::parse(raw)?,
        None => generate_salt(),
    };

    let item = app.registry.get(kind, id).await?;
    let receipt = app.participant(address).submit_commit(&item, secret, salt).await?;

    println!("Committed to {} {}", item.kind, item.id);
    println!("Commitment: {}", receipt.commitment);
    println!("Transaction: {}", receipt.transaction_hash);
    println!();
    println!("Your secret is stored on this device. Reveal after");
    println!("{} with:", format_time(item.commit_deadline));
    println!("sealbox reveal {} {} --as {}", kind.path_segment(), item.id, address);

    Ok(())
}

pub async fn reveal(app: &App, kind: ItemKind, id: i64, address: &str) -> Result<()> {
    let item = app.registry.get(kind, id).await?;
    let receipt = app.participant(address).submit_reveal(&item).await?;

    if receipt.already_revealed {
        println!("Already revealed {} {}", item.kind, item.id);
    } else {
        println!("Revealed {} {}", item.kind, item.id);
    }
    println!("Value: {}", option_label(kind, receipt.option));
    println!("Transaction: {}", receipt.transaction_hash);

    // The reveal is on the ledger already; a failed cache sync only delays the registry.
    if let Err(e) = app.tallies().record_reveal(&item).await {
        tracing::warn!("Could not sync tally for {} {}: {}", item.kind, item.id, e);
    }

    Ok(())
}

pub async fn list_secrets(app: &App, address: &str, show_salts: bool) -> Result<()> {
    let records = app.participant(address).records().await?;
    if records.is_empty() {
        println!("No commitments stored for {}", address);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let mut header = vec!["Item", "Value", "Status", "Committed At", "Commit Tx", "Reveal Tx"];
    if show_salts {
        header.push("Salt");
    }
    table.set_header(header);

    for record in &records {
        let mut row = vec![
            record.item_id.to_string(),
            record.secret_value.to_string(),
            record.status.to_string(),
            format_time(record.committed_at),
            record.transaction_hash.clone(),
            record
                .reveal_transaction_hash
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ];
        if show_salts {
            row.push(record.salt.as_str().to_string());
        }
        table.add_row(row);
    }

    println!("{}", table);
    Ok(())
}
