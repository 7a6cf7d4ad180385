mod items;
mod participant;

pub use items::{create_item, list_items, show_item, show_tally};
pub use participant::{commit, list_secrets, reveal};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sealbox_core::{
    ClientConfig, Clock, FileSecretStore, HttpRegistry, ItemKind, ItemRegistry, SqliteRegistry,
    Storage, SystemClock,
};
use sealbox_protocol::{
    CommitmentScheme, Ledger, LocalLedger, Participant, ProtocolError, SecretStatus,
    Sha256Commitment, TallyAggregator,
};
use std::sync::Arc;

/// Everything a command needs, wired from the client configuration.
pub struct App {
    config: ClientConfig,
    passphrase: Option<String>,
    registry: Arc<dyn ItemRegistry>,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    scheme: Arc<dyn CommitmentScheme>,
}

impl App {
    pub async fn open(config: ClientConfig, passphrase: Option<String>) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let scheme: Arc<dyn CommitmentScheme> = Arc::new(Sha256Commitment);
        let storage = Arc::new(Storage::new(&config.database_path()).await?);

        let registry: Arc<dyn ItemRegistry> = match &config.registry_url {
            Some(url) => {
                tracing::debug!("Using registry at {}", url);
                Arc::new(HttpRegistry::new(url.clone(), config.request_timeout)?)
            }
            None => Arc::new(SqliteRegistry::new(storage.clone(), clock.clone())),
        };
        let ledger: Arc<dyn Ledger> =
            Arc::new(LocalLedger::new(storage, clock.clone(), scheme.clone()));

        Ok(Self {
            config,
            passphrase,
            registry,
            ledger,
            clock,
            scheme,
        })
    }

    fn participant(&self, address: &str) -> Participant {
        let secrets =
            FileSecretStore::for_participant(&self.config.data_dir, address, self.passphrase.clone());
        Participant::new(
            address,
            self.ledger.clone(),
            Arc::new(secrets),
            self.clock.clone(),
            self.scheme.clone(),
        )
    }

    fn tallies(&self) -> TallyAggregator {
        TallyAggregator::new(self.ledger.clone(), self.registry.clone(), self.clock.clone())
    }
}

/// Parses a vote or bid. Polls also take `yes` (1) and `no` (0).
pub fn parse_secret(kind: ItemKind, raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if kind == ItemKind::Poll {
        match raw.to_ascii_lowercase().as_str() {
            "yes" => return Ok(1),
            "no" => return Ok(0),
            _ => {}
        }
    }

    match raw.parse::<u64>() {
        Ok(value) => Ok(value),
        Err(_) => bail!("'{}' is not a valid {} value", raw, kind),
    }
}

pub fn option_label(kind: ItemKind, option: u64) -> String {
    match (kind, option) {
        (ItemKind::Poll, 0) => "no (0)".to_string(),
        (ItemKind::Poll, 1) => "yes (1)".to_string(),
        (ItemKind::Poll, other) => other.to_string(),
        (ItemKind::Auction, amount) => format!("{} (bid)", amount),
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Tells the user what a failed commit or reveal means for their secret.
pub fn explain(err: &ProtocolError) {
    let hint = match err.secret_status() {
        SecretStatus::NotCreated => "Nothing was committed; you can try again.",
        SecretStatus::Intact => "Your saved secret is intact; retrying later is safe.",
        SecretStatus::Lost => "There is no usable secret for this item on this device.",
        SecretStatus::Unknown => "The state of your local secret could not be determined.",
    };
    eprintln!("{}", hint);

    if let Some((secret, salt)) = err.recovery() {
        eprintln!();
        eprintln!("Your commitment is on the ledger but was not saved locally.");
        eprintln!("Write these down, you need them to reveal:");
        eprintln!("  value: {}", secret);
        eprintln!("  salt:  {}", salt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secret() {
        assert_eq!(parse_secret(ItemKind::Poll, "yes").unwrap(), 1);
        assert_eq!(parse_secret(ItemKind::Poll, "No").unwrap(), 0);
        assert_eq!(parse_secret(ItemKind::Poll, "3").unwrap(), 3);
        assert_eq!(parse_secret(ItemKind::Auction, " 2500 ").unwrap(), 2500);

        assert!(parse_secret(ItemKind::Auction, "yes").is_err());
        assert!(parse_secret(ItemKind::Auction, "-5").is_err());
        assert!(parse_secret(ItemKind::Auction, "12.5").is_err());
    }

    #[test]
    fn test_option_label() {
        assert_eq!(option_label(ItemKind::Poll, 1), "yes (1)");
        assert_eq!(option_label(ItemKind::Auction, 40), "40 (bid)");
    }
}
