use crate::error::{Result, SealError};
use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What is being decided: a poll (secret = option index) or a sealed-bid
/// auction (secret = bid amount).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Poll,
    Auction,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Poll => "poll",
            ItemKind::Auction => "auction",
        }
    }

    /// Collection name used in HTTP paths (`/api/polls`, `/api/auctions`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            ItemKind::Poll => "polls",
            ItemKind::Auction => "auctions",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "poll" | "polls" => Ok(ItemKind::Poll),
            "auction" | "auctions" => Ok(ItemKind::Auction),
            other => Err(SealError::validation(format!("Unknown item kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Active,
    Completed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Active => "active",
            ItemStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "active" => Ok(ItemStatus::Active),
            "completed" => Ok(ItemStatus::Completed),
            other => Err(SealError::internal(format!("Unknown item status: {}", other))),
        }
    }
}

/// Per-option counts. Keys are option indices for polls and bid amounts for
/// auctions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tally(BTreeMap<u64, u64>);

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, option: u64) -> u64 {
        self.0.get(&option).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, option: u64) {
        *self.0.entry(option).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|c| *c == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().map(|(option, count)| (*option, *count))
    }

    /// Merge `other` taking the per-option maximum. Returns true if any count grew.
    pub fn merge_max(&mut self, other: &Tally) -> bool {
        let mut changed = false;
        for (option, count) in other.iter() {
            let entry = self.0.entry(option).or_insert(0);
            if count > *entry {
                *entry = count;
                changed = true;
            }
        }
        changed
    }
}

impl FromIterator<(u64, u64)> for Tally {
    fn from_iter<I: IntoIterator<Item = (u64, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub kind: ItemKind,
    pub title: String,
    pub description: String,
    pub creator_address: String,
    pub commit_deadline: DateTime<Utc>,
    pub reveal_deadline: DateTime<Utc>,
    pub contract_item_id: Option<u64>,
    pub transaction_hash: Option<String>,
    pub status: ItemStatus,
    pub tally: Tally,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        Phase::classify(now, self.commit_deadline, self.reveal_deadline)
    }

    pub fn is_on_ledger(&self) -> bool {
        self.contract_item_id.is_some()
    }
}

/// Fields supplied by a creator; everything else is assigned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub kind: ItemKind,
    pub title: String,
    pub description: String,
    pub creator_address: String,
    pub commit_deadline: DateTime<Utc>,
    pub reveal_deadline: DateTime<Utc>,
}

impl NewItem {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(SealError::validation("Title cannot be empty"));
        }

        if self.creator_address.trim().is_empty() {
            return Err(SealError::validation("Creator address cannot be empty"));
        }

        if self.commit_deadline >= self.reveal_deadline {
            return Err(SealError::InvalidSchedule {
                commit_deadline: self.commit_deadline,
                reveal_deadline: self.reveal_deadline,
            });
        }

        Ok(())
    }
}

/// Random value mixed into a secret before hashing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Salt(String);

impl Salt {
    const MAX_LEN: usize = 256;

    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SealError::validation("Salt cannot be empty"));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(SealError::validation(format!(
                "Salt longer than {} bytes",
                Self::MAX_LEN
            )));
        }
        Ok(Self(raw))
    }

    pub fn from_random_bytes(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// Salts are secret until reveal; keep them out of logs.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(<redacted>)")
    }
}

/// Output of the commitment function: `0x` followed by 64 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitmentValue(String);

impl CommitmentValue {
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(digest)))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let hex_part = raw
            .strip_prefix("0x")
            .ok_or_else(|| SealError::validation("Commitment must start with 0x"))?;
        if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SealError::validation("Commitment must be 32 bytes of hex"));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitmentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Committed,
    Revealed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Committed => f.write_str("committed"),
            RecordStatus::Revealed => f.write_str("revealed"),
        }
    }
}

/// A participant's locally held secret for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentRecord {
    pub item_id: i64,
    pub secret_value: u64,
    pub salt: Salt,
    pub commitment: CommitmentValue,
    pub transaction_hash: String,
    #[serde(default)]
    pub reveal_transaction_hash: Option<String>,
    pub status: RecordStatus,
    pub committed_at: DateTime<Utc>,
}

impl CommitmentRecord {
    pub fn is_revealed(&self) -> bool {
        self.status == RecordStatus::Revealed
    }
}
