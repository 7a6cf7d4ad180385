//! sealbox core - data model, phase clock, storage and item registry for
//! commit-reveal polls and sealed-bid auctions.
//!
//! The commit-reveal workflow itself lives in `sealbox-protocol`; this crate
//! holds everything it persists or reads.

pub mod config;
pub mod error;
pub mod phase;
pub mod registry;
pub mod secrets;
pub mod storage;
pub mod types;

pub use config::ClientConfig;
pub use error::{Result, SealError};
pub use phase::{Clock, ManualClock, Phase, SystemClock};
pub use registry::{HttpRegistry, ItemRegistry, SqliteRegistry};
pub use secrets::{FileSecretStore, SecretStore};
pub use storage::Storage;
pub use types::{
    CommitmentRecord, CommitmentValue, Item, ItemKind, ItemStatus, NewItem, RecordStatus, Salt,
    Tally,
};
