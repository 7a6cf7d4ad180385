//! Commit-reveal protocol for polls and sealed-bid auctions.
//!
//! Participants commit to a hidden numeric secret (an option index or a bid
//! amount) while the commit window is open, reveal it during the reveal
//! window, and the ledger's counts become final once the reveal deadline has
//! passed.

pub mod commitment;
pub mod error;
pub mod ledger;
pub mod participant;
pub mod publish;
pub mod tally;

#[cfg(test)]
mod test_support;

pub use commitment::{commit, generate_salt, CommitmentScheme, Sha256Commitment};
pub use error::{ProtocolError, Result, SecretStatus};
pub use ledger::{Ledger, LedgerError, LocalLedger, TxRef, Verification};
pub use participant::{CommitReceipt, Participant, ParticipantState, RevealReceipt};
pub use publish::publish_item;
pub use tally::{TallyAggregator, TallyView};
