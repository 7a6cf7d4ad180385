use sealbox_core::{CommitmentValue, ItemKind, Salt};
use sha2::{Digest, Sha256};

/// Binds a numeric secret (option index or bid amount) to a salt.
///
/// Implementations must be deterministic and must match whatever the ledger
/// uses to check reveals.
pub trait CommitmentScheme: Send + Sync {
    fn commit(&self, kind: ItemKind, secret: u64, salt: &Salt) -> CommitmentValue;

    fn verify(
        &self,
        commitment: &CommitmentValue,
        kind: ItemKind,
        secret: u64,
        salt: &Salt,
    ) -> bool {
        self.commit(kind, secret, salt) == *commitment
    }
}

/// SHA-256 over a per-kind domain tag, the secret and the salt.
///
/// Stand-in for a ledger-native algebraic hash; swap it out together with the
/// ledger's reveal check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Commitment;

impl Sha256Commitment {
    fn domain_tag(kind: ItemKind) -> &'static [u8] {
        match kind {
            ItemKind::Poll => b"sealbox/poll/v1",
            ItemKind::Auction => b"sealbox/auction/v1",
        }
    }
}

impl CommitmentScheme for Sha256Commitment {
    fn commit(&self, kind: ItemKind, secret: u64, salt: &Salt) -> CommitmentValue {
        let salt_bytes = salt.as_bytes();

        let mut hasher = Sha256::new();
        hasher.update(Self::domain_tag(kind));
        hasher.update([0u8]);
        hasher.update(secret.to_be_bytes());
        hasher.update((salt_bytes.len() as u32).to_be_bytes());
        hasher.update(salt_bytes);

        let digest: [u8; 32] = hasher.finalize().into();
        CommitmentValue::from_digest(&digest)
    }
}
