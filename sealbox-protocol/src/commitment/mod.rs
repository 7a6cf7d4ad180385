pub mod scheme;

pub use scheme::{CommitmentScheme, Sha256Commitment};

use rand::{rngs::OsRng, RngCore};
use sealbox_core::{CommitmentValue, ItemKind, Salt};

const SALT_BYTES: usize = 32;

/// Fresh salt from the operating system's CSPRNG. Small secret spaces (yes/no
/// votes) are only hidden as long as the salt is unguessable.
pub fn generate_salt() -> Salt {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Salt::from_random_bytes(&bytes)
}

/// Commitment under the default scheme.
pub fn commit(kind: ItemKind, secret: u64, salt: &Salt) -> CommitmentValue {
    Sha256Commitment.commit(kind, secret, salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_commit_is_deterministic() {
        let salt = Salt::parse("abc").unwrap();
        let first = commit(ItemKind::Poll, 5, &salt);
        let second = commit(ItemKind::Poll, 5, &salt);

        assert_eq!(first, second);
        assert!(first.as_str().starts_with("0x"));
        assert_eq!(first.as_str().len(), 66);
    }

    #[test]
    fn test_distinct_secrets_do_not_collide() {
        let salt = generate_salt();
        let commitments: HashSet<_> = (0..2_000u64)
            .map(|secret| commit(ItemKind::Auction, secret, &salt))
            .collect();
        assert_eq!(commitments.len(), 2_000);
    }

    #[test]
    fn test_distinct_salts_do_not_collide() {
        let commitments: HashSet<_> = (0..500)
            .map(|_| commit(ItemKind::Poll, 1, &generate_salt()))
            .collect();
        assert_eq!(commitments.len(), 500);
    }

    #[test]
    fn test_kinds_are_domain_separated() {
        let salt = Salt::parse("abc").unwrap();
        assert_ne!(
            commit(ItemKind::Poll, 1, &salt),
            commit(ItemKind::Auction, 1, &salt)
        );
    }

    #[test]
    fn test_salt_boundary_is_unambiguous() {
        // same concatenated bytes, different split between secret and salt
        let a = commit(ItemKind::Poll, 1, &Salt::parse("23").unwrap());
        let b = commit(ItemKind::Poll, 12, &Salt::parse("3").unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify() {
        let salt = generate_salt();
        let commitment = commit(ItemKind::Poll, 1, &salt);

        assert!(Sha256Commitment.verify(&commitment, ItemKind::Poll, 1, &salt));
        assert!(!Sha256Commitment.verify(&commitment, ItemKind::Poll, 0, &salt));
        assert!(!Sha256Commitment.verify(&commitment, ItemKind::Poll, 1, &generate_salt()));
    }

    #[test]
    fn test_generated_salts_are_unique() {
        let salts: HashSet<String> = (0..100).map(|_| generate_salt().as_str().to_string()).collect();
        assert_eq!(salts.len(), 100);
    }
}
