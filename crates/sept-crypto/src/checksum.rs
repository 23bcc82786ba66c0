//! SHA-256 content checksum over the exact plaintext bytes

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Lowercase hex SHA-256 of `data` (64 characters).
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compare `data` against an expected checksum in constant time.
///
/// The comparison is exact: checksums are always written lowercase, so any
/// other spelling is treated as a mismatch.
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    let actual = checksum(data);
    actual.len() == expected.len() && bool::from(actual.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_rejects_other_spellings() {
        let sum = checksum(b"hello");
        assert!(verify_checksum(b"hello", &sum));
        assert!(!verify_checksum(b"hello", &sum.to_uppercase()));
        assert!(!verify_checksum(b"hello", &sum[..63]));
        assert!(!verify_checksum(b"hello", ""));
    }

    proptest! {
        #[test]
        fn checksum_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..=2048)) {
            prop_assert_eq!(checksum(&data), checksum(&data));
            prop_assert!(verify_checksum(&data, &checksum(&data)));
        }

        #[test]
        fn single_byte_change_changes_checksum(
            data in proptest::collection::vec(any::<u8>(), 1..=1024),
            idx in any::<prop::sample::Index>(),
            delta in 1u8..=255,
        ) {
            let mut changed = data.clone();
            let i = idx.index(changed.len());
            changed[i] = changed[i].wrapping_add(delta);
            prop_assert_ne!(checksum(&data), checksum(&changed));
        }
    }
}
