//! The `SHA256` digest used by the point mapper and the structural node key.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use derive_more::{AsRef, From};
use serde::{Deserialize, Serialize};
use sodiumoxide::crypto::hash::sha256;

use super::ByteObject;

#[derive(
    AsRef, From, Serialize, Deserialize, Hash, Eq, Ord, PartialEq, Copy, Clone, PartialOrd, Debug,
)]
/// A digest of the `SHA256` hash function.
pub struct Sha256(sha256::Digest);

impl ByteObject for Sha256 {
    const LENGTH: usize = sha256::DIGESTBYTES;

    fn zeroed() -> Self {
        Self(sha256::Digest([0_u8; sha256::DIGESTBYTES]))
    }

    fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        sha256::Digest::from_slice(bytes).map(Self)
    }
}

impl Sha256 {
    /// Computes the digest of the message `m`.
    pub fn hash(m: &[u8]) -> Self {
        Self(sha256::hash(m))
    }

    /// Computes the digest of the concatenation of all `parts`.
    pub fn hash_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut state = sha256::State::new();
        for part in parts {
            state.update(part);
        }
        Self(state.finalize())
    }

    /// Gets the lowercase hex encoding of this digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Sha256::hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        );
    }

    #[test]
    fn test_hash_parts_is_concatenation() {
        let digest = Sha256::hash(b"depth0");
        let parts = Sha256::hash_parts(vec![digest.as_slice(), &b"7"[..]]);
        let mut joined = digest.as_slice().to_vec();
        joined.extend_from_slice(b"7");
        assert_eq!(parts, Sha256::hash(&joined));
    }
}
