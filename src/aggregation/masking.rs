//! Additive noise masking of ciphertexts.
//!
//! The holder of a ciphertext under a peer's key adds a uniformly random integer of the peer's
//! plaintext space before handing the ciphertext over for decryption and re-randomizes it so the
//! peer cannot link it to ciphertexts seen earlier. The peer then only learns
//! `value + noise (mod n)`, which is uniformly distributed. The holder recovers `value` by
//! subtracting its noise.

use std::collections::BTreeMap;

use num::bigint::{BigInt, BigUint};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use super::{fixed_point::from_plaintext, AggregationError};
use crate::crypto::{
    generate_integer,
    ByteObject,
    HomomorphicDecryptKey,
    HomomorphicEncryptKey,
    MaskSeed,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Masked ciphertexts keyed by feature index, sent to the key owner for decryption.
pub struct MaskedValues(pub BTreeMap<usize, BigUint>);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Decrypted masked plaintexts keyed by feature index, returned by the key owner.
pub struct DecryptedValues(pub BTreeMap<usize, BigUint>);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// The noise added to each masked value. Never leaves the party that created it.
pub struct Noise(BTreeMap<usize, BigUint>);

impl Noise {
    /// Gets the noise of the value at `index`.
    pub fn get(&self, index: usize) -> Option<&BigUint> {
        self.0.get(&index)
    }

    /// Gets the number of masked values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether nothing was masked.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A masker of ciphertexts under a peer's public key.
pub struct Masker<'k, K> {
    key: &'k K,
    prng: ChaCha20Rng,
}

impl<'k, K: HomomorphicEncryptKey> Masker<'k, K> {
    /// Creates a masker drawing its noise from a freshly seeded PRNG.
    pub fn new(key: &'k K) -> Self {
        Self::with_seed(key, &MaskSeed::generate())
    }

    /// Creates a masker drawing its noise from the PRNG seeded by `seed`.
    pub fn with_seed(key: &'k K, seed: &MaskSeed) -> Self {
        Self {
            key,
            prng: seed.prng(),
        }
    }

    /// Masks ciphertexts keyed by index.
    pub fn mask(self, ciphertexts: BTreeMap<usize, BigUint>) -> (MaskedValues, Noise) {
        let Self { key, mut prng } = self;
        let mut noise = BTreeMap::new();
        let masked = ciphertexts
            .into_iter()
            .map(|(index, ciphertext)| {
                let r = generate_integer(&mut prng, key.modulus());
                let masked = key.rerandomize(&key.add_plain(&ciphertext, &r));
                noise.insert(index, r);
                (index, masked)
            })
            .collect();
        (MaskedValues(masked), Noise(noise))
    }
}

/// Decrypts masked ciphertexts on behalf of the party that masked them.
///
/// # Errors
/// Fails if a ciphertext is out of the ciphertext space of the key.
pub fn decrypt_masked<K: HomomorphicDecryptKey>(
    key: &K,
    masked: &MaskedValues,
) -> Result<DecryptedValues, AggregationError> {
    masked
        .0
        .iter()
        .map(|(index, ciphertext)| Ok((*index, key.decrypt(ciphertext)?)))
        .collect::<Result<_, AggregationError>>()
        .map(DecryptedValues)
}

/// Removes the noise from decrypted masked values and reads them as signed integers.
///
/// # Errors
/// Fails if the decrypted values and the noise do not cover the same indices.
pub fn unmask(
    decrypted: &DecryptedValues,
    noise: &Noise,
    modulus: &BigUint,
) -> Result<BTreeMap<usize, BigInt>, AggregationError> {
    if decrypted.0.len() != noise.len() {
        return Err(AggregationError::ShapeMismatch {
            expected: noise.len(),
            actual: decrypted.0.len(),
        });
    }
    decrypted
        .0
        .iter()
        .map(|(index, value)| {
            let r = noise.get(*index).ok_or(AggregationError::MissingValue(*index))?;
            // value - r (mod n) without leaving the unsigned domain
            let unmasked = (value % modulus + modulus - r % modulus) % modulus;
            Ok((*index, from_plaintext(&unmasked, modulus)))
        })
        .collect()
}
