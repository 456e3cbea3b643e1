//! PRNG utilities for the crypto primitives.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use derive_more::{AsMut, AsRef};
use num::{
    bigint::BigUint,
    integer::Integer,
    traits::{One, Zero},
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::ByteObject;

/// Generates a secure pseudo-random integer.
///
/// Draws from a uniform distribution over the integers between zero (included) and
/// `max_int` (excluded). Employs the `ChaCha20` stream cipher as a PRNG.
pub fn generate_integer(prng: &mut ChaCha20Rng, max_int: &BigUint) -> BigUint {
    if max_int.is_zero() {
        return BigUint::zero();
    }
    let bits = max_int.bits();
    let mut bytes = vec![0_u8; max_int.to_bytes_le().len()];
    loop {
        prng.fill_bytes(&mut bytes);
        // truncate to the bit length of the bound, a candidate is accepted with probability > 1/2
        let candidate = BigUint::from_bytes_le(&bytes) % (BigUint::one() << bits);
        if &candidate < max_int {
            return candidate;
        }
    }
}

/// Generates a pseudo-random unit of the ring of integers modulo `modulus`.
///
/// The result lies in `[1, modulus)` and is coprime to `modulus`, as needed for the randomness of
/// Paillier encryptions. Returns zero for moduli below two.
pub fn generate_unit(prng: &mut ChaCha20Rng, modulus: &BigUint) -> BigUint {
    if modulus <= &BigUint::one() {
        return BigUint::zero();
    }
    loop {
        let candidate = generate_integer(prng, modulus);
        if !candidate.is_zero() && candidate.gcd(modulus).is_one() {
            return candidate;
        }
    }
}

#[derive(AsRef, AsMut, Clone, Debug, PartialEq, Eq)]
/// A seed for a `ChaCha20` PRNG.
///
/// Seeds are drawn from system entropy; a seeded PRNG produces the noise masks of a secure
/// aggregation round and the randomness of Paillier encryptions.
pub struct MaskSeed([u8; 32]);

impl ByteObject for MaskSeed {
    const LENGTH: usize = 32;

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() == Self::LENGTH {
            let mut seed = [0_u8; 32];
            seed.copy_from_slice(bytes);
            Some(Self(seed))
        } else {
            None
        }
    }

    fn zeroed() -> Self {
        Self([0_u8; Self::LENGTH])
    }

    fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl MaskSeed {
    /// Gets this seed as an array.
    pub fn as_array(&self) -> [u8; 32] {
        self.0
    }

    /// Creates a `ChaCha20` PRNG from this seed.
    pub fn prng(&self) -> ChaCha20Rng {
        ChaCha20Rng::from_seed(self.as_array())
    }

    /// Creates a `ChaCha20` PRNG from a freshly generated seed.
    pub fn fresh_prng() -> ChaCha20Rng {
        Self::generate().prng()
    }
}

#[cfg(test)]
mod tests {
    use num::traits::pow::Pow;

    use super::*;

    #[test]
    fn test_generate_integer_bounds() {
        let mut prng = MaskSeed::zeroed().prng();
        let max_int = BigUint::from(u128::max_value()).pow(2_usize);
        for _ in 0..64 {
            assert!(generate_integer(&mut prng, &max_int) < max_int);
        }
        let small = BigUint::from(5_u8);
        let drawn: Vec<BigUint> = (0..200).map(|_| generate_integer(&mut prng, &small)).collect();
        assert!(drawn.iter().all(|value| value < &small));
        for value in 0_u8..5 {
            assert!(drawn.contains(&BigUint::from(value)));
        }
    }

    #[test]
    fn test_generate_integer_is_deterministic() {
        let max_int = BigUint::from(1_000_003_u32);
        let first: Vec<BigUint> = {
            let mut prng = MaskSeed::fill_seed(7).prng();
            (0..8).map(|_| generate_integer(&mut prng, &max_int)).collect()
        };
        let second: Vec<BigUint> = {
            let mut prng = MaskSeed::fill_seed(7).prng();
            (0..8).map(|_| generate_integer(&mut prng, &max_int)).collect()
        };
        assert_eq!(first, second);
        assert_eq!(
            generate_integer(&mut MaskSeed::zeroed().prng(), &BigUint::zero()),
            BigUint::zero(),
        );
    }

    #[test]
    fn test_generate_unit() {
        let mut prng = MaskSeed::zeroed().prng();
        let modulus = BigUint::from(3_u32 * 5 * 7 * 11);
        for _ in 0..32 {
            let unit = generate_unit(&mut prng, &modulus);
            assert!(!unit.is_zero());
            assert!(unit.gcd(&modulus).is_one());
        }
    }

    #[test]
    fn test_seed() {
        assert_eq!(MaskSeed::LENGTH, 32);
        assert!(MaskSeed::from_slice(&[0_u8; 31]).is_none());
        assert_ne!(MaskSeed::generate(), MaskSeed::zeroed());
    }

    impl MaskSeed {
        fn fill_seed(value: u8) -> Self {
            Self([value; 32])
        }
    }
}
