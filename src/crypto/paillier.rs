//! The Paillier additive homomorphic cryptosystem.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use std::fmt;

use num::{
    bigint::{BigInt, BigUint, Sign},
    integer::{ExtendedGcd, Integer},
    traits::One,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::prng::{generate_unit, MaskSeed};

/// The smallest supported modulus size in bits.
pub const MIN_KEY_BITS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
/// Errors related to Paillier keys and ciphertexts.
pub enum PaillierError {
    #[error("invalid key size of {0} bits")]
    InvalidKeySize(usize),
    #[error("prime generation failed: {0}")]
    PrimeGeneration(String),
    #[error("the primes do not form a valid key")]
    InvalidPrimes,
    #[error("plaintext is out of the message space")]
    PlaintextOutOfRange,
    #[error("ciphertext is out of the ciphertext space")]
    CiphertextOutOfRange,
}

/// Public operations of an additive homomorphic cryptosystem over big integers.
///
/// Plaintexts live in `[0, n)` for the [`modulus()`](Self::modulus) `n`, ciphertexts are opaque
/// big integers.
pub trait HomomorphicEncryptKey {
    /// Gets the modulus of the plaintext space.
    fn modulus(&self) -> &BigUint;

    /// Encrypts a plaintext.
    ///
    /// # Errors
    /// Fails if the plaintext is not in `[0, n)`.
    fn encrypt(&self, plaintext: &BigUint) -> Result<BigUint, PaillierError>;

    /// Computes a ciphertext of the sum of the plaintexts of both ciphertexts.
    fn add(&self, lhs: &BigUint, rhs: &BigUint) -> BigUint;

    /// Computes a ciphertext of the sum of the ciphertext's plaintext and a plaintext.
    fn add_plain(&self, ciphertext: &BigUint, plaintext: &BigUint) -> BigUint;

    /// Computes a ciphertext of the product of the ciphertext's plaintext and a plaintext.
    fn mul_plain(&self, ciphertext: &BigUint, plaintext: &BigUint) -> BigUint;

    /// Computes a fresh ciphertext of the same plaintext.
    fn rerandomize(&self, ciphertext: &BigUint) -> BigUint;
}

/// Decryption of an additive homomorphic cryptosystem over big integers.
pub trait HomomorphicDecryptKey {
    /// Decrypts a ciphertext to a plaintext in `[0, n)`.
    ///
    /// # Errors
    /// Fails if the ciphertext is not in the ciphertext space.
    fn decrypt(&self, ciphertext: &BigUint) -> Result<BigUint, PaillierError>;
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A Paillier public key `n` with the generator `g = n + 1`.
pub struct PaillierPublicKey {
    n: BigUint,
    n_squared: BigUint,
}

impl fmt::Debug for PaillierPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaillierPublicKey({} bits)", self.n.bits())
    }
}

impl PaillierPublicKey {
    /// Creates a public key from its modulus.
    pub fn new(n: BigUint) -> Self {
        let n_squared = &n * &n;
        Self { n, n_squared }
    }

    /// Computes `r^n mod n²` for a random unit `r`.
    fn random_factor(&self) -> BigUint {
        let r = generate_unit(&mut MaskSeed::fresh_prng(), &self.n);
        r.modpow(&self.n, &self.n_squared)
    }
}

impl HomomorphicEncryptKey for PaillierPublicKey {
    fn modulus(&self) -> &BigUint {
        &self.n
    }

    fn encrypt(&self, plaintext: &BigUint) -> Result<BigUint, PaillierError> {
        if plaintext >= &self.n {
            return Err(PaillierError::PlaintextOutOfRange);
        }
        // g^m = (1 + n)^m = 1 + mn (mod n²)
        let g_m = (BigUint::one() + plaintext * &self.n) % &self.n_squared;
        Ok(g_m * self.random_factor() % &self.n_squared)
    }

    fn add(&self, lhs: &BigUint, rhs: &BigUint) -> BigUint {
        lhs * rhs % &self.n_squared
    }

    fn add_plain(&self, ciphertext: &BigUint, plaintext: &BigUint) -> BigUint {
        let g_m = (BigUint::one() + (plaintext % &self.n) * &self.n) % &self.n_squared;
        ciphertext * g_m % &self.n_squared
    }

    fn mul_plain(&self, ciphertext: &BigUint, plaintext: &BigUint) -> BigUint {
        ciphertext.modpow(&(plaintext % &self.n), &self.n_squared)
    }

    fn rerandomize(&self, ciphertext: &BigUint) -> BigUint {
        ciphertext * self.random_factor() % &self.n_squared
    }
}

#[derive(Clone, Serialize, Deserialize)]
/// A Paillier secret key `(λ, μ)`.
pub struct PaillierSecretKey {
    public: PaillierPublicKey,
    lambda: BigUint,
    mu: BigUint,
}

impl fmt::Debug for PaillierSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PaillierSecretKey(<redacted>)")
    }
}

impl HomomorphicDecryptKey for PaillierSecretKey {
    fn decrypt(&self, ciphertext: &BigUint) -> Result<BigUint, PaillierError> {
        let PaillierPublicKey { n, n_squared } = &self.public;
        // ciphertexts are units modulo n², anything else has no plaintext
        if ciphertext >= n_squared || !ciphertext.gcd(n).is_one() {
            return Err(PaillierError::CiphertextOutOfRange);
        }
        // L(x) = (x - 1) / n
        let l = (ciphertext.modpow(&self.lambda, n_squared) - BigUint::one()) / n;
        Ok(l * &self.mu % n)
    }
}

#[derive(Debug, Clone)]
/// A Paillier key pair.
pub struct PaillierKeyPair {
    pub public: PaillierPublicKey,
    pub secret: PaillierSecretKey,
}

impl PaillierKeyPair {
    /// Generates a key pair whose modulus has `bits` bits.
    ///
    /// # Errors
    /// Fails if the size is odd or below [`MIN_KEY_BITS`], or if prime generation fails.
    pub fn generate(bits: usize) -> Result<Self, PaillierError> {
        if bits < MIN_KEY_BITS || bits % 2 != 0 {
            return Err(PaillierError::InvalidKeySize(bits));
        }
        loop {
            let p = new_prime(bits / 2)?;
            let q = new_prime(bits / 2)?;
            match Self::from_primes(p, q) {
                Ok(keys) if keys.public.n.bits() as usize == bits => return Ok(keys),
                _ => debug!("discarding unsuitable prime pair"),
            }
        }
    }

    /// Creates a key pair from two distinct primes.
    ///
    /// # Errors
    /// Fails if the primes are equal, too small or `gcd(pq, (p - 1)(q - 1)) ≠ 1`.
    pub fn from_primes(p: BigUint, q: BigUint) -> Result<Self, PaillierError> {
        let one = BigUint::one();
        if p == q || p <= one || q <= one {
            return Err(PaillierError::InvalidPrimes);
        }
        let n = &p * &q;
        let p_1 = &p - &one;
        let q_1 = &q - &one;
        if !n.gcd(&(&p_1 * &q_1)).is_one() {
            return Err(PaillierError::InvalidPrimes);
        }
        let lambda = p_1.lcm(&q_1);
        let mu = mod_inverse(&lambda, &n).ok_or(PaillierError::InvalidPrimes)?;
        let public = PaillierPublicKey::new(n);
        Ok(Self {
            secret: PaillierSecretKey {
                public: public.clone(),
                lambda,
                mu,
            },
            public,
        })
    }
}

fn new_prime(bits: usize) -> Result<BigUint, PaillierError> {
    glass_pumpkin::prime::new(bits)
        .map_err(|err| PaillierError::PrimeGeneration(format!("{:?}", err)))
}

/// Computes the inverse of `value` modulo `modulus`, if it exists.
pub(crate) fn mod_inverse(value: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    let value = BigInt::from_biguint(Sign::Plus, value % modulus);
    let modulus = BigInt::from_biguint(Sign::Plus, modulus.clone());
    let ExtendedGcd { gcd, x, .. } = value.extended_gcd(&modulus);
    if gcd.is_one() {
        x.mod_floor(&modulus).to_biguint()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use num::traits::Zero;

    use super::*;

    /// A small key from two known primes.
    fn small_keys() -> PaillierKeyPair {
        PaillierKeyPair::from_primes(
            BigUint::from(4_294_967_291_u64),
            BigUint::from(4_294_967_279_u64),
        )
        .unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let keys = small_keys();
        for value in &[0_u64, 1, 42, 4_294_967_290] {
            let plaintext = BigUint::from(*value);
            let ciphertext = keys.public.encrypt(&plaintext).unwrap();
            assert_eq!(keys.secret.decrypt(&ciphertext).unwrap(), plaintext);
        }
        let n = keys.public.modulus().clone();
        assert_eq!(
            keys.public.encrypt(&n),
            Err(PaillierError::PlaintextOutOfRange),
        );
        assert_eq!(
            keys.secret.decrypt(&BigUint::zero()),
            Err(PaillierError::CiphertextOutOfRange),
        );
    }

    #[test]
    fn test_decrypt_rejects_non_units() {
        let keys = small_keys();
        let n = keys.public.modulus().clone();
        for ciphertext in &[
            n.clone(),
            &n * BigUint::from(7_u32),
            BigUint::from(4_294_967_291_u64),
        ] {
            assert_eq!(
                keys.secret.decrypt(ciphertext),
                Err(PaillierError::CiphertextOutOfRange),
            );
        }
    }

    #[test]
    fn test_homomorphic_operations() {
        let keys = small_keys();
        let n = keys.public.modulus().clone();
        let a = keys.public.encrypt(&BigUint::from(1_000_u32)).unwrap();
        let b = keys.public.encrypt(&BigUint::from(234_u32)).unwrap();

        let sum = keys.public.add(&a, &b);
        assert_eq!(keys.secret.decrypt(&sum).unwrap(), BigUint::from(1_234_u32));

        let shifted = keys.public.add_plain(&a, &BigUint::from(5_u32));
        assert_eq!(keys.secret.decrypt(&shifted).unwrap(), BigUint::from(1_005_u32));

        let scaled = keys.public.mul_plain(&b, &BigUint::from(3_u32));
        assert_eq!(keys.secret.decrypt(&scaled).unwrap(), BigUint::from(702_u32));

        // subtraction by adding the additive inverse modulo n
        let diff = keys.public.add_plain(&a, &(&n - BigUint::from(1_001_u32)));
        assert_eq!(keys.secret.decrypt(&diff).unwrap(), &n - BigUint::one());

        let fresh = keys.public.rerandomize(&a);
        assert_ne!(fresh, a);
        assert_eq!(keys.secret.decrypt(&fresh).unwrap(), BigUint::from(1_000_u32));
    }

    #[test]
    fn test_invalid_primes() {
        let p = BigUint::from(4_294_967_291_u64);
        assert_eq!(
            PaillierKeyPair::from_primes(p.clone(), p).unwrap_err(),
            PaillierError::InvalidPrimes,
        );
        assert_eq!(
            PaillierKeyPair::generate(63).unwrap_err(),
            PaillierError::InvalidKeySize(63),
        );
    }

    #[test]
    fn test_generate() {
        let keys = PaillierKeyPair::generate(256).unwrap();
        assert_eq!(keys.public.modulus().bits(), 256);
        let plaintext = BigUint::from(987_654_321_u64);
        let ciphertext = keys.public.encrypt(&plaintext).unwrap();
        assert_eq!(keys.secret.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_mod_inverse() {
        let modulus = BigUint::from(97_u32);
        let inverse = mod_inverse(&BigUint::from(13_u32), &modulus).unwrap();
        assert_eq!(inverse * 13_u32 % &modulus, BigUint::one());
        assert!(mod_inverse(&BigUint::from(6_u32), &BigUint::from(9_u32)).is_none());
    }
}
