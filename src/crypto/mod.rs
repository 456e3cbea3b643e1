//! Cryptographic primitives of the vertical protocols.
//!
//! - [`Sha256`] wraps the [sodiumoxide] `SHA256` hash function. It drives the message to curve
//!   point mapper and the structural key of decision tree nodes.
//! - [`HashToCurve`] deterministically maps arbitrary bytes to a point of one of the supported
//!   [`EcCurve`]s.
//! - [`EcdhSecretKey`] is a private scalar used to mask points in private set intersection.
//!   Multiplication by scalars commutes, which is what makes doubly masked points comparable.
//! - [`PaillierKeyPair`] is an additive homomorphic cryptosystem over big integers. The protocols
//!   only depend on the [`HomomorphicEncryptKey`] and [`HomomorphicDecryptKey`] traits.
//!
//! # Examples
//! ## Mapping a message to a curve point
//! ```
//! # use vfl_core::crypto::{hash_to_curve, EcCurve};
//! let mapped = hash_to_curve(b"sample-0001", EcCurve::Sm2P256);
//! assert!(mapped.point.is_on_curve(EcCurve::Sm2P256));
//! ```
//!
//! ## Adding under encryption
//! ```
//! # use num::BigUint;
//! # use vfl_core::crypto::{HomomorphicDecryptKey, HomomorphicEncryptKey, PaillierKeyPair};
//! let keys = PaillierKeyPair::generate(512).unwrap();
//! let a = keys.public.encrypt(&BigUint::from(20_u32)).unwrap();
//! let b = keys.public.encrypt(&BigUint::from(22_u32)).unwrap();
//! let sum = keys.public.add(&a, &b);
//! assert_eq!(keys.secret.decrypt(&sum).unwrap(), BigUint::from(42_u32));
//! ```
//!
//! [sodiumoxide]: https://docs.rs/sodiumoxide/

pub(crate) mod curve;
pub(crate) mod ecdh;
pub(crate) mod hash;
pub(crate) mod paillier;
pub(crate) mod prng;

use sodiumoxide::randombytes::randombytes;

pub use self::{
    curve::{hash_to_curve, CurveError, CurvePoint, EcCurve, HashToCurve, MappedPoint},
    ecdh::EcdhSecretKey,
    hash::Sha256,
    paillier::{
        HomomorphicDecryptKey,
        HomomorphicEncryptKey,
        PaillierError,
        PaillierKeyPair,
        PaillierPublicKey,
        PaillierSecretKey,
    },
    prng::{generate_integer, generate_unit, MaskSeed},
};

/// An interface for slicing into fixed-length cryptographic byte objects.
pub trait ByteObject: Sized {
    /// Length in bytes of this object
    const LENGTH: usize;

    /// Creates a new object with all the bytes initialized to `0`.
    fn zeroed() -> Self;

    /// Gets the object byte representation.
    fn as_slice(&self) -> &[u8];

    /// Creates an object from the given buffer.
    ///
    /// # Errors
    /// Returns `None` if the length of the byte-slice isn't equal to the length of the object.
    fn from_slice(bytes: &[u8]) -> Option<Self>;

    /// Creates an object from the given buffer.
    ///
    /// # Panics
    /// Panics if the length of the byte-slice isn't equal to the length of the object.
    fn from_slice_unchecked(bytes: &[u8]) -> Self {
        Self::from_slice(bytes).unwrap()
    }

    /// Generates an object from system entropy.
    fn generate() -> Self {
        // safe unwrap: length of slice is guaranteed by constants
        Self::from_slice_unchecked(randombytes(Self::LENGTH).as_slice())
    }
}
