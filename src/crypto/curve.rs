//! Named curves and the message to curve point mapper.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use std::{fmt, str::FromStr};

use num::{bigint::BigUint, traits::One};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{hash::Sha256, ByteObject};

/// Length of a field element of the supported curves in bytes.
pub const FIELD_BYTES: usize = 32;

/// Length of an uncompressed SEC1 point encoding of the supported curves in bytes.
pub const MARSHALED_POINT_BYTES: usize = 1 + 2 * FIELD_BYTES;

const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;

const P256_P: [u8; FIELD_BYTES] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];
const P256_B: [u8; FIELD_BYTES] = [
    0x5a, 0xc6, 0x35, 0xd8, 0xaa, 0x3a, 0x93, 0xe7, 0xb3, 0xeb, 0xbd, 0x55, 0x76, 0x98, 0x86, 0xbc,
    0x65, 0x1d, 0x06, 0xb0, 0xcc, 0x53, 0xb0, 0xf6, 0x3b, 0xce, 0x3c, 0x3e, 0x27, 0xd2, 0x60, 0x4b,
];
const SM2_P: [u8; FIELD_BYTES] = [
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];
const SM2_B: [u8; FIELD_BYTES] = [
    0x28, 0xe9, 0xfa, 0x9e, 0x9d, 0x9f, 0x5e, 0x34, 0x4d, 0x5a, 0x9e, 0x4b, 0xcf, 0x65, 0x09, 0xa7,
    0xf3, 0x97, 0x89, 0xf5, 0x15, 0xab, 0x8f, 0x92, 0xdd, 0xbc, 0xbd, 0x41, 0x4d, 0x94, 0x0e, 0x93,
];

#[derive(Debug, Error, PartialEq, Eq)]
/// Errors related to curves, points and the point mapper.
pub enum CurveError {
    #[error("curve [{0}] is not supported")]
    UnsupportedCurve(String),
    #[error("no curve point found within {tries} tries")]
    NoPointFound { tries: u64 },
    #[error("invalid point encoding for curve {0}")]
    InvalidPoint(EcCurve),
    #[error("invalid secret scalar for curve {0}")]
    InvalidScalar(EcCurve),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The curves supported by the point mapper and the PSI engine.
///
/// Both curves have `a = -3` over a prime field with `p ≡ 3 (mod 4)`.
pub enum EcCurve {
    /// NIST `P-256`.
    P256,
    /// The Chinese standard curve `SM2-P-256`.
    Sm2P256,
}

impl EcCurve {
    /// Gets the canonical name of the curve.
    pub fn name(self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::Sm2P256 => "SM2-P-256",
        }
    }

    /// Gets the prime of the underlying field.
    pub fn prime(self) -> BigUint {
        match self {
            EcCurve::P256 => BigUint::from_bytes_be(&P256_P),
            EcCurve::Sm2P256 => BigUint::from_bytes_be(&SM2_P),
        }
    }

    /// Gets the `a` coefficient of the short Weierstrass equation as a field element.
    pub fn a(self) -> BigUint {
        self.prime() - 3_u32
    }

    /// Gets the `b` coefficient of the short Weierstrass equation.
    pub fn b(self) -> BigUint {
        match self {
            EcCurve::P256 => BigUint::from_bytes_be(&P256_B),
            EcCurve::Sm2P256 => BigUint::from_bytes_be(&SM2_B),
        }
    }

    /// Evaluates the right-hand side `x³ + ax + b (mod p)` of the curve equation.
    fn rhs(self, x: &BigUint) -> BigUint {
        let p = self.prime();
        (x.modpow(&BigUint::from(3_u32), &p) + self.a() * x + self.b()) % p
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EcCurve {
    type Err = CurveError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "P-256" => Ok(EcCurve::P256),
            "SM2-P-256" => Ok(EcCurve::Sm2P256),
            other => Err(CurveError::UnsupportedCurve(other.to_string())),
        }
    }
}

impl Serialize for EcCurve {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for EcCurve {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An affine point with coordinates in the field of a curve.
pub struct CurvePoint {
    pub x: BigUint,
    pub y: BigUint,
}

impl CurvePoint {
    /// Checks whether the point satisfies the equation `y² = x³ + ax + b (mod p)` of the curve.
    pub fn is_on_curve(&self, curve: EcCurve) -> bool {
        let p = curve.prime();
        self.x < p && self.y < p && (&self.y * &self.y) % &p == curve.rhs(&self.x)
    }

    /// Gets the uncompressed SEC1 encoding `0x04 ‖ X ‖ Y` with fixed-length big-endian
    /// coordinates.
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MARSHALED_POINT_BYTES);
        bytes.push(SEC1_UNCOMPRESSED_TAG);
        bytes.extend_from_slice(&pad_field_element(&self.x));
        bytes.extend_from_slice(&pad_field_element(&self.y));
        bytes
    }

    /// Parses an uncompressed SEC1 encoding and checks that the point lies on the curve.
    ///
    /// # Errors
    /// Fails if the encoding is malformed or the point is not on the curve.
    pub fn from_sec1_bytes(bytes: &[u8], curve: EcCurve) -> Result<Self, CurveError> {
        if bytes.len() != MARSHALED_POINT_BYTES || bytes[0] != SEC1_UNCOMPRESSED_TAG {
            return Err(CurveError::InvalidPoint(curve));
        }
        let point = Self {
            x: BigUint::from_bytes_be(&bytes[1..=FIELD_BYTES]),
            y: BigUint::from_bytes_be(&bytes[FIELD_BYTES + 1..]),
        };
        if point.is_on_curve(curve) {
            Ok(point)
        } else {
            Err(CurveError::InvalidPoint(curve))
        }
    }
}

fn pad_field_element(value: &BigUint) -> [u8; FIELD_BYTES] {
    let bytes = value.to_bytes_be();
    let mut padded = [0_u8; FIELD_BYTES];
    padded[FIELD_BYTES - bytes.len()..].copy_from_slice(&bytes);
    padded
}

/// Computes a square root of `value` modulo the prime `p ≡ 3 (mod 4)`, if one exists.
fn sqrt_3_mod_4(value: &BigUint, p: &BigUint) -> Option<BigUint> {
    let exponent = (p + BigUint::one()) >> 2_usize;
    let root = value.modpow(&exponent, p);
    if (&root * &root) % p == value % p {
        Some(root)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A point found by the mapper together with the number of hashing rounds it took.
pub struct MappedPoint {
    pub point: CurvePoint,
    pub tries: u64,
}

#[derive(Debug, Clone, Copy)]
/// A deterministic mapper from byte strings to points of a curve.
///
/// The message is hashed with `SHA256`, the digest reduced modulo the field prime is taken as a
/// candidate `x` coordinate. If `x³ + ax + b` has no square root the digest becomes the next
/// message. Roughly half of the field elements are quadratic residues, so the expected number of
/// rounds is two. The loop is unbounded unless a ceiling is set with
/// [`max_tries()`](Self::max_tries).
pub struct HashToCurve {
    curve: EcCurve,
    max_tries: Option<u64>,
}

impl HashToCurve {
    /// Creates an unbounded mapper for the curve.
    pub fn new(curve: EcCurve) -> Self {
        Self {
            curve,
            max_tries: None,
        }
    }

    /// Creates an unbounded mapper for a curve given by its name.
    ///
    /// # Errors
    /// Fails with [`CurveError::UnsupportedCurve`] for any name other than `P-256` or `SM2-P-256`.
    pub fn for_curve_name(name: &str) -> Result<Self, CurveError> {
        name.parse().map(Self::new)
    }

    /// Bounds the number of hashing rounds.
    pub fn max_tries(mut self, max_tries: u64) -> Self {
        self.max_tries = Some(max_tries);
        self
    }

    /// Gets the curve of this mapper.
    pub fn curve(&self) -> EcCurve {
        self.curve
    }

    /// Maps the message to a point of the curve.
    ///
    /// # Errors
    /// Fails with [`CurveError::NoPointFound`] if a ceiling is set and exhausted.
    pub fn map(&self, msg: &[u8]) -> Result<MappedPoint, CurveError> {
        let p = self.curve.prime();
        let mut digest = Sha256::hash(msg);
        let mut tries = 1;
        loop {
            let x = BigUint::from_bytes_be(digest.as_slice()) % &p;
            let y_squared = self.curve.rhs(&x);
            if let Some(y) = sqrt_3_mod_4(&y_squared, &p) {
                trace!("mapped message to {} after {} tries", self.curve, tries);
                return Ok(MappedPoint {
                    point: CurvePoint { x, y },
                    tries,
                });
            }
            if matches!(self.max_tries, Some(max) if tries >= max) {
                return Err(CurveError::NoPointFound { tries });
            }
            digest = Sha256::hash(digest.as_slice());
            tries += 1;
        }
    }
}

/// Maps the message to a point of the curve without bounding the number of hashing rounds.
pub fn hash_to_curve(msg: &[u8], curve: EcCurve) -> MappedPoint {
    HashToCurve::new(curve)
        .map(msg)
        .unwrap_or_else(|_| unreachable!("an unbounded mapper never gives up"))
}
