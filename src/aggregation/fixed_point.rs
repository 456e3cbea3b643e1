//! Fixed-point conversion between real values and the plaintext space of the cryptosystem.
//!
//! A real value `v` at scale `s` is represented by the integer `round(v · 10^s)`. Signed integers
//! are embedded into `Z_n` by reduction modulo `n`; plaintexts above `n / 2` are read back as
//! negative values.

use derive_more::{Display, Into};
use num::{
    bigint::{BigInt, BigUint, Sign},
    integer::Integer,
    rational::Ratio,
    traits::{float::FloatCore, pow::Pow, Zero},
};
use serde::{Deserialize, Serialize};

use super::AggregationError;

/// The largest supported number of fractional digits.
pub const MAX_ACCURACY: u32 = 18;

#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Into, Serialize, Deserialize,
)]
/// The number of fractional decimal digits kept when mapping reals to integers.
pub struct Accuracy(u32);

impl Accuracy {
    /// Creates an accuracy of `digits` fractional digits.
    ///
    /// # Errors
    /// Fails if `digits` exceeds [`MAX_ACCURACY`].
    pub fn new(digits: u32) -> Result<Self, AggregationError> {
        if digits > MAX_ACCURACY {
            Err(AggregationError::InvalidAccuracy(digits))
        } else {
            Ok(Self(digits))
        }
    }

    /// Gets the number of fractional digits.
    pub fn digits(self) -> u32 {
        self.0
    }

    /// Gets the scale of a product of two values encoded at this accuracy.
    pub fn squared(self) -> Self {
        Self(2 * self.0)
    }

    /// Gets the scale factor `10^digits`.
    pub fn factor(self) -> BigInt {
        BigInt::from(10_u32).pow(self.0)
    }
}

/// Encodes a real value as `round(value · 10^accuracy)`, rounding half away from zero.
///
/// # Errors
/// Fails if the value is not finite.
pub fn encode(value: f64, accuracy: Accuracy) -> Result<BigInt, AggregationError> {
    let ratio = Ratio::<BigInt>::from_float(value).ok_or(AggregationError::NonFinite(value))?;
    Ok((ratio * accuracy.factor()).round().to_integer())
}

/// Decodes an integer at the given accuracy to the nearest representable real value.
pub fn decode(value: &BigInt, accuracy: Accuracy) -> f64 {
    ratio_to_float(&Ratio::new(value.clone(), accuracy.factor())).unwrap_or_else(|| {
        if value.sign() == Sign::Minus {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    })
}

/// Embeds a signed integer into the plaintext space `[0, n)`.
pub fn to_plaintext(value: &BigInt, modulus: &BigUint) -> BigUint {
    let modulus = BigInt::from_biguint(Sign::Plus, modulus.clone());
    // safe unwrap: the floored remainder of a positive modulus is non-negative
    value.mod_floor(&modulus).to_biguint().unwrap()
}

/// Reads a plaintext of `[0, n)` back as a signed integer in `(-n/2, n/2]`.
pub fn from_plaintext(value: &BigUint, modulus: &BigUint) -> BigInt {
    let value = value % modulus;
    if value > modulus >> 1_usize {
        BigInt::from_biguint(Sign::Plus, value) - BigInt::from_biguint(Sign::Plus, modulus.clone())
    } else {
        BigInt::from_biguint(Sign::Plus, value)
    }
}

/// Converts a rational to the primitive float type.
///
/// Returns `None` if the ratio is outside of the range of the float type.
fn ratio_to_float<F: FloatCore>(ratio: &Ratio<BigInt>) -> Option<F> {
    let min_value = Ratio::from_float(F::min_value())?;
    let max_value = Ratio::from_float(F::max_value())?;
    if ratio < &min_value || ratio > &max_value {
        return None;
    }

    let mut numer = ratio.numer().clone();
    let mut denom = ratio.denom().clone();
    // safe loop: each halving shortens both operands by one bit
    loop {
        match (F::from(numer.clone()), F::from(denom.clone())) {
            (Some(n), Some(d)) if n.is_zero() || d.is_zero() => break Some(F::zero()),
            (Some(n), Some(d)) if (n / d).is_finite() => break Some(n / d),
            _ => {
                numer >>= 1_usize;
                denom >>= 1_usize;
            }
        }
    }
}
