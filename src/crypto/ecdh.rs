//! Secret scalars for commutative point masking.
//!
//! See the [crypto module] documentation since this is a private module anyways.
//!
//! [crypto module]: crate::crypto

use std::fmt;

use p256::elliptic_curve::{
    group::Curve as _,
    sec1::{FromEncodedPoint, ToEncodedPoint},
};
use rand::rngs::OsRng;

use super::curve::{CurveError, CurvePoint, EcCurve};

#[derive(Clone)]
enum Scalar {
    P256(p256::SecretKey),
    Sm2(sm2::SecretKey),
}

#[derive(Clone)]
/// A private scalar on one of the supported curves.
///
/// Multiplying a point by the scalars of several parties yields the same point regardless of the
/// order in which the scalars are applied.
pub struct EcdhSecretKey(Scalar);

impl fmt::Debug for EcdhSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdhSecretKey({}, <redacted>)", self.curve())
    }
}

/// Multiplies an encoded point by a secret scalar of the curve crate `$krate`.
macro_rules! mul_encoded {
    ($krate:ident, $secret:expr, $bytes:expr, $curve:expr) => {{
        let encoded = $krate::EncodedPoint::from_bytes($bytes)
            .map_err(|_| CurveError::InvalidPoint($curve))?;
        if encoded.is_identity() {
            return Err(CurveError::InvalidPoint($curve));
        }
        let affine: Option<$krate::AffinePoint> =
            $krate::AffinePoint::from_encoded_point(&encoded).into();
        let affine = affine.ok_or(CurveError::InvalidPoint($curve))?;
        let product =
            ($krate::ProjectivePoint::from(affine) * *$secret.to_nonzero_scalar()).to_affine();
        Ok(product.to_encoded_point(false).as_bytes().to_vec())
    }};
}

impl EcdhSecretKey {
    /// Generates a fresh scalar from system entropy.
    pub fn generate(curve: EcCurve) -> Self {
        match curve {
            EcCurve::P256 => Self(Scalar::P256(p256::SecretKey::random(&mut OsRng))),
            EcCurve::Sm2P256 => Self(Scalar::Sm2(sm2::SecretKey::random(&mut OsRng))),
        }
    }

    /// Restores a scalar from its big-endian encoding.
    ///
    /// # Errors
    /// Fails if the bytes are not a valid nonzero scalar of the curve.
    pub fn from_bytes(curve: EcCurve, bytes: &[u8]) -> Result<Self, CurveError> {
        let invalid = |_| CurveError::InvalidScalar(curve);
        match curve {
            EcCurve::P256 => p256::SecretKey::from_slice(bytes)
                .map(|key| Self(Scalar::P256(key)))
                .map_err(invalid),
            EcCurve::Sm2P256 => sm2::SecretKey::from_slice(bytes)
                .map(|key| Self(Scalar::Sm2(key)))
                .map_err(invalid),
        }
    }

    /// Gets the big-endian encoding of the scalar.
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.0 {
            Scalar::P256(key) => key.to_bytes().to_vec(),
            Scalar::Sm2(key) => key.to_bytes().to_vec(),
        }
    }

    /// Gets the curve of the scalar.
    pub fn curve(&self) -> EcCurve {
        match self.0 {
            Scalar::P256(_) => EcCurve::P256,
            Scalar::Sm2(_) => EcCurve::Sm2P256,
        }
    }

    /// Multiplies a SEC1 encoded point by this scalar and returns the uncompressed SEC1 encoding of
    /// the product.
    ///
    /// # Errors
    /// Fails if the encoding is malformed, is the identity or is not a point of this curve.
    pub fn mul_marshaled(&self, bytes: &[u8]) -> Result<Vec<u8>, CurveError> {
        let curve = self.curve();
        match &self.0 {
            Scalar::P256(secret) => mul_encoded!(p256, secret, bytes, curve),
            Scalar::Sm2(secret) => mul_encoded!(sm2, secret, bytes, curve),
        }
    }

    /// Multiplies an affine point by this scalar.
    ///
    /// # Errors
    /// Fails if the point is not on this curve.
    pub fn mul_point(&self, point: &CurvePoint) -> Result<Vec<u8>, CurveError> {
        self.mul_marshaled(&point.to_sec1_bytes())
    }
}

#[cfg(test)]
mod tests {
    use paste::paste;

    use super::*;
    use crate::crypto::curve::{hash_to_curve, MARSHALED_POINT_BYTES};

    macro_rules! test_scalar_multiplication_commutes {
        ($suffix:ident, $curve:expr) => {
            paste! {
                #[test]
                fn [<test_commutes_ $suffix>]() {
                    let alice = EcdhSecretKey::generate($curve);
                    let bob = EcdhSecretKey::generate($curve);
                    let point = hash_to_curve(b"18600000000", $curve).point;

                    let ab = bob.mul_marshaled(&alice.mul_point(&point).unwrap()).unwrap();
                    let ba = alice.mul_marshaled(&bob.mul_point(&point).unwrap()).unwrap();
                    assert_eq!(ab, ba);
                    assert_eq!(ab.len(), MARSHALED_POINT_BYTES);
                    assert!(CurvePoint::from_sec1_bytes(&ab, $curve).is_ok());
                }

                #[test]
                fn [<test_scalar_bytes_ $suffix>]() {
                    let key = EcdhSecretKey::generate($curve);
                    let restored = EcdhSecretKey::from_bytes($curve, &key.to_bytes()).unwrap();
                    let point = hash_to_curve(b"id", $curve).point;
                    assert_eq!(
                        key.mul_point(&point).unwrap(),
                        restored.mul_point(&point).unwrap(),
                    );
                    assert_eq!(
                        EcdhSecretKey::from_bytes($curve, &[0_u8; 32]).unwrap_err(),
                        CurveError::InvalidScalar($curve),
                    );
                }
            }
        };
    }

    test_scalar_multiplication_commutes!(p256, EcCurve::P256);
    test_scalar_multiplication_commutes!(sm2, EcCurve::Sm2P256);

    #[test]
    fn test_rejects_foreign_points() {
        let key = EcdhSecretKey::generate(EcCurve::P256);
        let sm2_point = hash_to_curve(b"id", EcCurve::Sm2P256).point;
        assert_eq!(
            key.mul_point(&sm2_point),
            Err(CurveError::InvalidPoint(EcCurve::P256)),
        );
        assert!(key.mul_marshaled(&[0x04, 0x01, 0x02]).is_err());
        assert!(format!("{:?}", key).contains("redacted"));
    }
}
