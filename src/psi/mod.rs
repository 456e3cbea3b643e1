//! Private set intersection over sample identifiers.
//!
//! The engine is an EC Diffie-Hellman PSI. Every party holds a private [`EcdhSecretKey`] on the
//! same curve and runs:
//!
//! 1. [`PsiSession::encrypt_ids()`]: map each identifier to a curve point with
//!    [`hash_to_curve()`] and multiply it by the own scalar.
//! 2. [`PsiSession::reencrypt()`]: multiply every point of a set received from another party by
//!    the own scalar. This is repeated until every set has been multiplied by every party's
//!    scalar.
//! 3. [`intersect()`]: compare the own fully masked set with the fully masked sets of all other
//!    parties.
//!
//! Scalar multiplication commutes, so a fully masked point does not depend on the order in which
//! the scalars were applied and equal identifiers meet in the same point. Identifiers outside of
//! the intersection are only ever seen as masked points.
//!
//! [`EcdhSecretKey`]: crate::crypto::EcdhSecretKey
//! [`hash_to_curve()`]: crate::crypto::hash_to_curve

mod set;

use rayon::prelude::*;
use thiserror::Error;

pub use self::set::EncSet;
use crate::crypto::{hash_to_curve, CurveError, EcCurve, EcdhSecretKey};

#[derive(Debug, Error, PartialEq, Eq)]
/// Errors of the PSI engine.
pub enum PsiError {
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error("no masked sets of other parties to intersect with")]
    NoPeerSets,
    #[error("masked set refers to sample index {index} but only {len} identifiers are known")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone)]
/// The PSI context of one party for one run.
pub struct PsiSession {
    secret: EcdhSecretKey,
}

impl PsiSession {
    /// Creates a session around the private scalar of this party.
    pub fn new(secret: EcdhSecretKey) -> Self {
        Self { secret }
    }

    /// Creates a session with a fresh scalar on the curve.
    pub fn generate(curve: EcCurve) -> Self {
        Self::new(EcdhSecretKey::generate(curve))
    }

    /// Gets the curve of this session.
    pub fn curve(&self) -> EcCurve {
        self.secret.curve()
    }

    /// Masks the own identifiers.
    ///
    /// The resulting set maps each masked point to the index of its identifier. An identifier
    /// occurring several times collapses into one entry carrying its last index.
    ///
    /// # Errors
    /// Fails only if a mapped point is rejected by the curve arithmetic.
    pub fn encrypt_ids(&self, ids: &[String]) -> Result<EncSet, PsiError> {
        let curve = self.curve();
        let masked = ids
            .par_iter()
            .enumerate()
            .map(|(index, id)| {
                let point = hash_to_curve(id.as_bytes(), curve).point;
                self.secret.mul_point(&point).map(|bytes| (bytes, index))
            })
            .collect::<Result<Vec<_>, CurveError>>()?;
        let set = EncSet::from_entries(masked);
        debug!(
            "masked {} identifiers into {} points on {}",
            ids.len(),
            set.len(),
            curve
        );
        Ok(set)
    }

    /// Masks a set received from another party with the own scalar, keeping the index of every
    /// entry.
    ///
    /// # Errors
    /// Fails if an entry is not a point of this session's curve.
    pub fn reencrypt(&self, set: &EncSet) -> Result<EncSet, PsiError> {
        let masked = set
            .par_iter()
            .map(|(bytes, index)| self.secret.mul_marshaled(bytes).map(|bytes| (bytes, *index)))
            .collect::<Result<Vec<_>, CurveError>>()?;
        debug!("re-masked {} points on {}", masked.len(), self.curve());
        Ok(EncSet::from_entries(masked))
    }
}

/// Intersects the own fully masked set with the fully masked sets of all other parties.
///
/// Returns the own identifiers whose masked point appears in *every* other set, ordered by their
/// index in `ids`.
///
/// # Errors
/// Fails if `others` is empty or if `local` refers to an index outside of `ids`.
pub fn intersect(
    ids: &[String],
    local: &EncSet,
    others: &[EncSet],
) -> Result<Vec<String>, PsiError> {
    if others.is_empty() {
        return Err(PsiError::NoPeerSets);
    }
    let mut common = local
        .iter()
        .filter(|(bytes, _)| others.iter().all(|other| other.contains(bytes)))
        .map(|(_, index)| *index)
        .collect::<Vec<_>>();
    common.sort_unstable();
    let intersection = common
        .into_iter()
        .map(|index| {
            ids.get(index).cloned().ok_or(PsiError::IndexOutOfRange {
                index,
                len: ids.len(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        "intersection holds {} of {} local identifiers",
        intersection.len(),
        ids.len()
    );
    Ok(intersection)
}
