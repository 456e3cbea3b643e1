//! Secure aggregation for vertical linear and logistic regression.
//!
//! Two parties, the tag party and a non-tag party, hold different feature columns of the same
//! aligned samples. Every training round runs as follows, for each party `P` with peer `R`:
//!
//! 1. `P` computes its raw parts `u_P` (see [`RegressionKind`]) and sends them to `R` encrypted
//!    under its own Paillier key ([`RegressionSession::local_part()`]).
//! 2. `R` combines the encrypted parts with its own features and raw parts into the encrypted
//!    gradient sums of its own features under `P`'s key, masks them with fresh noise and sends them
//!    to `P` ([`RegressionSession::masked_gradients()`]). The tag party additionally does the same
//!    for the sum of squared residuals ([`RegressionSession::masked_cost()`]).
//! 3. `P` decrypts the masked values on behalf of `R` ([`RegressionSession::decrypt_masked()`]).
//! 4. `R` removes its noise, descales and updates its parameters
//!    ([`RegressionSession::retrieve_gradients()`], [`RegressionSession::update()`]).
//!
//! No party learns a raw part, a feature value or a gradient of its peer: ciphertexts are only
//! decrypted after masking with noise that is uniform over the whole plaintext space.
//!
//! Real values are mapped into the plaintext space with the [fixed point](encode) scheme of the
//! session [`Accuracy`]. Products of two encoded values carry twice the accuracy.

mod fixed_point;
mod gradient;
mod masking;
mod predict;
mod session;

use thiserror::Error;

pub use self::{
    fixed_point::{decode, encode, from_plaintext, to_plaintext, Accuracy, MAX_ACCURACY},
    gradient::{cost_from_squares, regularize, RegressionKind, Regularization},
    masking::{decrypt_masked, unmask, DecryptedValues, MaskedValues, Masker, Noise},
    predict::{
        de_standardize_output,
        logistic_output,
        named_thetas,
        predict_local_part,
        standardize_local_input,
        INTERCEPT,
    },
    session::{train_round, EncLocalPart, RawLocalPart, RegressionSession},
};
use crate::crypto::PaillierError;

#[derive(Debug, Error, PartialEq)]
/// Errors of the secure aggregation.
pub enum AggregationError {
    #[error("accuracy of {0} digits exceeds the maximum of {}", MAX_ACCURACY)]
    InvalidAccuracy(u32),
    #[error("value {0} is not finite")]
    NonFinite(f64),
    #[error("peer accuracy {peer} differs from the local accuracy {local}")]
    AccuracyMismatch { local: Accuracy, peer: Accuracy },
    #[error("expected {expected} values but got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("the training set is empty")]
    EmptyTrainSet,
    #[error("value at index {0} is missing")]
    MissingValue(usize),
    #[error("feature {0} is unknown")]
    MissingFeature(String),
    #[error(transparent)]
    Paillier(#[from] PaillierError),
}
