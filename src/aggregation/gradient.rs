//! Plaintext formulas of the vertical regression models.
//!
//! Training rows of a non-tag party are `[x_1, …, x_k]`. Rows of the tag party are
//! `[1, x_1, …, x_k, y]`, i.e. an intercept column followed by the features and the target.
//!
//! Each party derives a per sample *raw part* `u` from its own columns such that the residual is
//! `d = u_nontag + u_tag`:
//!
//! | model    | non-tag       | tag                   |
//! |----------|---------------|-----------------------|
//! | linear   | `θ·x`         | `θ·x − y`             |
//! | logistic | `θ·x / 4`     | `θ·x / 4 + 1/2 − y`   |
//!
//! The logistic model uses the first order Taylor expansion `σ(z) ≈ 1/2 + z/4` of the sigmoid
//! around zero. In both models the gradient of feature `j` is `(1/m) Σ d_i x_ij`.

use std::f64::consts::LN_2;

use serde::{Deserialize, Serialize};

use super::AggregationError;
use crate::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The regression model trained by a session.
pub enum RegressionKind {
    Linear,
    Logistic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// The regularization applied to the gradients.
pub enum Regularization {
    None,
    /// Lasso with the given parameter.
    L1(f64),
    /// Ridge with the given parameter.
    L2(f64),
}

impl Default for Regularization {
    fn default() -> Self {
        Regularization::None
    }
}

/// Gets the feature columns of a training row.
pub(crate) fn features(row: &[f64], role: Role) -> &[f64] {
    match role {
        Role::Tag => &row[..row.len().saturating_sub(1)],
        Role::NonTag => row,
    }
}

/// Checks that all rows match the parameters and are finite.
pub(crate) fn check_train_set(
    thetas: &[f64],
    rows: &[Vec<f64>],
    role: Role,
) -> Result<(), AggregationError> {
    if rows.is_empty() {
        return Err(AggregationError::EmptyTrainSet);
    }
    // the tag rows carry the target in addition to the parameterised columns
    let expected = thetas.len() + if role.is_tag() { 1 } else { 0 };
    for row in rows {
        if row.len() != expected {
            return Err(AggregationError::ShapeMismatch {
                expected,
                actual: row.len(),
            });
        }
        if let Some(value) = row.iter().find(|value| !value.is_finite()) {
            return Err(AggregationError::NonFinite(*value));
        }
    }
    Ok(())
}

/// Computes the raw part `u_i` of every sample.
pub(crate) fn raw_parts(
    kind: RegressionKind,
    role: Role,
    thetas: &[f64],
    rows: &[Vec<f64>],
) -> Vec<f64> {
    rows.iter()
        .map(|row| {
            let z: f64 = features(row, role).iter().zip(thetas).map(|(x, theta)| x * theta).sum();
            let target = if role.is_tag() { row[row.len() - 1] } else { 0.0 };
            match (kind, role) {
                (RegressionKind::Linear, Role::NonTag) => z,
                (RegressionKind::Linear, Role::Tag) => z - target,
                (RegressionKind::Logistic, Role::NonTag) => 0.25 * z,
                (RegressionKind::Logistic, Role::Tag) => 0.25 * z + 0.5 - target,
            }
        })
        .collect()
}

/// Computes the cost from the sum `Σ d_i²` of squared residuals over `m` samples.
pub fn cost_from_squares(kind: RegressionKind, squares: f64, m: usize) -> f64 {
    let m = m as f64;
    match kind {
        RegressionKind::Linear => squares / (2.0 * m),
        // ln 2 + (1/2 − y) z + z²/8 = 2 d² + ln 2 − 1/2 for y ∈ {0, 1}
        RegressionKind::Logistic => LN_2 - 0.5 + 2.0 * squares / m,
    }
}

/// Adds the regularization term of `theta` to a gradient over `m` samples.
///
/// The intercept of the tag party is not regularized.
pub fn regularize(
    gradient: f64,
    theta: f64,
    regularization: Regularization,
    m: usize,
    is_intercept: bool,
) -> f64 {
    if is_intercept {
        return gradient;
    }
    let m = m as f64;
    match regularization {
        Regularization::None => gradient,
        Regularization::L1(_) if theta == 0.0 => gradient,
        Regularization::L1(lambda) => gradient + lambda / m * theta.signum(),
        Regularization::L2(lambda) => gradient + lambda / m * theta,
    }
}
