//! Plaintext helpers for prediction with a trained vertical regression model.
//!
//! Each party standardizes its own input features and computes its part `θ·x` of the linear
//! predictor. The tag party adds the intercept, sums the parts and transforms the sum back to the
//! target domain.

use std::collections::HashMap;

use super::AggregationError;
use crate::Role;

/// The name of the intercept parameter of the tag party.
pub const INTERCEPT: &str = "Intercept";

/// Standardizes the input features by the training means and standard deviations.
///
/// A feature with zero standard deviation was constant during training and maps to `0`.
///
/// # Errors
/// Fails if the mean or the standard deviation of an input feature is unknown.
pub fn standardize_local_input(
    xbars: &HashMap<String, f64>,
    sigmas: &HashMap<String, f64>,
    input: &HashMap<String, f64>,
) -> Result<HashMap<String, f64>, AggregationError> {
    input
        .iter()
        .map(|(name, value)| {
            let xbar = xbars
                .get(name)
                .ok_or_else(|| AggregationError::MissingFeature(name.clone()))?;
            let sigma = sigmas
                .get(name)
                .ok_or_else(|| AggregationError::MissingFeature(name.clone()))?;
            let standardized = if *sigma == 0.0 { 0.0 } else { (value - xbar) / sigma };
            Ok((name.clone(), standardized))
        })
        .collect()
}

/// Computes the local part `Σ θ_j x_j` of the linear predictor.
///
/// The tag party adds its [`INTERCEPT`] parameter if present.
///
/// # Errors
/// Fails if the input lacks a feature of the model.
pub fn predict_local_part(
    thetas: &HashMap<String, f64>,
    input: &HashMap<String, f64>,
    role: Role,
) -> Result<f64, AggregationError> {
    thetas
        .iter()
        .filter(|(name, _)| name.as_str() != INTERCEPT)
        .try_fold(0.0, |sum, (name, theta)| {
            let x = input
                .get(name)
                .ok_or_else(|| AggregationError::MissingFeature(name.clone()))?;
            Ok(sum + theta * x)
        })
        .map(|sum| match (role, thetas.get(INTERCEPT)) {
            (Role::Tag, Some(intercept)) => sum + intercept,
            _ => sum,
        })
}

/// Maps a standardized linear prediction back to the target domain.
pub fn de_standardize_output(ybar: f64, sigma: f64, output: f64) -> f64 {
    output * sigma + ybar
}

/// Maps a logistic predictor sum to a probability.
pub fn logistic_output(sum: f64) -> f64 {
    1.0 / (1.0 + (-sum).exp())
}

/// Names the parameters of a session by the feature names of the party.
///
/// The tag party's first parameter is the [`INTERCEPT`].
///
/// # Errors
/// Fails if the number of names does not match the parameters.
pub fn named_thetas(
    names: &[String],
    thetas: &[f64],
    role: Role,
) -> Result<HashMap<String, f64>, AggregationError> {
    let offset = if role.is_tag() { 1 } else { 0 };
    if names.len() + offset != thetas.len() {
        return Err(AggregationError::ShapeMismatch {
            expected: thetas.len(),
            actual: names.len() + offset,
        });
    }
    let intercept = thetas
        .first()
        .filter(|_| role.is_tag())
        .map(|theta| (INTERCEPT.to_string(), *theta));
    Ok(names
        .iter()
        .cloned()
        .zip(thetas[offset..].iter().copied())
        .chain(intercept)
        .collect())
}
