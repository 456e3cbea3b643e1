//! Loading and validation of settings.
//!
//! Values for the settings are loaded from a TOML file. Environment variables with the prefix
//! `VFL` and the separator `__` override the values of the file.

#[cfg(test)]
mod tests;

use std::{fmt, path::Path};

use config::{Config, ConfigError, Environment};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    aggregation::{Accuracy, AggregationError, RegressionKind, Regularization},
    crypto::EcCurve,
    tree::StopCondition,
};

#[derive(Debug, Error)]
/// An error related to loading and validation of settings.
pub enum SettingsError {
    #[error("configuration loading failed: {0}")]
    Loading(#[from] ConfigError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Validate, Deserialize)]
/// The combined settings.
///
/// Each section in the configuration file corresponds to the identically named settings field.
pub struct Settings {
    pub psi: PsiSettings,
    #[validate]
    pub aggregation: AggregationSettings,
    #[validate]
    pub tree: TreeSettings,
    pub log: LoggingSettings,
}

impl Settings {
    /// Loads and validates the settings via a configuration file.
    ///
    /// # Errors
    /// Fails when the loading of the configuration file or its validation failed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings: Settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        config.merge(config::File::from(path.as_ref()))?;
        config.merge(Environment::with_prefix("vfl").separator("__"))?;
        config.try_into()
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
/// PSI settings.
pub struct PsiSettings {
    /// The curve the identifiers are hashed onto. Unknown curve names fail to load.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [psi]
    /// curve = "SM2-P-256"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_PSI__CURVE=SM2-P-256
    /// ```
    pub curve: EcCurve,
}

#[derive(Debug, Validate, Deserialize, Clone, Copy)]
#[validate(schema(function = "validate_aggregation"))]
/// Secure aggregation settings.
pub struct AggregationSettings {
    /// The regression model to train.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [aggregation]
    /// kind = "logistic"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_AGGREGATION__KIND=logistic
    /// ```
    pub kind: RegressionKind,
    /// The number of decimal digits kept by the fixed point encoding. The squares in the cost
    /// are encoded with twice as many digits.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [aggregation]
    /// accuracy = 6
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_AGGREGATION__ACCURACY=6
    /// ```
    #[validate(range(min = 1, max = 18))]
    pub accuracy: u32,
    /// The bit length of the Paillier modulus of every party. Must be even and at least 256.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [aggregation]
    /// key_bits = 1024
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_AGGREGATION__KEY_BITS=1024
    /// ```
    pub key_bits: usize,
    /// The learning rate of the gradient descent.
    pub alpha: f64,
    /// The number of training rounds.
    pub rounds: usize,
    #[validate]
    pub regularization: RegularizationSettings,
}

impl AggregationSettings {
    /// Checks the key size and the learning rate.
    fn validate_aggregation(&self) -> Result<(), ValidationError> {
        if self.key_bits < 256 || self.key_bits % 2 != 0 {
            return Err(ValidationError::new("invalid key size"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ValidationError::new("invalid learning rate"));
        }
        Ok(())
    }

    /// Gets the validated fixed point accuracy.
    ///
    /// # Errors
    /// Fails if the accuracy is out of range, which validated settings never are.
    pub fn accuracy(&self) -> Result<Accuracy, AggregationError> {
        Accuracy::new(self.accuracy)
    }
}

/// A wrapper for validate derive.
fn validate_aggregation(s: &AggregationSettings) -> Result<(), ValidationError> {
    s.validate_aggregation()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// The kind of regularization.
pub enum RegularizationMode {
    None,
    L1,
    L2,
}

#[derive(Debug, Validate, Deserialize, Clone, Copy)]
#[validate(schema(function = "validate_regularization"))]
/// Regularization settings.
///
/// # Examples
///
/// **TOML**
/// ```text
/// [aggregation.regularization]
/// mode = "l2"
/// param = 0.1
/// ```
///
/// **Environment variable**
/// ```text
/// VFL_AGGREGATION__REGULARIZATION__MODE=l2
/// VFL_AGGREGATION__REGULARIZATION__PARAM=0.1
/// ```
pub struct RegularizationSettings {
    pub mode: RegularizationMode,
    #[serde(default)]
    pub param: f64,
}

impl RegularizationSettings {
    fn validate_regularization(&self) -> Result<(), ValidationError> {
        if self.param.is_finite() && self.param >= 0.0 {
            Ok(())
        } else {
            Err(ValidationError::new("invalid regularization parameter"))
        }
    }

    /// Gets the regularization applied to the gradients.
    pub fn regularization(&self) -> Regularization {
        match self.mode {
            RegularizationMode::None => Regularization::None,
            RegularizationMode::L1 => Regularization::L1(self.param),
            RegularizationMode::L2 => Regularization::L2(self.param),
        }
    }
}

/// A wrapper for validate derive.
fn validate_regularization(s: &RegularizationSettings) -> Result<(), ValidationError> {
    s.validate_regularization()
}

#[derive(Debug, Validate, Deserialize, Clone)]
#[validate(schema(function = "validate_tree"))]
/// Decision tree settings.
pub struct TreeSettings {
    /// The name of the label column of the tag party.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [tree]
    /// label = "churn"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_TREE__LABEL=churn
    /// ```
    #[validate(length(min = 1))]
    pub label: String,
    /// The features of both parties which are split by thresholds. All other features are
    /// split by equality.
    #[serde(default)]
    pub continuous_features: Vec<String>,
    /// The regularization parameter of the pruning. A split survives only if it lowers the
    /// misclassification cost by more than this.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [tree]
    /// reg_param = 0.02
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_TREE__REG_PARAM=0.02
    /// ```
    pub reg_param: f64,
    /// The conditions which turn a node into a leaf.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [tree.stop]
    /// sample_threshold = 2
    /// depth_threshold = 5
    /// gini_threshold = 0.05
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_TREE__STOP__DEPTH_THRESHOLD=5
    /// ```
    pub stop: StopCondition,
}

impl TreeSettings {
    /// Checks the pruning parameter and the Gini threshold.
    fn validate_tree(&self) -> Result<(), ValidationError> {
        if !(self.reg_param.is_finite() && self.reg_param >= 0.0) {
            return Err(ValidationError::new("invalid pruning parameter"));
        }
        if !(0.0..=1.0).contains(&self.stop.gini_threshold) {
            return Err(ValidationError::new("invalid gini threshold"));
        }
        Ok(())
    }
}

/// A wrapper for validate derive.
fn validate_tree(s: &TreeSettings) -> Result<(), ValidationError> {
    s.validate_tree()
}

#[derive(Debug, Deserialize)]
/// Logging settings.
pub struct LoggingSettings {
    /// A comma-separated list of logging directives. More information about logging directives
    /// can be found [here].
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [log]
    /// filter = "info"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// VFL_LOG__FILTER=info
    /// ```
    ///
    /// [here]: https://docs.rs/tracing-subscriber/0.2.15/tracing_subscriber/filter/struct.EnvFilter.html#directives
    #[serde(deserialize_with = "deserialize_env_filter")]
    pub filter: EnvFilter,
}

fn deserialize_env_filter<'de, D>(deserializer: D) -> Result<EnvFilter, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvFilterVisitor;

    impl<'de> Visitor<'de> for EnvFilterVisitor {
        type Value = EnvFilter;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(
                formatter,
                "a valid tracing filter directive: https://docs.rs/tracing-subscriber/0.2.15/tracing_subscriber/filter/struct.EnvFilter.html#directives"
            )
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            EnvFilter::try_new(value)
                .map_err(|_| de::Error::invalid_value(serde::de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(EnvFilterVisitor)
}
