//! Feature tables of the decision tree parties.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::TreeError;

/// A single sample as a mapping from feature name to its string encoded value.
pub type Sample = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A named feature column mapping sample indices to string encoded values.
pub struct DtFeature {
    pub name: String,
    pub values: BTreeMap<usize, String>,
}

impl DtFeature {
    /// Creates a feature from `(sample index, value)` pairs.
    pub fn new<N, V>(name: N, values: impl IntoIterator<Item = (usize, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(|(id, value)| (id, value.into())).collect(),
        }
    }

    /// Creates a feature from a column of values, indexed by position.
    pub fn from_column<N, V>(name: N, values: impl IntoIterator<Item = V>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self::new(name, values.into_iter().enumerate())
    }

    /// Gets the value of a sample.
    pub fn get(&self, id: usize) -> Option<&str> {
        self.values.get(&id).map(String::as_str)
    }

    /// Gets the value of a sample parsed as a number.
    ///
    /// # Errors
    /// Fails if the sample is unknown or the value is not a number.
    pub fn numeric(&self, id: usize) -> Result<f64, TreeError> {
        let value = self.get(id).ok_or(TreeError::UnknownSample(id))?;
        parse_numeric(&self.name, value)
    }
}

/// Parses a continuous feature value.
pub(crate) fn parse_numeric(feature: &str, value: &str) -> Result<f64, TreeError> {
    value.trim().parse::<f64>().map_err(|_| TreeError::ParseValue {
        feature: feature.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A table of feature columns over one common sample index domain.
pub struct DtDataSet {
    features: Vec<DtFeature>,
}

impl DtDataSet {
    /// Creates a table from its columns.
    ///
    /// # Errors
    /// Fails if there are no columns or no samples, or if the columns cover different samples.
    pub fn new(features: Vec<DtFeature>) -> Result<Self, TreeError> {
        let first = features.first().ok_or(TreeError::EmptyDataSet)?;
        if first.values.is_empty() {
            return Err(TreeError::EmptyDataSet);
        }
        for feature in &features[1..] {
            let sample = first
                .values
                .keys()
                .chain(feature.values.keys())
                .filter(|id| first.values.contains_key(*id) != feature.values.contains_key(*id))
                .min();
            if let Some(sample) = sample {
                return Err(TreeError::ShapeMismatch {
                    feature: feature.name.clone(),
                    sample: *sample,
                });
            }
        }
        Ok(Self { features })
    }

    /// Gets all feature columns in table order.
    pub fn features(&self) -> &[DtFeature] {
        &self.features
    }

    /// Gets a feature column by name.
    ///
    /// # Errors
    /// Fails if the table has no such column.
    pub fn feature(&self, name: &str) -> Result<&DtFeature, TreeError> {
        self.features
            .iter()
            .find(|feature| feature.name == name)
            .ok_or_else(|| TreeError::FeatureNotFound(name.to_string()))
    }

    /// Gets the indices of all samples in ascending order.
    pub fn sample_ids(&self) -> Vec<usize> {
        self.features
            .first()
            .map(|feature| feature.values.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Gets the number of samples.
    pub fn len(&self) -> usize {
        self.features.first().map(|feature| feature.values.len()).unwrap_or_default()
    }

    /// Checks whether the table has no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets all feature values of a sample.
    ///
    /// # Errors
    /// Fails if the sample is unknown.
    pub fn sample(&self, id: usize) -> Result<Sample, TreeError> {
        self.features
            .iter()
            .map(|feature| {
                let value = feature.get(id).ok_or(TreeError::UnknownSample(id))?;
                Ok((feature.name.clone(), value.to_string()))
            })
            .collect()
    }

    /// Restricts the table to the given samples, keeping their indices.
    pub fn retrieve_by_ids(&self, ids: &[usize]) -> DtDataSet {
        let ids = ids.iter().collect::<HashSet<_>>();
        let features = self
            .features
            .iter()
            .map(|feature| DtFeature {
                name: feature.name.clone(),
                values: feature
                    .values
                    .iter()
                    .filter(|(id, _)| ids.contains(id))
                    .map(|(id, value)| (*id, value.clone()))
                    .collect(),
            })
            .collect();
        DtDataSet { features }
    }

    /// Reorders the table so that the sample at `ids[i]` becomes sample `i`.
    ///
    /// Used to align the tables of the parties on the order of a private set intersection.
    ///
    /// # Errors
    /// Fails if a sample is unknown or if no samples are selected.
    pub fn reindex(&self, ids: &[usize]) -> Result<DtDataSet, TreeError> {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let values = ids
                    .iter()
                    .enumerate()
                    .map(|(position, id)| {
                        let value = feature.get(*id).ok_or(TreeError::UnknownSample(*id))?;
                        Ok((position, value.to_string()))
                    })
                    .collect::<Result<_, TreeError>>()?;
                Ok(DtFeature {
                    name: feature.name.clone(),
                    values,
                })
            })
            .collect::<Result<_, TreeError>>()?;
        DtDataSet::new(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DtDataSet {
        DtDataSet::new(vec![
            DtFeature::from_column("age", vec!["31", "45", "27"]),
            DtFeature::from_column("city", vec!["rome", "oslo", "rome"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_new() {
        assert_eq!(DtDataSet::new(vec![]).unwrap_err(), TreeError::EmptyDataSet);
        assert_eq!(
            DtDataSet::new(vec![DtFeature::from_column("a", Vec::<String>::new())]).unwrap_err(),
            TreeError::EmptyDataSet,
        );
        assert_eq!(
            DtDataSet::new(vec![
                DtFeature::from_column("a", vec!["1", "2"]),
                DtFeature::new("b", vec![(0, "x"), (2, "y")]),
            ])
            .unwrap_err(),
            TreeError::ShapeMismatch {
                feature: "b".into(),
                sample: 1,
            },
        );
        assert_eq!(
            DtDataSet::new(vec![
                DtFeature::from_column("a", vec!["1", "2"]),
                DtFeature::from_column("b", vec!["x", "y", "z"]),
            ])
            .unwrap_err(),
            TreeError::ShapeMismatch {
                feature: "b".into(),
                sample: 2,
            },
        );
    }

    #[test]
    fn test_lookups() {
        let data = table();
        assert_eq!(data.len(), 3);
        assert_eq!(data.sample_ids(), vec![0, 1, 2]);
        assert_eq!(data.feature("age").unwrap().numeric(1).unwrap(), 45.0);
        assert_eq!(
            data.feature("city").unwrap().numeric(0).unwrap_err(),
            TreeError::ParseValue {
                feature: "city".into(),
                value: "rome".into(),
            },
        );
        assert_eq!(data.feature("zip").unwrap_err(), TreeError::FeatureNotFound("zip".into()));
        let sample = data.sample(2).unwrap();
        assert_eq!(sample.get("city").map(String::as_str), Some("rome"));
        assert_eq!(data.sample(3).unwrap_err(), TreeError::UnknownSample(3));
    }

    #[test]
    fn test_retrieve_and_reindex() {
        let data = table();
        let subset = data.retrieve_by_ids(&[2, 0]);
        assert_eq!(subset.sample_ids(), vec![0, 2]);

        let aligned = data.reindex(&[2, 0]).unwrap();
        assert_eq!(aligned.sample_ids(), vec![0, 1]);
        assert_eq!(aligned.feature("age").unwrap().get(0), Some("27"));
        assert_eq!(data.reindex(&[5]).unwrap_err(), TreeError::UnknownSample(5));
    }
}
