//! Label statistics of the tag party.
//!
//! Only the tag party holds the label column, so every quantity that depends on labels is
//! computed here on request, for arbitrary lists of sample indices.

use std::collections::BTreeMap;

use super::{dataset::DtDataSet, TreeError};

#[derive(Debug, Clone, PartialEq, Eq)]
/// The label column of the tag party.
pub struct Labels {
    labels: BTreeMap<usize, String>,
}

impl Labels {
    /// Extracts the label column from the tag party's table.
    ///
    /// # Errors
    /// Fails if the table has no column of that name.
    pub fn from_data_set(data: &DtDataSet, label: &str) -> Result<Self, TreeError> {
        Ok(Self {
            labels: data.feature(label)?.values.clone(),
        })
    }

    /// Gets the total number of labelled samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Gets the label of a sample.
    ///
    /// # Errors
    /// Fails if the sample is unknown.
    pub fn get(&self, id: usize) -> Result<&str, TreeError> {
        self.labels
            .get(&id)
            .map(String::as_str)
            .ok_or(TreeError::UnknownSample(id))
    }

    /// Counts the samples per label, ordered by label.
    fn counts(&self, ids: &[usize]) -> Result<BTreeMap<&str, usize>, TreeError> {
        let mut counts = BTreeMap::new();
        for id in ids {
            *counts.entry(self.get(*id)?).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Computes the Gini index `1 − Σ p_k²` of a sample list. An empty list has index `0`.
    ///
    /// # Errors
    /// Fails if a sample is unknown.
    pub fn gini(&self, ids: &[usize]) -> Result<f64, TreeError> {
        if ids.is_empty() {
            return Ok(0.0);
        }
        let total = ids.len() as f64;
        let purity: f64 = self
            .counts(ids)?
            .values()
            .map(|count| (*count as f64 / total).powi(2))
            .sum();
        Ok(1.0 - purity)
    }

    /// Computes the size weighted Gini index of a binary partition.
    ///
    /// # Errors
    /// Fails if a sample is unknown.
    pub fn split_gini(&self, left: &[usize], right: &[usize]) -> Result<f64, TreeError> {
        let total = left.len() + right.len();
        if total == 0 {
            return Ok(0.0);
        }
        let weighted =
            left.len() as f64 * self.gini(left)? + right.len() as f64 * self.gini(right)?;
        Ok(weighted / total as f64)
    }

    /// Gets the most frequent label of a sample list. Ties go to the lexicographically smallest
    /// label.
    ///
    /// # Errors
    /// Fails if the list is empty or a sample is unknown.
    pub fn majority_label(&self, ids: &[usize]) -> Result<String, TreeError> {
        let mut majority: Option<(&str, usize)> = None;
        for (label, count) in self.counts(ids)? {
            match majority {
                Some((_, best)) if best >= count => {}
                _ => majority = Some((label, count)),
            }
        }
        majority
            .map(|(label, _)| label.to_string())
            .ok_or(TreeError::EmptySampleList)
    }

    /// Gets the label shared by all samples of a non-empty list, if any.
    ///
    /// # Errors
    /// Fails if a sample is unknown.
    pub fn uniform_label(&self, ids: &[usize]) -> Result<Option<String>, TreeError> {
        let counts = self.counts(ids)?;
        if counts.len() == 1 {
            Ok(counts.keys().next().map(|label| label.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Checks whether all samples of a non-empty list share one label.
    ///
    /// # Errors
    /// Fails if a sample is unknown.
    pub fn is_uniform(&self, ids: &[usize]) -> Result<bool, TreeError> {
        self.uniform_label(ids).map(|label| label.is_some())
    }

    /// Computes the cost of turning a sample list into a leaf: the number of samples not carrying
    /// the majority label relative to all labelled samples.
    ///
    /// # Errors
    /// Fails if the list is empty or a sample is unknown.
    pub fn node_cost(&self, ids: &[usize]) -> Result<f64, TreeError> {
        let majority = self.majority_label(ids)?;
        let mut errors = 0;
        for id in ids {
            if self.get(*id)? != majority {
                errors += 1;
            }
        }
        Ok(errors as f64 / self.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DtFeature;

    fn labels(values: &[&str]) -> Labels {
        let data = DtDataSet::new(vec![DtFeature::from_column("y", values.to_vec())]).unwrap();
        Labels::from_data_set(&data, "y").unwrap()
    }

    #[test]
    fn test_gini() {
        let labels = labels(&["a", "a", "b", "b", "a", "c"]);
        assert_eq!(labels.gini(&[0, 1, 4]).unwrap(), 0.0);
        assert!((labels.gini(&[0, 1, 2, 3]).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(labels.gini(&[]).unwrap(), 0.0);
        // (2 · 0 + 2 · 0.5) / 4
        assert!((labels.split_gini(&[0, 1], &[4, 5]).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(labels.gini(&[9]).unwrap_err(), TreeError::UnknownSample(9));
    }

    #[test]
    fn test_majority_label() {
        let labels = labels(&["b", "a", "b", "a", "c"]);
        assert_eq!(labels.majority_label(&[0, 2, 4]).unwrap(), "b");
        // two way tie between a and b
        assert_eq!(labels.majority_label(&[0, 1, 2, 3]).unwrap(), "a");
        assert_eq!(labels.majority_label(&[4, 0]).unwrap(), "b");
        assert_eq!(labels.majority_label(&[]).unwrap_err(), TreeError::EmptySampleList);
    }

    #[test]
    fn test_uniform_and_cost() {
        let labels = labels(&["x", "x", "y", "x"]);
        assert_eq!(labels.uniform_label(&[0, 1, 3]).unwrap(), Some("x".to_string()));
        assert!(!labels.is_uniform(&[0, 2]).unwrap());
        assert_eq!(labels.node_cost(&[0, 1, 3]).unwrap(), 0.0);
        // one error among four labelled samples
        assert!((labels.node_cost(&[0, 1, 2, 3]).unwrap() - 0.25).abs() < 1e-12);
    }
}
