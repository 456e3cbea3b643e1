//! Enumeration and evaluation of split candidates.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    dataset::{DtDataSet, DtFeature},
    gini::Labels,
    node::{Split, SplitValue},
    TreeError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The sample lists of the two children of a split.
pub struct Partition {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

impl Partition {
    /// Checks whether both sides are non-empty and together hold each of `ids` exactly once.
    pub fn covers(&self, ids: &[usize]) -> bool {
        if self.left.is_empty()
            || self.right.is_empty()
            || self.left.len() + self.right.len() != ids.len()
        {
            return false;
        }
        let sides = self.left.iter().chain(&self.right).collect::<BTreeSet<_>>();
        sides.len() == ids.len() && ids.iter().all(|id| sides.contains(id))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A possible split of a node together with the partition it induces.
pub struct Candidate {
    pub split: Split,
    pub partition: Partition,
}

/// Enumerates the split candidates of a party at a node holding the samples `ids`.
///
/// Features are visited in table order, the label column is skipped. A continuous feature
/// yields the midpoint of every pair of consecutive distinct values in ascending order, a
/// discrete feature yields every distinct value in lexicographic order. Candidates leaving one
/// side empty are skipped.
///
/// # Errors
/// Fails if a sample is unknown or a continuous value is not a number.
pub fn prepare_candidates(
    data: &DtDataSet,
    ids: &[usize],
    label: &str,
    continuous: &[String],
) -> Result<Vec<Candidate>, TreeError> {
    let per_feature = data
        .features()
        .par_iter()
        .filter(|feature| feature.name != label)
        .map(|feature| {
            if continuous.contains(&feature.name) {
                continuous_candidates(feature, ids)
            } else {
                discrete_candidates(feature, ids)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(per_feature.into_iter().flatten().collect())
}

fn continuous_candidates(feature: &DtFeature, ids: &[usize]) -> Result<Vec<Candidate>, TreeError> {
    let values = ids
        .iter()
        .map(|id| feature.numeric(*id))
        .collect::<Result<Vec<_>, _>>()?;
    let mut distinct = values.clone();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    Ok(distinct
        .windows(2)
        .filter_map(|pair| {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let sides = values.iter().map(|value| *value <= threshold);
            candidate(feature, ids, sides, SplitValue::Continuous(threshold))
        })
        .collect())
}

fn discrete_candidates(feature: &DtFeature, ids: &[usize]) -> Result<Vec<Candidate>, TreeError> {
    let values = ids
        .iter()
        .map(|id| feature.get(*id).ok_or(TreeError::UnknownSample(*id)))
        .collect::<Result<Vec<_>, _>>()?;
    let distinct = values.iter().copied().collect::<BTreeSet<_>>();
    Ok(distinct
        .into_iter()
        .filter_map(|expected| {
            let sides = values.iter().map(|value| *value == expected);
            candidate(feature, ids, sides, SplitValue::Discrete(expected.to_string()))
        })
        .collect())
}

fn candidate(
    feature: &DtFeature,
    ids: &[usize],
    sides: impl Iterator<Item = bool>,
    value: SplitValue,
) -> Option<Candidate> {
    let (left, right): (Vec<(usize, bool)>, Vec<(usize, bool)>) =
        ids.iter().copied().zip(sides).partition(|(_, left)| *left);
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some(Candidate {
        split: Split {
            feature: feature.name.clone(),
            value,
        },
        partition: Partition {
            left: left.into_iter().map(|(id, _)| id).collect(),
            right: right.into_iter().map(|(id, _)| id).collect(),
        },
    })
}

/// Evaluates the Gini index of every partition and finds the lowest one.
///
/// Returns the position of the best partition and its index. The first partition wins a tie.
///
/// # Errors
/// Fails if a sample is unknown to the labels.
pub fn best_partition(
    labels: &Labels,
    partitions: &[Partition],
) -> Result<Option<(usize, f64)>, TreeError> {
    let ginis = partitions
        .par_iter()
        .map(|partition| labels.split_gini(&partition.left, &partition.right))
        .collect::<Result<Vec<_>, _>>()?;
    let mut best: Option<(usize, f64)> = None;
    for (position, gini) in ginis.into_iter().enumerate() {
        match best {
            Some((_, lowest)) if lowest <= gini => {}
            _ => best = Some((position, gini)),
        }
    }
    Ok(best)
}
