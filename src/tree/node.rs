//! Tree nodes, their structural keys and the stop condition of the growth.

use std::fmt;

use derive_more::{AsRef, Display};
use serde::{Deserialize, Serialize};

use super::{
    dataset::{parse_numeric, Sample},
    TreeError,
};
use crate::crypto::{ByteObject, Sha256};

#[derive(
    AsRef, Display, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[as_ref(forward)]
/// The structural key of the node at `(depth, index)`.
///
/// Both parties derive the same key independently, which keeps their partial models mutually
/// addressable without revealing the shape of the tree.
pub struct NodeKey(String);

impl NodeKey {
    /// Computes `hex(sha256(sha256(depth) ‖ index))` over the decimal encodings.
    pub fn new(depth: usize, index: usize) -> Self {
        let depth = Sha256::hash(depth.to_string().as_bytes());
        let key = Sha256::hash_parts(vec![depth.as_slice(), index.to_string().as_bytes()]);
        Self(key.to_hex())
    }

    /// Gets the hex encoded key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Gets the position of the left or right child of the node at `(depth, index)`.
pub fn child_position(depth: usize, index: usize, left: bool) -> (usize, usize) {
    (depth + 1, if left { 2 * index } else { 2 * index + 1 })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The threshold of a split. The variant carries the continuity of the feature.
pub enum SplitValue {
    /// Samples with a value `≤` the threshold go left.
    Continuous(f64),
    /// Samples with an equal value go left.
    Discrete(String),
}

impl SplitValue {
    pub fn is_continuous(&self) -> bool {
        matches!(self, SplitValue::Continuous(_))
    }
}

impl fmt::Display for SplitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitValue::Continuous(threshold) => write!(f, "<= {}", threshold),
            SplitValue::Discrete(value) => write!(f, "== {:?}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A split decision of an internal node.
pub struct Split {
    pub feature: String,
    pub value: SplitValue,
}

impl Split {
    /// Checks whether a feature value is routed to the left child.
    ///
    /// # Errors
    /// Fails if a continuous split meets a value which is not a number.
    pub fn goes_left(&self, value: &str) -> Result<bool, TreeError> {
        match &self.value {
            SplitValue::Continuous(threshold) => {
                Ok(parse_numeric(&self.feature, value)? <= *threshold)
            }
            SplitValue::Discrete(expected) => Ok(value == expected),
        }
    }

    /// Checks whether a sample is routed to the left child.
    ///
    /// # Errors
    /// Fails if the sample lacks the feature of the split or its value is not a number.
    pub fn routes_left(&self, sample: &Sample) -> Result<bool, TreeError> {
        let value = sample
            .get(&self.feature)
            .ok_or_else(|| TreeError::FeatureNotFound(self.feature.clone()))?;
        self.goes_left(value)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.feature, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The resolution state of a node record.
pub enum NodeState {
    /// Neither a split nor a result is known in this record.
    Unresolved,
    /// The record holds the split decision.
    Internal,
    /// The record holds the result label.
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A node record of a partial model.
pub struct CTreeNode {
    pub depth: usize,
    pub index: usize,
    #[serde(skip)]
    pub sample_ids: Vec<usize>,
    pub split: Option<Split>,
    pub result: Option<String>,
    pub gini: f64,
}

impl CTreeNode {
    /// Creates an unresolved node.
    pub fn new(depth: usize, index: usize, sample_ids: Vec<usize>, gini: f64) -> Self {
        Self {
            depth,
            index,
            sample_ids,
            split: None,
            result: None,
            gini,
        }
    }

    /// Gets the structural key of this node.
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.depth, self.index)
    }

    pub fn state(&self) -> NodeState {
        match (&self.split, &self.result) {
            (_, Some(_)) => NodeState::Leaf,
            (Some(_), None) => NodeState::Internal,
            (None, None) => NodeState::Unresolved,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.result.is_some()
    }

    /// Gets the position of the left or right child.
    pub fn child(&self, left: bool) -> (usize, usize) {
        child_position(self.depth, self.index, left)
    }

    /// Turns this node into a leaf with the given result.
    pub fn make_leaf(&mut self, result: String) {
        self.split = None;
        self.result = Some(result);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// The thresholds that stop the growth of a branch.
pub struct StopCondition {
    /// A node with at most this many samples becomes a leaf.
    pub sample_threshold: usize,
    /// A node at this depth becomes a leaf. Zero disables the threshold.
    pub depth_threshold: usize,
    /// A node with a Gini index of at most this value becomes a leaf.
    pub gini_threshold: f64,
}
