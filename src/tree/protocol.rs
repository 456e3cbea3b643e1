//! Messages exchanged between the tag party and the non-tag party.

use serde::{Deserialize, Serialize};

use super::{node::NodeKey, predict::Step, split::Partition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A request of the tag party to the non-tag party.
pub enum Request {
    /// Enumerate the split candidates of the node at `(depth, index)` holding `sample_ids`.
    PrepareSplits {
        depth: usize,
        index: usize,
        sample_ids: Vec<usize>,
    },
    /// Store the split of the candidate at position `candidate` of the last enumeration of the
    /// node.
    CommitSplit {
        depth: usize,
        index: usize,
        candidate: usize,
    },
    /// Remove a record that pruning made stale.
    RemoveNode { key: NodeKey },
    /// Route the prediction sample `sample` from the node at `(depth, index)`.
    PredictStep { depth: usize, index: usize, sample: usize },
    /// Stop serving requests.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A response of the non-tag party.
pub enum Response {
    /// The partitions of the enumerated candidates in enumeration order. The features and
    /// thresholds stay with the non-tag party.
    Partitions(Vec<Partition>),
    /// The split was stored.
    Committed,
    /// Whether a record was removed.
    Removed(bool),
    /// The outcome of a prediction step.
    Step(Step),
    /// The party stopped serving.
    Closed,
}

impl Response {
    /// Gets the name of the response for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Response::Partitions(_) => "partitions",
            Response::Committed => "committed",
            Response::Removed(_) => "removed",
            Response::Step(_) => "step",
            Response::Closed => "closed",
        }
    }
}
