//! A binary classification tree whose model is split between two parties.
//!
//! The [`TagParty`] holds the label column and some features, the [`NonTagParty`] holds the
//! remaining features of the same aligned samples. At every node both parties enumerate their
//! split candidates, the tag party scores all of them by the Gini index and the owner of the best
//! candidate stores the split decision in its own [`PartialModel`]. The node records of both
//! parties are addressed by a common structural [`NodeKey`] derived from the node's depth and
//! index, so neither party needs the other's tree to route a sample: a party resolves the nodes it
//! owns and hands the position off to the peer for the others.
//!
//! The non-tag party only ever reveals the sample partitions of its candidates. Feature names,
//! thresholds and the split decisions it wins stay local.
//!
//! # Examples
//! ```
//! # use vfl_core::tree::{DtDataSet, DtFeature, InProcess, NonTagParty, StopCondition, TagParty};
//! let non_tag = DtDataSet::new(vec![DtFeature::from_column(
//!     "income",
//!     vec!["12", "48", "51", "9"],
//! )])?;
//! let tag = DtDataSet::new(vec![
//!     DtFeature::from_column("owner", vec!["no", "yes", "yes", "no"]),
//!     DtFeature::from_column("churn", vec!["1", "0", "0", "1"]),
//! ])?;
//!
//! let mut peer = InProcess::new(NonTagParty::new(non_tag, "churn", vec!["income".into()]));
//! let condition = StopCondition { sample_threshold: 1, depth_threshold: 4, gini_threshold: 0.0 };
//! let mut party = TagParty::new(tag.clone(), "churn", vec![], condition)?;
//! party.train(&mut peer)?;
//! party.prune(&mut peer, 0.0)?;
//! assert_eq!(party.predict(&mut peer, 1, &tag.sample(1)?)?, "0");
//! # Ok::<(), vfl_core::tree::TreeError>(())
//! ```

mod dataset;
mod gini;
mod model;
mod node;
mod party;
mod predict;
mod protocol;
mod prune;
mod split;
mod terminate;
mod transport;

use thiserror::Error;

pub use self::{
    dataset::{DtDataSet, DtFeature, Sample},
    gini::Labels,
    model::{ModelMap, PartialModel},
    node::{child_position, CTreeNode, NodeKey, NodeState, Split, SplitValue, StopCondition},
    party::{NonTagParty, TagParty},
    predict::{prediction_step, Step},
    protocol::{Request, Response},
    prune::prune,
    split::{best_partition, prepare_candidates, Candidate, Partition},
    terminate::{decide_terminate, stop_train},
    transport::{
        serve, ChannelTransport, Handler, InProcess, RequestReceiver, ResponseSender, Transport,
        TransportError,
    },
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors of the decision tree protocol.
pub enum TreeError {
    #[error("the data set holds no samples")]
    EmptyDataSet,
    #[error("feature {feature} and the table differ in sample {sample}")]
    ShapeMismatch { feature: String, sample: usize },
    #[error("feature {0} not found")]
    FeatureNotFound(String),
    #[error("failed to parse value {value:?} of feature {feature} as a number")]
    ParseValue { feature: String, value: String },
    #[error("sample {0} is unknown")]
    UnknownSample(usize),
    #[error("the sample list is empty")]
    EmptySampleList,
    #[error("node ({depth}, {index}) is unknown")]
    UnknownNode { depth: usize, index: usize },
    #[error("node ({depth}, {index}) has no candidate {candidate}")]
    UnknownCandidate {
        depth: usize,
        index: usize,
        candidate: usize,
    },
    #[error("a partition of node ({depth}, {index}) does not cover its samples")]
    MalformedPartition { depth: usize, index: usize },
    #[error("the model is not trained")]
    ModelNotTrained,
    #[error("node ({depth}, {index}) cannot be resolved by either party")]
    Unresolvable { depth: usize, index: usize },
    #[error("unexpected {0} response")]
    UnexpectedResponse(&'static str),
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
}
