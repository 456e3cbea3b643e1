//! Prediction routing through a partial model.

use serde::{Deserialize, Serialize};

use super::{
    dataset::Sample,
    model::PartialModel,
    node::{child_position, NodeKey},
    TreeError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The outcome of routing a sample through one partial model.
pub enum Step {
    /// A leaf was reached.
    Leaf(String),
    /// The node at this position is not resolvable locally and the peer has to continue.
    Handoff { depth: usize, index: usize },
}

/// Routes a sample from the node at `(depth, index)` as far as the local partial model allows.
///
/// A record with neither a split nor a result, or no record at all, hands the sample off.
///
/// # Errors
/// Fails if the sample lacks the feature of a local split or a continuous value is not a number.
pub fn prediction_step<M>(
    model: &M,
    sample: &Sample,
    mut depth: usize,
    mut index: usize,
) -> Result<Step, TreeError>
where
    M: PartialModel + ?Sized,
{
    loop {
        let node = match model.get(&NodeKey::new(depth, index)) {
            Some(node) => node,
            None => return Ok(Step::Handoff { depth, index }),
        };
        if let Some(result) = &node.result {
            return Ok(Step::Leaf(result.clone()));
        }
        match &node.split {
            Some(split) => {
                let (next_depth, next_index) =
                    child_position(depth, index, split.routes_left(sample)?);
                trace!(
                    "routed ({}, {}) by {} to ({}, {})",
                    depth,
                    index,
                    split,
                    next_depth,
                    next_index
                );
                depth = next_depth;
                index = next_index;
            }
            None => return Ok(Step::Handoff { depth, index }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CTreeNode, ModelMap, Split, SplitValue};

    fn sample(entries: &[(&str, &str)]) -> Sample {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// root: age <= 30 → [leaf young | (1,1) split held elsewhere]
    fn model() -> ModelMap {
        let mut model = ModelMap::new();
        let mut root = CTreeNode::new(0, 0, vec![], 0.5);
        root.split = Some(Split {
            feature: "age".into(),
            value: SplitValue::Continuous(30.0),
        });
        model.put(root);
        let mut leaf = CTreeNode::new(1, 0, vec![], 0.0);
        leaf.make_leaf("young".into());
        model.put(leaf);
        model.put(CTreeNode::new(1, 1, vec![], 0.4));
        model
    }

    #[test]
    fn test_local_leaf_without_handoff() {
        let step = prediction_step(&model(), &sample(&[("age", "25")]), 0, 0).unwrap();
        assert_eq!(step, Step::Leaf("young".into()));
    }

    #[test]
    fn test_handoff_at_foreign_split() {
        let model = model();
        let step = prediction_step(&model, &sample(&[("age", "45")]), 0, 0).unwrap();
        assert_eq!(step, Step::Handoff { depth: 1, index: 1 });
        // positions without any record are handed off unchanged
        assert_eq!(
            prediction_step(&model, &Sample::new(), 4, 9).unwrap(),
            Step::Handoff { depth: 4, index: 9 },
        );
    }

    #[test]
    fn test_missing_feature() {
        assert_eq!(
            prediction_step(&model(), &Sample::new(), 0, 0).unwrap_err(),
            TreeError::FeatureNotFound("age".into()),
        );
    }
}
