//! Cost complexity pruning of the tag party's partial model.

use super::{
    gini::Labels,
    model::PartialModel,
    node::{child_position, NodeKey},
    TreeError,
};

/// Merges internal nodes whose two children are leaves while the merged leaf costs no more than
/// the children plus `reg_param`.
///
/// Nodes are visited deepest first and passes repeat until one merges nothing, so the result is
/// a fixed point and pruning again changes nothing. For a merged node whose split decision lives
/// in the peer's partial model (the local record carries no split), `remove_remote` is called with
/// its key so the peer drops the stale decision.
///
/// Returns the number of merges.
///
/// # Errors
/// Fails if a sample of a record is unknown to the labels or `remove_remote` fails.
pub fn prune<M, F>(
    model: &mut M,
    labels: &Labels,
    reg_param: f64,
    mut remove_remote: F,
) -> Result<usize, TreeError>
where
    M: PartialModel + ?Sized,
    F: FnMut(NodeKey) -> Result<(), TreeError>,
{
    let mut merges = 0;
    loop {
        let mut candidates = model
            .keys()
            .into_iter()
            .filter_map(|key| {
                model
                    .get(&key)
                    .filter(|node| !node.is_leaf())
                    .map(|node| (node.depth, node.index))
            })
            .collect::<Vec<_>>();
        candidates.sort_by(|a, b| b.cmp(a));

        let mut pass = 0;
        for (depth, index) in candidates {
            if merge_if_cheaper(model, labels, reg_param, depth, index, &mut remove_remote)? {
                pass += 1;
            }
        }
        debug!("pruning pass merged {} nodes", pass);
        if pass == 0 {
            break;
        }
        merges += pass;
    }
    Ok(merges)
}

fn merge_if_cheaper<M, F>(
    model: &mut M,
    labels: &Labels,
    reg_param: f64,
    depth: usize,
    index: usize,
    remove_remote: &mut F,
) -> Result<bool, TreeError>
where
    M: PartialModel + ?Sized,
    F: FnMut(NodeKey) -> Result<(), TreeError>,
{
    let key = NodeKey::new(depth, index);
    let (left_depth, left_index) = child_position(depth, index, true);
    let (right_depth, right_index) = child_position(depth, index, false);
    let left_key = NodeKey::new(left_depth, left_index);
    let right_key = NodeKey::new(right_depth, right_index);

    let (node, left, right) = match (model.get(&key), model.get(&left_key), model.get(&right_key)) {
        (Some(node), Some(left), Some(right))
            if !node.is_leaf() && left.is_leaf() && right.is_leaf() =>
        {
            (node, left, right)
        }
        _ => return Ok(false),
    };
    let node_cost = labels.node_cost(&node.sample_ids)?;
    let children_cost = labels.node_cost(&left.sample_ids)? + labels.node_cost(&right.sample_ids)?;
    if node_cost > children_cost + reg_param {
        return Ok(false);
    }

    let result = labels.majority_label(&node.sample_ids)?;
    let remote = node.split.is_none();
    if remote {
        remove_remote(key.clone())?;
    }
    model.remove(&left_key);
    model.remove(&right_key);
    if let Some(node) = model.get_mut(&key) {
        node.make_leaf(result);
    }
    debug!(
        "merged node ({}, {}) with cost {:.4} against {:.4}{}",
        depth,
        index,
        node_cost,
        children_cost,
        if remote { ", split removed from peer" } else { "" }
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CTreeNode, DtDataSet, DtFeature, ModelMap, Split, SplitValue};

    fn labels() -> Labels {
        let data = DtDataSet::new(vec![DtFeature::from_column(
            "y",
            vec!["a", "a", "b", "b", "a", "a"],
        )])
        .unwrap();
        Labels::from_data_set(&data, "y").unwrap()
    }

    fn internal(depth: usize, index: usize, ids: Vec<usize>, owned: bool) -> CTreeNode {
        let mut node = CTreeNode::new(depth, index, ids, 0.0);
        if owned {
            node.split = Some(Split {
                feature: "x".into(),
                value: SplitValue::Continuous(0.5),
            });
        }
        node
    }

    fn leaf(depth: usize, index: usize, ids: Vec<usize>, result: &str) -> CTreeNode {
        let mut node = CTreeNode::new(depth, index, ids, 0.0);
        node.make_leaf(result.into());
        node
    }

    /// root (peer split) → [(1,0) own split → a | a], (1,1) → b
    fn model() -> ModelMap {
        let mut model = ModelMap::new();
        model.put(internal(0, 0, vec![0, 1, 2, 3, 4, 5], false));
        model.put(internal(1, 0, vec![0, 1, 4, 5], true));
        model.put(leaf(1, 1, vec![2, 3], "b"));
        model.put(leaf(2, 0, vec![0, 1], "a"));
        model.put(leaf(2, 1, vec![4, 5], "a"));
        model
    }

    #[test]
    fn test_useless_split_is_merged() {
        let mut model = model();
        let mut removed = Vec::new();
        let merges = prune(&mut model, &labels(), 0.0, |key| {
            removed.push(key);
            Ok(())
        })
        .unwrap();
        assert_eq!(merges, 1);
        assert!(removed.is_empty());
        assert_eq!(model.len(), 3);
        assert_eq!(model.get(&NodeKey::new(1, 0)).unwrap().result, Some("a".into()));
        assert!(model.get(&NodeKey::new(0, 0)).unwrap().result.is_none());
    }

    #[test]
    fn test_regularization_merges_peer_split() {
        let mut model = model();
        let mut removed = Vec::new();
        let merges = prune(&mut model, &labels(), 0.5, |key| {
            removed.push(key);
            Ok(())
        })
        .unwrap();
        assert_eq!(merges, 2);
        assert_eq!(removed, vec![NodeKey::new(0, 0)]);
        assert_eq!(model.len(), 1);
        assert_eq!(model.get(&NodeKey::new(0, 0)).unwrap().result, Some("a".into()));
    }

    #[test]
    fn test_pruning_is_idempotent() {
        let mut model = model();
        prune(&mut model, &labels(), 0.0, |_| Ok(())).unwrap();
        let pruned = model.clone();
        assert_eq!(prune(&mut model, &labels(), 0.0, |_| Ok(())).unwrap(), 0);
        assert_eq!(model, pruned);
    }
}
