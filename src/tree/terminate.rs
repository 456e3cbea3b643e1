use super::{gini::Labels, node::StopCondition, TreeError};

/// Decides whether the node holding `ids` becomes a leaf and returns its result if so.
///
/// The checks run in this order:
/// 1. no samples: the majority label of the parent's samples
/// 2. a single label: that label
/// 3. at most `sample_threshold` samples
/// 4. depth at least `depth_threshold`, unless the threshold is zero
/// 5. Gini index at most `gini_threshold`
///
/// The last three cases yield the majority label of the node's samples.
///
/// # Errors
/// Fails if both sample lists are empty or a sample is unknown.
pub fn decide_terminate(
    labels: &Labels,
    ids: &[usize],
    parent_ids: &[usize],
    gini: f64,
    depth: usize,
    condition: &StopCondition,
) -> Result<Option<String>, TreeError> {
    if ids.is_empty() {
        debug!("terminating at depth {}: no samples", depth);
        return labels.majority_label(parent_ids).map(Some);
    }
    if let Some(label) = labels.uniform_label(ids)? {
        debug!("terminating at depth {}: all samples labelled {}", depth, label);
        return Ok(Some(label));
    }
    let reason = if ids.len() <= condition.sample_threshold {
        "sample threshold"
    } else if condition.depth_threshold != 0 && depth >= condition.depth_threshold {
        "depth threshold"
    } else if gini <= condition.gini_threshold {
        "gini threshold"
    } else {
        return Ok(None);
    };
    debug!("terminating at depth {}: {} reached", depth, reason);
    labels.majority_label(ids).map(Some)
}

/// Checks that the numbers of leaves and internal nodes form a complete binary tree.
pub fn stop_train(leaves: usize, internals: usize) -> bool {
    leaves == internals + 1
}
