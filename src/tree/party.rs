//! The tag and the non-tag party of the decision tree protocol.

use super::{
    dataset::{DtDataSet, Sample},
    gini::Labels,
    model::{ModelMap, PartialModel},
    node::{child_position, CTreeNode, NodeKey, StopCondition},
    predict::{prediction_step, Step},
    protocol::{Request, Response},
    prune,
    split::{best_partition, prepare_candidates, Candidate, Partition},
    terminate::{decide_terminate, stop_train},
    transport::{Handler, Transport},
    TreeError,
};

/// The party holding predictor features only.
///
/// It answers the requests of the tag party and keeps the split decisions it wins in its own
/// partial model. Feature names and thresholds never leave it.
pub struct NonTagParty {
    data: DtDataSet,
    label: String,
    continuous: Vec<String>,
    model: ModelMap,
    last_candidates: Option<(NodeKey, Vec<Candidate>)>,
    prediction_set: Option<DtDataSet>,
}

impl NonTagParty {
    /// Creates the party from its training table.
    ///
    /// A column named `label` is never used for splits. Features listed in `continuous` are
    /// split by thresholds, all others by equality.
    pub fn new(data: DtDataSet, label: impl Into<String>, continuous: Vec<String>) -> Self {
        Self {
            data,
            label: label.into(),
            continuous,
            model: ModelMap::new(),
            last_candidates: None,
            prediction_set: None,
        }
    }

    /// Sets the table that prediction requests address by sample index. Defaults to the training
    /// table.
    pub fn with_prediction_set(mut self, data: DtDataSet) -> Self {
        self.prediction_set = Some(data);
        self
    }

    /// Gets the partial model of this party.
    pub fn model(&self) -> &ModelMap {
        &self.model
    }

    fn prepare_splits(
        &mut self,
        depth: usize,
        index: usize,
        sample_ids: Vec<usize>,
    ) -> Result<Response, TreeError> {
        let candidates =
            prepare_candidates(&self.data, &sample_ids, &self.label, &self.continuous)?;
        debug!(
            "prepared {} split candidates for node ({}, {})",
            candidates.len(),
            depth,
            index
        );
        let partitions = candidates.iter().map(|candidate| candidate.partition.clone()).collect();
        self.last_candidates = Some((NodeKey::new(depth, index), candidates));
        Ok(Response::Partitions(partitions))
    }

    fn commit_split(
        &mut self,
        depth: usize,
        index: usize,
        candidate: usize,
    ) -> Result<Response, TreeError> {
        let key = NodeKey::new(depth, index);
        let candidates = match self.last_candidates.take() {
            Some((last, candidates)) if last == key => candidates,
            _ => return Err(TreeError::UnknownNode { depth, index }),
        };
        let Candidate { split, partition } = candidates
            .into_iter()
            .nth(candidate)
            .ok_or(TreeError::UnknownCandidate {
                depth,
                index,
                candidate,
            })?;
        info!("node ({}, {}) is split by the non-tag party", depth, index);
        let Partition { mut left, right } = partition;
        left.extend(right);
        let mut node = CTreeNode::new(depth, index, left, 0.0);
        node.split = Some(split);
        self.model.put(node);
        Ok(Response::Committed)
    }

    fn predict_step(
        &self,
        depth: usize,
        index: usize,
        sample: usize,
    ) -> Result<Response, TreeError> {
        let table = self.prediction_set.as_ref().unwrap_or(&self.data);
        let step = prediction_step(&self.model, &table.sample(sample)?, depth, index)?;
        Ok(Response::Step(step))
    }
}

impl Handler for NonTagParty {
    fn handle(&mut self, request: Request) -> Result<Response, TreeError> {
        match request {
            Request::PrepareSplits {
                depth,
                index,
                sample_ids,
            } => self.prepare_splits(depth, index, sample_ids),
            Request::CommitSplit {
                depth,
                index,
                candidate,
            } => self.commit_split(depth, index, candidate),
            Request::RemoveNode { key } => Ok(Response::Removed(self.model.remove(&key).is_some())),
            Request::PredictStep {
                depth,
                index,
                sample,
            } => self.predict_step(depth, index, sample),
            Request::Shutdown => Ok(Response::Closed),
        }
    }
}

/// The party holding the label column.
///
/// It drives training, pruning and prediction. Its partial model holds a record for every node
/// of the tree, but the split decisions won by the non-tag party are only known to the peer.
pub struct TagParty {
    data: DtDataSet,
    labels: Labels,
    label: String,
    continuous: Vec<String>,
    condition: StopCondition,
    model: ModelMap,
}

impl TagParty {
    /// Creates the party from its training table, which must contain the `label` column.
    ///
    /// # Errors
    /// Fails if the label column is missing.
    pub fn new(
        data: DtDataSet,
        label: impl Into<String>,
        continuous: Vec<String>,
        condition: StopCondition,
    ) -> Result<Self, TreeError> {
        let label = label.into();
        let labels = Labels::from_data_set(&data, &label)?;
        Ok(Self {
            data,
            labels,
            label,
            continuous,
            condition,
            model: ModelMap::new(),
        })
    }

    /// Gets the partial model of this party.
    pub fn model(&self) -> &ModelMap {
        &self.model
    }

    /// Gets the label column of this party.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Trains a tree together with the peer behind `transport`, replacing any earlier model.
    ///
    /// # Errors
    /// Fails if the peer fails or answers unexpectedly, or on malformed sample lists.
    pub fn train<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<(), TreeError> {
        self.model = ModelMap::new();
        let ids = self.data.sample_ids();
        let gini = self.labels.gini(&ids)?;
        let mut root = CTreeNode::new(0, 0, ids, gini);
        info!("training on {} samples, root gini {:.4}", root.sample_ids.len(), gini);
        match decide_terminate(&self.labels, &root.sample_ids, &[], gini, 0, &self.condition)? {
            Some(result) => {
                root.make_leaf(result);
                self.model.put(root);
            }
            None => {
                self.model.put(root);
                self.grow(transport, 0, 0)?;
            }
        }

        let (leaves, internals) = self.model.count_states();
        let unresolved = self.model.len() - leaves - internals;
        if stop_train(leaves, internals + unresolved) {
            info!(
                "trained a tree of {} leaves and {} internal nodes",
                leaves,
                internals + unresolved
            );
        } else {
            warn!(
                "trained tree is incomplete: {} leaves and {} internal nodes",
                leaves,
                internals + unresolved
            );
        }
        Ok(())
    }

    fn grow<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        depth: usize,
        index: usize,
    ) -> Result<(), TreeError> {
        let key = NodeKey::new(depth, index);
        let ids = self
            .model
            .get(&key)
            .map(|node| node.sample_ids.clone())
            .ok_or(TreeError::UnknownNode { depth, index })?;

        let peer_partitions = match transport.request(Request::PrepareSplits {
            depth,
            index,
            sample_ids: ids.clone(),
        })? {
            Response::Partitions(partitions) => partitions,
            other => return Err(TreeError::UnexpectedResponse(other.name())),
        };
        if !peer_partitions.iter().all(|partition| partition.covers(&ids)) {
            return Err(TreeError::MalformedPartition { depth, index });
        }
        let peer_best = best_partition(&self.labels, &peer_partitions)?;
        let own = prepare_candidates(&self.data, &ids, &self.label, &self.continuous)?;
        let own_partitions = own
            .iter()
            .map(|candidate| candidate.partition.clone())
            .collect::<Vec<_>>();
        let own_best = best_partition(&self.labels, &own_partitions)?;
        trace!(
            "node ({}, {}): {} peer and {} own candidates",
            depth,
            index,
            peer_partitions.len(),
            own.len()
        );

        // only a strictly lower own gini beats the peer's best
        let partition = match (peer_best, own_best) {
            (Some((position, peer_gini)), own_best)
                if own_best.map_or(true, |(_, own_gini)| peer_gini <= own_gini) =>
            {
                match transport.request(Request::CommitSplit {
                    depth,
                    index,
                    candidate: position,
                })? {
                    Response::Committed => {}
                    other => return Err(TreeError::UnexpectedResponse(other.name())),
                }
                debug!("node ({}, {}) split by the peer with gini {:.4}", depth, index, peer_gini);
                peer_partitions[position].clone()
            }
            (_, Some((position, own_gini))) => {
                let Candidate { split, partition } = own[position].clone();
                debug!("node ({}, {}) split by {} with gini {:.4}", depth, index, split, own_gini);
                if let Some(node) = self.model.get_mut(&key) {
                    node.split = Some(split);
                }
                partition
            }
            _ => {
                let result = self.labels.majority_label(&ids)?;
                debug!("node ({}, {}) has no split candidates", depth, index);
                if let Some(node) = self.model.get_mut(&key) {
                    node.make_leaf(result);
                }
                return Ok(());
            }
        };

        let Partition { left, right } = partition;
        for (is_left, child_ids) in vec![(true, left), (false, right)] {
            let (child_depth, child_index) = child_position(depth, index, is_left);
            let gini = self.labels.gini(&child_ids)?;
            let result = decide_terminate(
                &self.labels,
                &child_ids,
                &ids,
                gini,
                child_depth,
                &self.condition,
            )?;
            let mut child = CTreeNode::new(child_depth, child_index, child_ids, gini);
            match result {
                Some(result) => {
                    child.make_leaf(result);
                    self.model.put(child);
                }
                None => {
                    self.model.put(child);
                    self.grow(transport, child_depth, child_index)?;
                }
            }
        }
        Ok(())
    }

    /// Prunes the trained tree and removes stale split decisions from the peer.
    ///
    /// Returns the number of merged nodes.
    ///
    /// # Errors
    /// Fails if the peer fails or answers unexpectedly.
    pub fn prune<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        reg_param: f64,
    ) -> Result<usize, TreeError> {
        let merges = prune::prune(&mut self.model, &self.labels, reg_param, |key| {
            match transport.request(Request::RemoveNode { key })? {
                Response::Removed(_) => Ok(()),
                other => Err(TreeError::UnexpectedResponse(other.name())),
            }
        })?;
        info!("pruning merged {} nodes", merges);
        Ok(merges)
    }

    /// Predicts the label of a sample by alternating with the peer until a leaf is reached.
    ///
    /// `sample_id` addresses the peer's prediction table, `sample` holds the own features.
    ///
    /// # Errors
    /// Fails if no model is trained, if a position cannot be resolved by either party or if the
    /// peer fails.
    pub fn predict<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        sample_id: usize,
        sample: &Sample,
    ) -> Result<String, TreeError> {
        if self.model.get(&NodeKey::new(0, 0)).is_none() {
            return Err(TreeError::ModelNotTrained);
        }
        let (mut depth, mut index) = (0, 0);
        let mut from_peer = false;
        loop {
            match prediction_step(&self.model, sample, depth, index)? {
                Step::Leaf(result) => return Ok(result),
                Step::Handoff {
                    depth: next_depth,
                    index: next_index,
                } => {
                    if from_peer && (next_depth, next_index) == (depth, index) {
                        return Err(TreeError::Unresolvable { depth, index });
                    }
                    depth = next_depth;
                    index = next_index;
                }
            }
            trace!("handing sample {} off at ({}, {})", sample_id, depth, index);
            match transport.request(Request::PredictStep {
                depth,
                index,
                sample: sample_id,
            })? {
                Response::Step(Step::Leaf(result)) => return Ok(result),
                Response::Step(Step::Handoff {
                    depth: next_depth,
                    index: next_index,
                }) => {
                    if (next_depth, next_index) == (depth, index) {
                        return Err(TreeError::Unresolvable { depth, index });
                    }
                    depth = next_depth;
                    index = next_index;
                }
                other => return Err(TreeError::UnexpectedResponse(other.name())),
            }
            from_peer = true;
        }
    }

    /// Predicts every sample of the own prediction table, whose indices must match the peer's.
    ///
    /// # Errors
    /// Fails like [`predict()`](Self::predict).
    pub fn predict_all<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        data: &DtDataSet,
    ) -> Result<Vec<String>, TreeError> {
        data.sample_ids()
            .into_iter()
            .map(|id| self.predict(transport, id, &data.sample(id)?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{DtFeature, InProcess, SplitValue};

    /// `x` separates a from the rest at the root, `z` separates b from c below.
    fn tables() -> (DtDataSet, DtDataSet) {
        let non_tag = DtDataSet::new(vec![DtFeature::from_column(
            "x",
            vec!["1", "1", "5", "6", "7", "5"],
        )])
        .unwrap();
        let tag = DtDataSet::new(vec![
            DtFeature::from_column("z", vec!["p", "q", "p", "p", "q", "q"]),
            DtFeature::from_column("y", vec!["a", "a", "b", "b", "c", "c"]),
        ])
        .unwrap();
        (non_tag, tag)
    }

    fn condition() -> StopCondition {
        StopCondition {
            sample_threshold: 1,
            depth_threshold: 3,
            gini_threshold: 0.0,
        }
    }

    #[test]
    fn test_ownership_split_between_parties() {
        let (non_tag, tag) = tables();
        let mut transport = InProcess::new(NonTagParty::new(non_tag, "y", vec!["x".into()]));
        let mut party = TagParty::new(tag, "y", vec![], condition()).unwrap();
        party.train(&mut transport).unwrap();

        let peer = transport.handler().model();
        let root = peer.get(&NodeKey::new(0, 0)).unwrap();
        assert_eq!(root.split.as_ref().unwrap().value, SplitValue::Continuous(3.0));
        assert!(party.model().get(&NodeKey::new(0, 0)).unwrap().split.is_none());

        let inner = party.model().get(&NodeKey::new(1, 1)).unwrap();
        assert_eq!(inner.split.as_ref().unwrap().feature, "z");
        assert!(peer.get(&NodeKey::new(1, 1)).is_none());
        assert_eq!(party.model().count_states(), (3, 1));
    }

    #[test]
    fn test_training_set_is_classified() {
        let (non_tag, tag) = tables();
        let mut transport = InProcess::new(NonTagParty::new(non_tag, "y", vec!["x".into()]));
        let mut party = TagParty::new(tag.clone(), "y", vec![], condition()).unwrap();
        party.train(&mut transport).unwrap();
        assert_eq!(party.prune(&mut transport, 0.0).unwrap(), 0);

        let predicted = party.predict_all(&mut transport, &tag).unwrap();
        assert_eq!(predicted, vec!["a", "a", "b", "b", "c", "c"]);
    }

    #[test]
    fn test_pruning_removes_peer_split() {
        let (non_tag, tag) = tables();
        let mut transport = InProcess::new(NonTagParty::new(non_tag, "y", vec!["x".into()]));
        let mut party = TagParty::new(tag.clone(), "y", vec![], condition()).unwrap();
        party.train(&mut transport).unwrap();
        assert_eq!(party.prune(&mut transport, 1.0).unwrap(), 2);

        assert!(transport.handler().model().is_empty());
        assert_eq!(party.model().len(), 1);
        let predicted = party.predict_all(&mut transport, &tag).unwrap();
        assert!(predicted.iter().all(|label| label == "a"));
        assert_eq!(party.prune(&mut transport, 1.0).unwrap(), 0);
    }

    #[test]
    fn test_untrained_model() {
        let (non_tag, tag) = tables();
        let mut transport = InProcess::new(NonTagParty::new(non_tag, "y", vec![]));
        let party = TagParty::new(tag, "y", vec![], condition()).unwrap();
        assert_eq!(
            party.predict(&mut transport, 0, &Sample::new()).unwrap_err(),
            TreeError::ModelNotTrained,
        );
    }

    #[test]
    fn test_commit_requires_prepared_node() {
        let (non_tag, _) = tables();
        let mut party = NonTagParty::new(non_tag, "y", vec!["x".into()]);
        assert_eq!(
            party
                .handle(Request::CommitSplit {
                    depth: 0,
                    index: 0,
                    candidate: 0,
                })
                .unwrap_err(),
            TreeError::UnknownNode { depth: 0, index: 0 },
        );
        party
            .handle(Request::PrepareSplits {
                depth: 0,
                index: 0,
                sample_ids: vec![0, 1, 2],
            })
            .unwrap();
        assert_eq!(
            party
                .handle(Request::CommitSplit {
                    depth: 0,
                    index: 0,
                    candidate: 7,
                })
                .unwrap_err(),
            TreeError::UnknownCandidate {
                depth: 0,
                index: 0,
                candidate: 7,
            },
        );
    }

    #[test]
    fn test_equal_gini_goes_to_peer() {
        // x and z induce the same perfect partition
        let non_tag =
            DtDataSet::new(vec![DtFeature::from_column("x", vec!["1", "1", "5", "5"])]).unwrap();
        let tag = DtDataSet::new(vec![
            DtFeature::from_column("z", vec!["p", "p", "q", "q"]),
            DtFeature::from_column("y", vec!["a", "a", "b", "b"]),
        ])
        .unwrap();
        let mut transport = InProcess::new(NonTagParty::new(non_tag, "y", vec!["x".into()]));
        let mut party = TagParty::new(tag.clone(), "y", vec![], condition()).unwrap();
        party.train(&mut transport).unwrap();

        let root = NodeKey::new(0, 0);
        let split = transport.handler().model().get(&root).unwrap().split.clone().unwrap();
        assert_eq!(split.feature, "x");
        assert!(party.model().get(&root).unwrap().split.is_none());
        assert_eq!(
            party.predict_all(&mut transport, &tag).unwrap(),
            vec!["a", "a", "b", "b"],
        );
    }

    /// Answers every enumeration with a fixed partition.
    struct Forged(Partition);

    impl Handler for Forged {
        fn handle(&mut self, request: Request) -> Result<Response, TreeError> {
            match request {
                Request::PrepareSplits { .. } => Ok(Response::Partitions(vec![self.0.clone()])),
                Request::CommitSplit { .. } => Ok(Response::Committed),
                _ => Ok(Response::Closed),
            }
        }
    }

    #[test]
    fn test_malformed_peer_partitions() {
        let (_, tag) = tables();
        let forged = vec![
            // duplicated sample
            Partition {
                left: vec![0, 0],
                right: vec![2, 3, 4, 5],
            },
            // foreign sample
            Partition {
                left: vec![0, 9],
                right: vec![2, 3, 4, 5],
            },
            // empty side
            Partition {
                left: vec![],
                right: vec![0, 1, 2, 3, 4, 5],
            },
        ];
        for partition in forged {
            let mut transport = InProcess::new(Forged(partition));
            let condition = StopCondition {
                depth_threshold: 0,
                ..condition()
            };
            let mut party = TagParty::new(tag.clone(), "y", vec![], condition).unwrap();
            assert_eq!(
                party.train(&mut transport).unwrap_err(),
                TreeError::MalformedPartition { depth: 0, index: 0 },
            );
        }
    }
}
