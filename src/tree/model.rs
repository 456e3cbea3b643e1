//! Partial models of the decision tree parties.

use std::collections::HashMap;

use super::node::{CTreeNode, NodeKey, NodeState};

/// The node records one party holds, addressed by structural key.
///
/// Neither party holds the whole tree. The union of the split decisions and results of both
/// partial models forms exactly one binary tree.
pub trait PartialModel {
    /// Gets the record of a node.
    fn get(&self, key: &NodeKey) -> Option<&CTreeNode>;

    /// Gets the mutable record of a node.
    fn get_mut(&mut self, key: &NodeKey) -> Option<&mut CTreeNode>;

    /// Stores a node record under its structural key and returns the replaced record.
    fn put(&mut self, node: CTreeNode) -> Option<CTreeNode>;

    /// Removes the record of a node.
    fn remove(&mut self, key: &NodeKey) -> Option<CTreeNode>;

    /// Gets the number of records.
    fn len(&self) -> usize;

    /// Checks whether no records are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the keys of all records.
    fn keys(&self) -> Vec<NodeKey>;
}

#[derive(Debug, Clone, Default, PartialEq)]
/// A partial model backed by a hash map.
pub struct ModelMap(HashMap<NodeKey, CTreeNode>);

impl PartialModel for ModelMap {
    fn get(&self, key: &NodeKey) -> Option<&CTreeNode> {
        self.0.get(key)
    }

    fn get_mut(&mut self, key: &NodeKey) -> Option<&mut CTreeNode> {
        self.0.get_mut(key)
    }

    fn put(&mut self, node: CTreeNode) -> Option<CTreeNode> {
        self.0.insert(node.key(), node)
    }

    fn remove(&mut self, key: &NodeKey) -> Option<CTreeNode> {
        self.0.remove(key)
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn keys(&self) -> Vec<NodeKey> {
        self.0.keys().cloned().collect()
    }
}

impl ModelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets all records ordered by depth and index.
    pub fn nodes(&self) -> Vec<&CTreeNode> {
        let mut nodes = self.0.values().collect::<Vec<_>>();
        nodes.sort_by_key(|node| (node.depth, node.index));
        nodes
    }

    /// Counts the leaf and the internal records.
    pub fn count_states(&self) -> (usize, usize) {
        self.0.values().fold((0, 0), |(leaves, internals), node| match node.state() {
            NodeState::Leaf => (leaves + 1, internals),
            NodeState::Internal => (leaves, internals + 1),
            NodeState::Unresolved => (leaves, internals),
        })
    }

    /// Exports the records ordered by depth and index as JSON. Sample lists are left out.
    ///
    /// # Errors
    /// Fails if a record cannot be serialized.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.nodes())
    }
}
