use std::collections::{hash_map, HashMap};

use rayon::{collections::hash_map::Iter as ParIter, prelude::*};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// A masked identifier set.
///
/// Maps the marshaled masked point of an identifier to the index of the identifier in the
/// sequence of its owner. Sets are never mutated, every masking step derives a new one.
pub struct EncSet(HashMap<Vec<u8>, usize>);

impl EncSet {
    /// Builds a set from `(masked point, index)` pairs. Later pairs replace earlier ones with the
    /// same point.
    pub fn from_entries(entries: impl IntoIterator<Item = (Vec<u8>, usize)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Gets the `(masked point, index)` pairs for transport, ordered by index.
    pub fn into_entries(self) -> Vec<(Vec<u8>, usize)> {
        let mut entries = self.0.into_iter().collect::<Vec<_>>();
        entries.sort_unstable_by_key(|(_, index)| *index);
        entries
    }

    /// Gets the number of masked points.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks whether the masked point is in the set.
    pub fn contains(&self, point: &[u8]) -> bool {
        self.0.contains_key(point)
    }

    /// Gets the index associated with the masked point.
    pub fn index_of(&self, point: &[u8]) -> Option<usize> {
        self.0.get(point).copied()
    }

    /// Iterates over the `(masked point, index)` pairs in arbitrary order.
    pub fn iter(&self) -> hash_map::Iter<'_, Vec<u8>, usize> {
        self.0.iter()
    }

    /// Iterates in parallel over the `(masked point, index)` pairs.
    pub fn par_iter(&self) -> ParIter<'_, Vec<u8>, usize> {
        self.0.par_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries() {
        let set = EncSet::from_entries(vec![
            (vec![3], 2),
            (vec![1], 0),
            (vec![2], 1),
            (vec![1], 5),
        ]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.index_of(&[1]), Some(5));
        assert!(!set.contains(&[4]));
        assert_eq!(
            set.into_entries(),
            vec![(vec![2], 1), (vec![3], 2), (vec![1], 5)],
        );
        assert!(EncSet::default().is_empty());
    }
}
