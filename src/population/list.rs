//! Ordered, duplicate-permitting individual lists.

use std::fmt;
use std::sync::Arc;

use super::individual::Individual;
use crate::random::RandomSource;

/// Shared handle to an individual held by a list.
pub type IndividualRef<G> = Arc<Individual<G>>;

/// An ordered multiset of individuals.
///
/// Lists hold shared handles, so [`Clone`] is a shallow copy: both lists
/// refer to the same individuals. Identity (for [`contains`](Self::contains)
/// and [`multiplicity`](Self::multiplicity)) is pointer identity.
///
/// A list handed out by its owner (in an event, or as an operator output)
/// is a snapshot; keep a clone if you need it past the current call.
pub struct IndividualList<G> {
    members: Vec<IndividualRef<G>>,
}

impl<G> IndividualList<G> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Creates an empty list with room for `capacity` members.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: Vec::with_capacity(capacity),
        }
    }

    /// Wraps owned individuals into a list.
    pub fn from_individuals(individuals: Vec<Individual<G>>) -> Self {
        individuals.into_iter().map(Arc::new).collect()
    }

    /// Concatenates lists in order.
    pub fn concat<'a, I>(lists: I) -> Self
    where
        I: IntoIterator<Item = &'a IndividualList<G>>,
        G: 'a,
    {
        let mut out = Self::new();
        for list in lists {
            out.extend_from(list);
        }
        out
    }

    /// Number of members (counting duplicates).
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member at `index`.
    pub fn get(&self, index: usize) -> Option<&IndividualRef<G>> {
        self.members.get(index)
    }

    /// Iterates over members in order.
    pub fn iter(&self) -> std::slice::Iter<'_, IndividualRef<G>> {
        self.members.iter()
    }

    /// Members as a slice.
    pub fn as_slice(&self) -> &[IndividualRef<G>] {
        &self.members
    }

    /// Appends an owned individual.
    pub fn push(&mut self, individual: Individual<G>) {
        self.members.push(Arc::new(individual));
    }

    /// Appends a shared individual.
    pub fn push_ref(&mut self, individual: IndividualRef<G>) {
        self.members.push(individual);
    }

    /// Appends all members of `other`.
    pub fn extend_from(&mut self, other: &IndividualList<G>) {
        self.members.extend(other.members.iter().cloned());
    }

    /// Removes and returns the member at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<IndividualRef<G>> {
        (index < self.members.len()).then(|| self.members.remove(index))
    }

    /// Removes the first occurrence of `individual`. Returns `true` if found.
    pub fn remove_one(&mut self, individual: &IndividualRef<G>) -> bool {
        match self.position(individual) {
            Some(i) => {
                self.members.remove(i);
                true
            }
            None => false,
        }
    }

    /// Removes the members at the given positions.
    ///
    /// Out-of-range and repeated positions are ignored.
    pub fn remove_positions(&mut self, positions: &[usize]) {
        let mut drop = vec![false; self.members.len()];
        for &p in positions {
            if let Some(flag) = drop.get_mut(p) {
                *flag = true;
            }
        }
        let mut i = 0;
        self.members.retain(|_| {
            let keep = !drop[i];
            i += 1;
            keep
        });
    }

    /// Members at the given positions, in the given order.
    pub fn pick(&self, positions: &[usize]) -> Self {
        positions
            .iter()
            .filter_map(|&p| self.members.get(p).cloned())
            .collect()
    }

    /// Position of the first occurrence of `individual`.
    pub fn position(&self, individual: &IndividualRef<G>) -> Option<usize> {
        self.members.iter().position(|m| Arc::ptr_eq(m, individual))
    }

    /// Returns `true` if `individual` is a member.
    pub fn contains(&self, individual: &IndividualRef<G>) -> bool {
        self.position(individual).is_some()
    }

    /// Number of times `individual` occurs.
    pub fn multiplicity(&self, individual: &IndividualRef<G>) -> usize {
        self.members.iter().filter(|m| Arc::ptr_eq(m, individual)).count()
    }

    /// A uniformly random member, or `None` if empty.
    pub fn random_individual(&self, rng: &mut RandomSource) -> Option<&IndividualRef<G>> {
        if self.members.is_empty() {
            return None;
        }
        self.members.get(rng.index(self.members.len()))
    }

    /// `k` members drawn uniformly without repeating a position.
    ///
    /// Returns the whole list (in order) when `k >= len`.
    pub fn random_subset(&self, k: usize, rng: &mut RandomSource) -> Self {
        let n = self.members.len();
        if k >= n {
            return self.clone();
        }
        // Partial Fisher-Yates over positions.
        let mut positions: Vec<usize> = (0..n).collect();
        for i in 0..k {
            let j = i + rng.index(n - i);
            positions.swap(i, j);
        }
        self.pick(&positions[..k])
    }

    /// Consumes the list, returning its members.
    pub fn into_vec(self) -> Vec<IndividualRef<G>> {
        self.members
    }
}

impl<G> Clone for IndividualList<G> {
    fn clone(&self) -> Self {
        Self {
            members: self.members.clone(),
        }
    }
}

impl<G> Default for IndividualList<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: fmt::Debug> fmt::Debug for IndividualList<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.members.iter()).finish()
    }
}

impl<G> FromIterator<IndividualRef<G>> for IndividualList<G> {
    fn from_iter<I: IntoIterator<Item = IndividualRef<G>>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl<G> From<Vec<IndividualRef<G>>> for IndividualList<G> {
    fn from(members: Vec<IndividualRef<G>>) -> Self {
        Self { members }
    }
}

impl<'a, G> IntoIterator for &'a IndividualList<G> {
    type Item = &'a IndividualRef<G>;
    type IntoIter = std::slice::Iter<'a, IndividualRef<G>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl<G> IntoIterator for IndividualList<G> {
    type Item = IndividualRef<G>;
    type IntoIter = std::vec::IntoIter<IndividualRef<G>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(values: &[i32]) -> IndividualList<i32> {
        IndividualList::from_individuals(values.iter().map(|&v| Individual::new(v, 0)).collect())
    }

    #[test]
    fn test_clone_is_shallow() {
        let a = list_of(&[1, 2]);
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.as_slice()[0], &b.as_slice()[0]));
    }

    #[test]
    fn test_duplicates_and_multiplicity() {
        let mut list = list_of(&[1, 2]);
        let first = list.get(0).cloned().unwrap();
        list.push_ref(first.clone());
        assert_eq!(list.len(), 3);
        assert_eq!(list.multiplicity(&first), 2);

        assert!(list.remove_one(&first));
        assert_eq!(list.multiplicity(&first), 1);
        assert_eq!(list.position(&first), Some(1));
    }

    #[test]
    fn test_equal_genotypes_are_distinct_members() {
        let list = list_of(&[3, 3]);
        let a = list.get(0).cloned().unwrap();
        assert_eq!(list.multiplicity(&a), 1);
    }

    #[test]
    fn test_remove_positions() {
        let mut list = list_of(&[10, 11, 12, 13]);
        list.remove_positions(&[3, 1, 1, 99]);
        let left: Vec<i32> = list.iter().map(|i| *i.genotype()).collect();
        assert_eq!(left, vec![10, 12]);
    }

    #[test]
    fn test_random_subset_has_no_repeated_positions() {
        let list = list_of(&[0, 1, 2, 3, 4, 5, 6, 7]);
        let mut rng = RandomSource::new(11);
        let sub = list.random_subset(5, &mut rng);
        assert_eq!(sub.len(), 5);
        for m in &sub {
            assert_eq!(sub.multiplicity(m), 1);
            assert!(list.contains(m));
        }
        assert_eq!(list.random_subset(20, &mut rng).len(), 8);
    }

    #[test]
    fn test_random_individual_on_empty() {
        let list: IndividualList<i32> = IndividualList::new();
        let mut rng = RandomSource::new(1);
        assert!(list.random_individual(&mut rng).is_none());
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = list_of(&[1, 2]);
        let b = list_of(&[3]);
        let c = IndividualList::concat([&a, &b]);
        let values: Vec<i32> = c.iter().map(|i| *i.genotype()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
