//! Relational join: a set of structures, merged by identity

use rustc_hash::FxHashSet;

use crate::features::structure::ports::StructureOps;

/// Join set of one location
///
/// Membership is structural equality, which for blurred structures is
/// isomorphism. Iteration order is unspecified.
#[derive(Debug, Clone)]
pub struct RelationalSet<S: StructureOps> {
    members: FxHashSet<S>,
}

impl<S: StructureOps> Default for RelationalSet<S> {
    fn default() -> Self {
        Self {
            members: FxHashSet::default(),
        }
    }
}

impl<S: StructureOps> RelationalSet<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `structure` into the set
    ///
    /// Returns `None` when it is already subsumed, otherwise the delta
    /// (the structure itself).
    pub fn merge_with(&mut self, structure: S) -> Option<S> {
        if self.members.contains(&structure) {
            return None;
        }
        self.members.insert(structure.clone());
        Some(structure)
    }

    pub fn contains(&self, structure: &S) -> bool {
        self.members.contains(structure)
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.members.iter()
    }

    /// Remove and return every member
    pub fn drain(&mut self) -> Vec<S> {
        self.members.drain().collect()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Unit(u8);

    impl StructureOps for Unit {
        fn coerce(&mut self) -> bool {
            true
        }
        fn blur(&mut self) {}
        fn node_count(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_merge_returns_delta_once() {
        let mut set = RelationalSet::new();
        assert_eq!(set.merge_with(Unit(1)), Some(Unit(1)));
        assert_eq!(set.merge_with(Unit(1)), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_drain_empties() {
        let mut set = RelationalSet::new();
        set.merge_with(Unit(1));
        set.merge_with(Unit(2));
        let mut drained = set.drain();
        drained.sort_by_key(|u| u.0);
        assert_eq!(drained, vec![Unit(1), Unit(2)]);
        assert!(set.is_empty());
    }
}
