//! # Descendant Resolution
//!
//! Breadth-first descendant queries over an in-memory child index.
//!
//! The index is built once per call from a flat node listing; no query ever
//! goes back to storage per level. A `visited` set makes the walk terminate
//! even when stored data already contains a cycle.

use crate::{Node, NodeId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// CHILD INDEX
// =============================================================================

/// Adjacency map `parent -> children`, spanning every partition.
///
/// Children are kept in ascending id order for deterministic traversal.
/// Self-parented rows are recorded as nodes but never as their own child.
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    children: BTreeMap<NodeId, Vec<NodeId>>,
    parents: BTreeMap<NodeId, NodeId>,
}

impl ChildIndex {
    /// Build the index from a node listing.
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a Node>,
    {
        Self::from_links(nodes.into_iter().map(|n| (n.id, n.parent_id)))
    }

    /// Build the index from `(id, parent_id)` pairs.
    pub fn from_links<I>(links: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let mut index = Self::default();
        for (id, parent) in links {
            index.parents.insert(id, parent);
            if !parent.is_root() && parent != id {
                index.children.entry(parent).or_default().push(id);
            }
        }
        for kids in index.children.values_mut() {
            kids.sort();
            kids.dedup();
        }
        index
    }

    /// Direct children of a node (any partition, any active state).
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any node points at `id` as its parent.
    #[must_use]
    pub fn has_children(&self, id: NodeId) -> bool {
        !self.children(id).is_empty()
    }

    /// Whether `id` is a known node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.parents.contains_key(&id)
    }

    /// Declared parent of a known node.
    #[must_use]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Number of indexed nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether the index holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

// =============================================================================
// DESCENDANT RESOLVER
// =============================================================================

/// Result of a bounded descendant walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descendants {
    /// Every descendant id found; never contains the start node.
    pub ids: BTreeSet<NodeId>,
    /// Whether expansion stopped at the depth cap with unvisited children left.
    pub truncated: bool,
}

/// Computes descendant sets over a `ChildIndex`.
#[derive(Debug, Clone, Copy)]
pub struct DescendantResolver<'a> {
    index: &'a ChildIndex,
}

impl<'a> DescendantResolver<'a> {
    /// Create a resolver over an index.
    #[must_use]
    pub const fn new(index: &'a ChildIndex) -> Self {
        Self { index }
    }

    /// All descendant ids of `id`, down to `max_depth` levels.
    ///
    /// Returns an empty set if `id` has no children. Levels past `max_depth`
    /// are silently dropped.
    #[must_use]
    pub fn descendants(&self, id: NodeId, max_depth: usize) -> BTreeSet<NodeId> {
        self.resolve(id, max_depth).ids
    }

    /// Like `descendants`, also reporting whether the depth cap was hit.
    #[must_use]
    pub fn resolve(&self, id: NodeId, max_depth: usize) -> Descendants {
        let mut visited = BTreeSet::new();
        let mut ids = BTreeSet::new();
        let mut queue = VecDeque::new();
        let mut truncated = false;

        visited.insert(id);
        queue.push_back((id, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            let kids = self.index.children(current);

            if depth >= max_depth {
                if kids.iter().any(|k| !visited.contains(k)) {
                    truncated = true;
                }
                continue;
            }

            for &child in kids {
                if visited.insert(child) {
                    ids.insert(child);
                    queue.push_back((child, depth.saturating_add(1)));
                }
            }
        }

        if truncated {
            tracing::debug!(
                node = id.0,
                max_depth,
                found = ids.len(),
                "descendant walk truncated at depth cap"
            );
        }

        Descendants { ids, truncated }
    }

    /// Whether `candidate` lies anywhere below `id`.
    ///
    /// Uses a depth bound equal to the index size, which no acyclic chain can
    /// exceed, so the answer is exact.
    #[must_use]
    pub fn is_descendant(&self, id: NodeId, candidate: NodeId) -> bool {
        self.descendants(id, self.index.len()).contains(&candidate)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn links(pairs: &[(u64, u64)]) -> ChildIndex {
        ChildIndex::from_links(pairs.iter().map(|&(id, p)| (NodeId(id), NodeId(p))))
    }

    fn set(ids: &[u64]) -> BTreeSet<NodeId> {
        ids.iter().map(|&i| NodeId(i)).collect()
    }

    #[test]
    fn leaf_has_no_descendants() {
        let index = links(&[(1, 0), (2, 1)]);
        let resolver = DescendantResolver::new(&index);
        assert!(resolver.descendants(NodeId(2), 10).is_empty());
    }

    #[test]
    fn chain_resolves_all_levels() {
        let index = links(&[(1, 0), (2, 1), (3, 2), (4, 3)]);
        let resolver = DescendantResolver::new(&index);
        assert_eq!(resolver.descendants(NodeId(1), 10), set(&[2, 3, 4]));
    }

    #[test]
    fn depth_cap_truncates_silently() {
        let index = links(&[(1, 0), (2, 1), (3, 2), (4, 3)]);
        let resolver = DescendantResolver::new(&index);

        let result = resolver.resolve(NodeId(1), 2);
        assert_eq!(result.ids, set(&[2, 3]));
        assert!(result.truncated);

        let zero = resolver.resolve(NodeId(1), 0);
        assert!(zero.ids.is_empty());
        assert!(zero.truncated);
    }

    #[test]
    fn stored_cycle_terminates_without_start_node() {
        // 1 -> 2 -> 3 -> 1 (corrupted)
        let index = links(&[(1, 3), (2, 1), (3, 2)]);
        let resolver = DescendantResolver::new(&index);

        let result = resolver.resolve(NodeId(1), 50);
        assert_eq!(result.ids, set(&[2, 3]));
        assert!(!result.truncated);
    }

    #[test]
    fn self_parent_is_not_its_own_descendant() {
        let index = links(&[(5, 5)]);
        let resolver = DescendantResolver::new(&index);
        assert!(resolver.descendants(NodeId(5), 10).is_empty());
        assert!(!index.has_children(NodeId(5)));
    }

    #[test]
    fn is_descendant_ignores_default_cap() {
        let pairs: Vec<(u64, u64)> = (1..=30).map(|i| (i, i - 1)).collect();
        let index = links(&pairs);
        let resolver = DescendantResolver::new(&index);

        assert!(!resolver.descendants(NodeId(1), 10).contains(&NodeId(30)));
        assert!(resolver.is_descendant(NodeId(1), NodeId(30)));
    }

    #[test]
    fn index_answers_structure_queries() {
        let index = links(&[(1, 0), (2, 1), (3, 1)]);
        assert_eq!(index.children(NodeId(1)), &[NodeId(2), NodeId(3)]);
        assert!(index.has_children(NodeId(1)));
        assert!(!index.has_children(NodeId(3)));
        assert_eq!(index.parent_of(NodeId(3)), Some(NodeId(1)));
        assert!(!index.contains(NodeId(0)));
        assert_eq!(index.len(), 3);
    }
}
