//! # Property-Based Tests
//!
//! Structural invariants under random inputs, using proptest.

use arbor_core::{
    ChildIndex, DescendantResolver, MemoryStore, Node, NodeFields, NodeId, NodeStore, Partition,
    TreeBuilder, TreeService,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Walk parent pointers from `id`; `None` if a cycle is found.
fn root_path_len(nodes: &[Node], id: NodeId) -> Option<usize> {
    let mut seen = BTreeSet::new();
    let mut current = id;
    while !current.is_root() {
        if !seen.insert(current) {
            return None;
        }
        current = nodes.iter().find(|n| n.id == current)?.parent_id;
    }
    Some(seen.len())
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Any sequence of accepted reparents leaves the parent graph acyclic.
    #[test]
    fn accepted_moves_keep_forest_acyclic(
        size in 2usize..12,
        moves in vec((0usize..12, 0usize..13), 1..40)
    ) {
        let svc = TreeService::<MemoryStore>::default();
        let ids: Vec<NodeId> = (0..size)
            .map(|i| {
                svc.create(NodeFields::menu("admin", format!("n{}", i), NodeId::ROOT))
                    .expect("create")
                    .id
            })
            .collect();

        for (node, parent) in moves {
            let node = ids[node % size];
            // an index past the last node stands for the root
            let parent = ids.get(parent).copied().unwrap_or(NodeId::ROOT);
            let _ = svc.reparent(node, parent);
        }

        let nodes = svc.store().list_all().expect("list");
        for node in &nodes {
            prop_assert!(root_path_len(&nodes, node.id).is_some());

            let below = svc.descendants(node.id, Some(nodes.len())).expect("descendants");
            prop_assert!(!below.contains(&node.id));
        }

        let forest = svc.get_or_build(&Partition::new("admin"), true).expect("tree");
        prop_assert_eq!(forest.node_count(), size);
        prop_assert!(forest.warnings.is_empty());
    }

    /// Every placed sibling list is sorted by (order_key, id).
    #[test]
    fn siblings_always_sorted(
        entries in vec((0i64..5, 0usize..20), 1..30)
    ) {
        let nodes: Vec<Node> = entries
            .iter()
            .enumerate()
            .map(|(i, &(order, parent))| {
                let id = i as u64 + 1;
                // parents only point backwards, so the input is acyclic
                let parent = if parent < i { NodeId(parent as u64 + 1) } else { NodeId::ROOT };
                Node::from_fields(
                    NodeId(id),
                    NodeFields::menu("admin", format!("n{}", id), parent).with_order(order),
                )
            })
            .collect();

        let forest = TreeBuilder::new().include_inactive(true).build(&nodes);
        prop_assert_eq!(forest.node_count(), nodes.len());

        let mut levels = vec![&forest.roots];
        while let Some(level) = levels.pop() {
            let keys: Vec<_> = level.iter().map(|t| t.node.sort_key()).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            prop_assert_eq!(keys, sorted);
            levels.extend(level.iter().map(|t| &t.children));
        }
    }

    /// Resolution terminates on arbitrary (possibly cyclic) parent links and
    /// never returns the start node.
    #[test]
    fn descendants_terminate_on_corrupt_links(
        links in vec((1u64..30, 0u64..30), 1..60),
        start in 1u64..30,
        depth in 0usize..40
    ) {
        let index = ChildIndex::from_links(links.into_iter().map(|(id, p)| (NodeId(id), NodeId(p))));
        let result = DescendantResolver::new(&index).resolve(NodeId(start), depth);

        prop_assert!(!result.ids.contains(&NodeId(start)));
        prop_assert!(result.ids.len() < 30);
    }

    /// Building never panics and places each id at most once.
    #[test]
    fn build_places_each_id_once(
        links in vec((1u64..20, 0u64..20, any::<bool>()), 0..40)
    ) {
        let nodes: Vec<Node> = links
            .iter()
            .map(|&(id, parent, active)| {
                Node::from_fields(
                    NodeId(id),
                    NodeFields::menu("admin", format!("n{}", id), NodeId(parent)).with_active(active),
                )
            })
            .collect();

        let forest = TreeBuilder::new().build(&nodes);
        let ids = forest.ids();
        let unique: BTreeSet<_> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }
}

#[test]
fn memory_store_matches_builder_order() {
    let store = MemoryStore::new();
    for (title, order) in [("c", 3), ("a", 1), ("b", 2)] {
        store
            .create(NodeFields::menu("admin", title, NodeId::ROOT).with_order(order))
            .expect("create");
    }
    let listed = store.list_by_partition(&Partition::new("admin")).expect("list");
    let forest = TreeBuilder::new().build(&listed);
    let titles: Vec<_> = forest.roots.iter().map(|t| t.node.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
}
