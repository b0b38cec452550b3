//! # Tree Builder
//!
//! Assembles a flat, partition-scoped node listing into an ordered forest.
//!
//! Building a display tree never fails on bad data. Duplicated rows, chains
//! deeper than the depth cap, promoted orphans and rows unreachable from any
//! root are reported as `IntegrityWarning`s and the affected branch is omitted.

use crate::primitives::{DEFAULT_BUILD_MAX_DEPTH, MAX_TRAVERSAL_DEPTH};
use crate::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// FOREST TYPES
// =============================================================================

/// A node placed in a forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub node: Node,
    /// Roots are depth 0.
    pub depth: usize,
    /// Children in ascending `(order_key, id)` order.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree, itself included.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// Non-fatal data problem found while building a forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityWarning {
    /// The same id appeared more than once; later occurrences were dropped.
    DuplicateNode { id: NodeId },
    /// The node sits at or past the depth cap; it and its subtree were dropped.
    ///
    /// Only the head of the truncated branch is reported; `dropped` counts
    /// the descendants removed with it.
    DepthExceeded {
        id: NodeId,
        depth: usize,
        max_depth: usize,
        dropped: usize,
    },
    /// The declared parent is not in the listing; the node was made a root.
    OrphanPromoted { id: NodeId, parent_id: NodeId },
    /// No root leads to this node (cycle or self-parent); it was dropped.
    Unreachable { id: NodeId },
}

/// One row of a flattened forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatEntry {
    pub id: NodeId,
    pub parent_id: NodeId,
    pub depth: usize,
    pub title: String,
}

/// An ordered collection of root trees plus the warnings raised building it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forest {
    pub roots: Vec<TreeNode>,
    pub warnings: Vec<IntegrityWarning>,
}

impl Forest {
    /// Total number of placed nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(TreeNode::size).sum()
    }

    /// Find a placed node by id.
    #[must_use]
    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        let mut stack: Vec<&TreeNode> = self.roots.iter().rev().collect();
        while let Some(current) = stack.pop() {
            if current.node.id == id {
                return Some(current);
            }
            stack.extend(current.children.iter().rev());
        }
        None
    }

    /// Whether a node was placed.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }

    /// Placed ids in pre-order.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.flatten().into_iter().map(|e| e.id).collect()
    }

    /// Pre-order rows with their depth.
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatEntry> {
        self.flatten_excluding(None)
    }

    /// Pre-order rows, skipping `exclude` and its whole subtree.
    #[must_use]
    pub fn flatten_excluding(&self, exclude: Option<NodeId>) -> Vec<FlatEntry> {
        let mut out = Vec::new();
        let mut stack: Vec<&TreeNode> = self.roots.iter().rev().collect();
        while let Some(current) = stack.pop() {
            if Some(current.node.id) == exclude {
                continue;
            }
            out.push(FlatEntry {
                id: current.node.id,
                parent_id: current.node.parent_id,
                depth: current.depth,
                title: current.node.title.clone(),
            });
            stack.extend(current.children.iter().rev());
        }
        out
    }

    /// Drop every node failing `keep`, together with its subtree.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: Fn(&Node) -> bool,
    {
        retain_nodes(&mut self.roots, &keep);
    }
}

fn retain_nodes<F>(nodes: &mut Vec<TreeNode>, keep: &F)
where
    F: Fn(&Node) -> bool,
{
    nodes.retain(|t| keep(&t.node));
    for t in nodes.iter_mut() {
        retain_nodes(&mut t.children, keep);
    }
}

// =============================================================================
// TREE BUILDER
// =============================================================================

/// Converts flat node listings into forests.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder {
    max_depth: usize,
    include_inactive: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_BUILD_MAX_DEPTH,
            include_inactive: false,
        }
    }
}

/// Grouped view of the listing shared by the recursive attach step.
struct Layout<'a> {
    children: BTreeMap<NodeId, Vec<&'a Node>>,
}

impl TreeBuilder {
    /// Builder with the default depth cap that hides inactive nodes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the depth cap, clamped to `MAX_TRAVERSAL_DEPTH`.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(MAX_TRAVERSAL_DEPTH);
        self
    }

    /// Keep inactive nodes (admin listing) or hide them with their subtrees.
    #[must_use]
    pub fn include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    /// The effective depth cap.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Assemble a forest.
    ///
    /// Roots are nodes whose parent is `NodeId::ROOT` or absent from `nodes`.
    /// Siblings come out in ascending `(order_key, id)` order whatever the
    /// input order.
    #[must_use]
    pub fn build(&self, nodes: &[Node]) -> Forest {
        let mut ordered: Vec<&Node> = nodes.iter().collect();
        ordered.sort_by_key(|n| n.sort_key());

        let known: BTreeSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let mut warnings = Vec::new();
        let mut roots = Vec::new();
        let mut layout = Layout {
            children: BTreeMap::new(),
        };

        for node in ordered {
            if node.parent_id.is_root() {
                roots.push(node);
            } else if !known.contains(&node.parent_id) {
                warnings.push(IntegrityWarning::OrphanPromoted {
                    id: node.id,
                    parent_id: node.parent_id,
                });
                roots.push(node);
            } else {
                layout.children.entry(node.parent_id).or_default().push(node);
            }
        }

        let mut seen = BTreeSet::new();
        let mut placed = Vec::with_capacity(roots.len());
        for root in roots {
            if let Some(tree) = self.attach(root, 0, &layout, &mut seen, &mut warnings) {
                placed.push(tree);
            }
        }

        let mut unreachable = BTreeSet::new();
        for node in nodes {
            if !seen.contains(&node.id) && unreachable.insert(node.id) {
                warnings.push(IntegrityWarning::Unreachable { id: node.id });
            }
        }

        for warning in &warnings {
            tracing::warn!(?warning, "tree integrity warning");
        }

        let mut forest = Forest {
            roots: placed,
            warnings,
        };
        if !self.include_inactive {
            forest.retain(|n| n.active);
        }
        forest
    }

    fn attach(
        &self,
        node: &Node,
        depth: usize,
        layout: &Layout<'_>,
        seen: &mut BTreeSet<NodeId>,
        warnings: &mut Vec<IntegrityWarning>,
    ) -> Option<TreeNode> {
        if !seen.insert(node.id) {
            warnings.push(IntegrityWarning::DuplicateNode { id: node.id });
            return None;
        }

        if depth >= self.max_depth {
            let dropped = mark_subtree(node.id, layout, seen);
            warnings.push(IntegrityWarning::DepthExceeded {
                id: node.id,
                depth,
                max_depth: self.max_depth,
                dropped,
            });
            return None;
        }

        let children = layout
            .children
            .get(&node.id)
            .map(|kids| {
                kids.iter()
                    .filter_map(|child| {
                        self.attach(child, depth.saturating_add(1), layout, seen, warnings)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(TreeNode {
            node: node.clone(),
            depth,
            children,
        })
    }
}

/// Mark everything below `id` as seen without building it, so truncated
/// branches are not reported a second time as unreachable. Returns the
/// number of nodes marked.
fn mark_subtree(id: NodeId, layout: &Layout<'_>, seen: &mut BTreeSet<NodeId>) -> usize {
    let mut marked = 0usize;
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if let Some(kids) = layout.children.get(&current) {
            for kid in kids {
                if seen.insert(kid.id) {
                    marked = marked.saturating_add(1);
                    stack.push(kid.id);
                }
            }
        }
    }
    marked
}

// =============================================================================
// TESTS
// =============================================================================
