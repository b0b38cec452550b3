//! # Reparent Guard
//!
//! Rejects parent reassignments that would form a cycle, before anything is
//! written. Callers must hold the partition lock across `validate` and the
//! subsequent write (see `lock::PartitionLocks`).

use crate::descendants::{ChildIndex, DescendantResolver};
use crate::{ArborError, NodeId};

/// Validates proposed `(node, new_parent)` pairs.
pub struct ReparentGuard;

impl ReparentGuard {
    /// Check a proposed move against the current structure.
    ///
    /// Rules, in order:
    /// 1. a node cannot be its own parent
    /// 2. moving to root is always allowed
    /// 3. a node cannot move under any of its descendants
    ///
    /// The descendant walk in rule 3 is bounded by the index size rather than
    /// the default descendant depth, so arbitrarily deep chains are covered.
    pub fn validate(index: &ChildIndex, node: NodeId, new_parent: NodeId) -> Result<(), ArborError> {
        if new_parent == node {
            return Err(ArborError::Cycle("a node cannot be its own parent".into()));
        }

        if new_parent.is_root() {
            return Ok(());
        }

        if DescendantResolver::new(index).is_descendant(node, new_parent) {
            return Err(ArborError::Cycle(
                "cannot move a node under its own descendant".into(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
