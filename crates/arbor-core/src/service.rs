//! # Tree Service
//!
//! The single mutation path of the engine, and the cached read path.
//!
//! Every mutation runs as:
//!
//! 1. acquire the partition lock(s) of every partition it touches
//! 2. validate fields; for a parent change, run `ReparentGuard` against the
//!    store's current structure inside the same write
//! 3. write through the `NodeStore`
//! 4. invalidate the cached forests of the touched partitions
//! 5. emit an audit event
//!
//! The lock is held from step 1 to step 4. Reads go store → `TreeBuilder`
//! through the cache and never take a partition lock.

use crate::cache::{CacheInvalidator, CacheKey, CacheStats, TreeView};
use crate::descendants::DescendantResolver;
use crate::guard::ReparentGuard;
use crate::lock::{PartitionGuard, PartitionLocks};
use crate::permission::Role;
use crate::primitives::{
    DEFAULT_BUILD_MAX_DEPTH, DEFAULT_DESCENDANT_MAX_DEPTH, MAX_TRAVERSAL_DEPTH, ROOT_OPTION_TITLE,
};
use crate::storage::StorageBackend;
use crate::store::{NodeStore, UpdateOutcome, check_parent};
use crate::tree::{FlatEntry, Forest, TreeBuilder};
use crate::validation::FieldValidator;
use crate::{ArborError, Node, NodeFields, NodeId, Partition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Depth limits of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Depth cap for forest builds.
    pub build_max_depth: usize,
    /// Default depth for `descendants` when the caller gives none.
    pub descendant_max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            build_max_depth: DEFAULT_BUILD_MAX_DEPTH,
            descendant_max_depth: DEFAULT_DESCENDANT_MAX_DEPTH,
        }
    }
}

// =============================================================================
// READ MODELS
// =============================================================================

/// One tab of the partition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTab {
    pub partition: Partition,
    /// Title of the partition's first active root.
    pub title: String,
    pub root: NodeId,
}

/// Counters for `status` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub node_count: usize,
    pub partition_count: usize,
    pub cache: CacheStats,
}

/// What an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuditAction {
    Add,
    Edit,
    Move,
    Delete,
    Enable,
    Disable,
    Sort,
}

impl AuditAction {
    const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Move => "move",
            Self::Delete => "delete",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Sort => "sort",
        }
    }
}

fn audit(action: AuditAction, node: &Node) {
    tracing::info!(
        target: "arbor::audit",
        event = %format!("{}_{}", node.kind().name(), action.name()),
        node = node.id.0,
        parent = node.parent_id.0,
        partition = %node.partition,
        title = %node.title,
        "tree mutation"
    );
}

// =============================================================================
// TREE SERVICE
// =============================================================================

/// Orchestrates store, locks, guard and cache.
///
/// Shareable across threads; wrap it in an `Arc`.
#[derive(Debug)]
pub struct TreeService<S: NodeStore = StorageBackend> {
    store: S,
    cache: CacheInvalidator,
    locks: PartitionLocks,
    config: TreeConfig,
}

impl<S: NodeStore> TreeService<S> {
    /// Create a service over a store.
    pub fn new(store: S, config: TreeConfig) -> Self {
        Self {
            store,
            cache: CacheInvalidator::default(),
            locks: PartitionLocks::new(),
            config,
        }
    }

    /// The underlying store (reads only; writes must go through the service).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Flat listing of a partition in `(order_key, id)` order.
    pub fn list(&self, partition: &Partition) -> Result<Vec<Node>, ArborError> {
        self.store.list_by_partition(partition)
    }

    /// Lookup a node, failing with `NotFound`.
    pub fn get(&self, id: NodeId) -> Result<Node, ArborError> {
        self.store.require(id)
    }

    /// The forest of a partition, from cache when possible.
    ///
    /// `include_inactive` selects the admin listing over the display tree.
    pub fn get_or_build(
        &self,
        partition: &Partition,
        include_inactive: bool,
    ) -> Result<Arc<Forest>, ArborError> {
        let key = CacheKey::new(
            partition.clone(),
            TreeView::from_include_inactive(include_inactive),
        );
        self.cache.get_or_build(key, || {
            let nodes = self.store.list_by_partition(partition)?;
            Ok(self.builder(include_inactive).build(&nodes))
        })
    }

    /// The display tree of a partition as `role` may see it.
    pub fn tree_for_role(&self, partition: &Partition, role: &Role) -> Result<Forest, ArborError> {
        let mut forest = Forest::clone(&*self.get_or_build(partition, false)?);
        forest.retain_accessible(role);
        Ok(forest)
    }

    /// All descendant ids of `id`, down to `max_depth` levels.
    ///
    /// Uses the configured default when `max_depth` is `None`; larger values
    /// are clamped to `MAX_TRAVERSAL_DEPTH`.
    pub fn descendants(
        &self,
        id: NodeId,
        max_depth: Option<usize>,
    ) -> Result<BTreeSet<NodeId>, ArborError> {
        self.store.require(id)?;
        let depth = max_depth
            .unwrap_or(self.config.descendant_max_depth)
            .min(MAX_TRAVERSAL_DEPTH);
        let index = self.store.child_index()?;
        Ok(DescendantResolver::new(&index).descendants(id, depth))
    }

    /// Dry-run a reparent without writing.
    pub fn validate_reparent(&self, id: NodeId, new_parent: NodeId) -> Result<(), ArborError> {
        let node = self.store.require(id)?;
        let index = self.store.child_index()?;
        ReparentGuard::validate(&index, id, new_parent)?;

        let parent = self.store.get(new_parent)?;
        check_parent(&node.to_fields().with_parent(new_parent), parent.as_ref())
    }

    /// Parent-picker rows: the root entry followed by the active tree with
    /// `exclude` and its descendants removed.
    pub fn parent_options(
        &self,
        partition: &Partition,
        exclude: Option<NodeId>,
    ) -> Result<Vec<FlatEntry>, ArborError> {
        let forest = self.get_or_build(partition, false)?;
        let mut options = vec![FlatEntry {
            id: NodeId::ROOT,
            parent_id: NodeId::ROOT,
            depth: 0,
            title: ROOT_OPTION_TITLE.to_string(),
        }];
        options.extend(forest.flatten_excluding(exclude));
        Ok(options)
    }

    /// One tab per partition that has an active root node.
    pub fn partitions(&self) -> Result<Vec<PartitionTab>, ArborError> {
        let mut first_roots: BTreeMap<Partition, Node> = BTreeMap::new();
        for node in self.store.list_all()? {
            if !node.parent_id.is_root() || !node.active {
                continue;
            }
            let replace = first_roots
                .get(&node.partition)
                .is_none_or(|current| node.sort_key() < current.sort_key());
            if replace {
                first_roots.insert(node.partition.clone(), node);
            }
        }

        Ok(first_roots
            .into_iter()
            .map(|(partition, root)| PartitionTab {
                partition,
                title: root.title,
                root: root.id,
            })
            .collect())
    }

    /// Node and cache counters.
    pub fn status(&self) -> Result<ServiceStatus, ArborError> {
        let nodes = self.store.list_all()?;
        let partitions: BTreeSet<&Partition> = nodes.iter().map(|n| &n.partition).collect();
        Ok(ServiceStatus {
            node_count: nodes.len(),
            partition_count: partitions.len(),
            cache: self.cache.stats(),
        })
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Create a node.
    pub fn create(&self, fields: NodeFields) -> Result<Node, ArborError> {
        let fields = FieldValidator::validate(fields)?;
        let partition = fields.partition.clone();

        let _guard = self.locks.acquire([partition.clone()]);
        let node = self.store.create(fields)?;
        self.cache.invalidate(&partition);

        audit(AuditAction::Add, &node);
        Ok(node)
    }

    /// Overwrite every field of a node.
    ///
    /// A parent change is cycle-checked; a partition change moves the subtree.
    pub fn update(&self, id: NodeId, fields: NodeFields) -> Result<UpdateOutcome, ArborError> {
        let fields = FieldValidator::validate(fields)?;

        let (_guard, _) = self.lock_nodes(&[id], Some(&fields.partition))?;
        let outcome = self.store.update(id, fields)?;
        for partition in outcome.touched_partitions() {
            self.cache.invalidate(&partition);
        }

        audit(AuditAction::Edit, &outcome.node);
        if outcome.previous.parent_id != outcome.node.parent_id {
            audit(AuditAction::Move, &outcome.node);
        }
        if !outcome.moved.is_empty() {
            tracing::info!(
                target: "arbor::audit",
                node = id.0,
                from = %outcome.previous.partition,
                to = %outcome.node.partition,
                moved = outcome.moved.len(),
                "subtree moved to new partition"
            );
        }
        Ok(outcome)
    }

    /// Change only the parent of a node.
    pub fn reparent(&self, id: NodeId, new_parent: NodeId) -> Result<UpdateOutcome, ArborError> {
        let (_guard, locked) = self.lock_nodes(&[id], None)?;
        let fields = locked
            .first()
            .map(|n| n.to_fields().with_parent(new_parent))
            .ok_or(ArborError::NotFound(id))?;

        let outcome = self.store.update(id, fields)?;
        self.cache.invalidate(&outcome.node.partition);

        if outcome.previous.parent_id != outcome.node.parent_id {
            audit(AuditAction::Move, &outcome.node);
        }
        Ok(outcome)
    }

    /// Delete a leaf node.
    pub fn delete(&self, id: NodeId) -> Result<Node, ArborError> {
        let (_guard, _) = self.lock_nodes(&[id], None)?;
        let node = self.store.delete(id)?;
        self.cache.invalidate(&node.partition);

        audit(AuditAction::Delete, &node);
        Ok(node)
    }

    /// Enable or disable several nodes at once.
    pub fn set_active(&self, ids: &[NodeId], active: bool) -> Result<Vec<Node>, ArborError> {
        FieldValidator::validate_ids(ids)?;

        let (guard, _) = self.lock_nodes(ids, None)?;
        let updated = self.store.set_active(ids, active)?;
        for partition in guard.partitions() {
            self.cache.invalidate(partition);
        }
        drop(guard);

        let action = if active {
            AuditAction::Enable
        } else {
            AuditAction::Disable
        };
        for node in &updated {
            audit(action, node);
        }
        Ok(updated)
    }

    /// Assign `order_key = position + 1` following `ids`.
    pub fn reorder(&self, partition: &Partition, ids: &[NodeId]) -> Result<(), ArborError> {
        let _guard = self.locks.acquire([partition.clone()]);
        self.store.reorder(partition, ids)?;
        self.cache.invalidate(partition);

        tracing::info!(
            target: "arbor::audit",
            event = "tree_sort",
            action = AuditAction::Sort.name(),
            partition = %partition,
            count = ids.len(),
            "tree mutation"
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn builder(&self, include_inactive: bool) -> TreeBuilder {
        TreeBuilder::new()
            .with_max_depth(self.config.build_max_depth)
            .include_inactive(include_inactive)
    }

    /// Lock the partitions of `ids` (plus `extra`), returning the nodes as
    /// read under the lock.
    ///
    /// A node can change partition between the unlocked read and the lock, so
    /// the partitions are re-read under the lock and the acquisition retried
    /// until they agree.
    fn lock_nodes(
        &self,
        ids: &[NodeId],
        extra: Option<&Partition>,
    ) -> Result<(PartitionGuard<'_>, Vec<Node>), ArborError> {
        let mut wanted = self.partitions_of(ids, extra)?.0;
        loop {
            let guard = self.locks.acquire(wanted.iter().cloned());
            let (current, nodes) = self.partitions_of(ids, extra)?;
            if current == wanted {
                return Ok((guard, nodes));
            }
            drop(guard);
            wanted = current;
        }
    }

    fn partitions_of(
        &self,
        ids: &[NodeId],
        extra: Option<&Partition>,
    ) -> Result<(BTreeSet<Partition>, Vec<Node>), ArborError> {
        let nodes = ids
            .iter()
            .map(|&id| self.store.require(id))
            .collect::<Result<Vec<_>, _>>()?;
        let partitions = nodes
            .iter()
            .map(|n| n.partition.clone())
            .chain(extra.cloned())
            .collect();
        Ok((partitions, nodes))
    }
}

impl<S: NodeStore + Default> Default for TreeService<S> {
    fn default() -> Self {
        Self::new(S::default(), TreeConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
