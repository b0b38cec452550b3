//! # Node Store
//!
//! Flat CRUD over the node table, scoped by partition.
//!
//! This module defines the `NodeStore` trait, the write-planning rules every
//! backend shares, and `MemoryStore`, the in-memory backend. The disk-backed
//! backend lives in `storage::RedbStore`.
//!
//! Every write validates completely before it touches data, so a rejected
//! mutation leaves the store unchanged.

use crate::descendants::{ChildIndex, DescendantResolver};
use crate::guard::ReparentGuard;
use crate::validation::FieldValidator;
use crate::{ArborError, Node, NodeFields, NodeId, Partition};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// =============================================================================
// NODESTORE TRAIT
// =============================================================================

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The node as it was before the write.
    pub previous: Node,
    /// The node as written.
    pub node: Node,
    /// Descendants whose partition followed the node into its new partition.
    pub moved: Vec<NodeId>,
}

impl UpdateOutcome {
    /// Partitions whose trees changed.
    #[must_use]
    pub fn touched_partitions(&self) -> BTreeSet<Partition> {
        [self.previous.partition.clone(), self.node.partition.clone()]
            .into_iter()
            .collect()
    }
}

/// The NodeStore trait defines the persistence operations of the engine.
///
/// Implementations synchronise internally, so every method takes `&self` and
/// stores can be shared across threads. Reads never wait for a partition lock.
pub trait NodeStore: Send + Sync {
    /// All nodes of a partition ordered by `(order_key, id)`.
    fn list_by_partition(&self, partition: &Partition) -> Result<Vec<Node>, ArborError>;

    /// Every stored node, ordered by id.
    fn list_all(&self) -> Result<Vec<Node>, ArborError>;

    /// Lookup a node by id.
    fn get(&self, id: NodeId) -> Result<Option<Node>, ArborError>;

    /// Insert a node with a fresh id.
    ///
    /// Fails with `Validation` on missing/invalid fields, a nonexistent
    /// parent, or a parent in another partition.
    fn create(&self, fields: NodeFields) -> Result<Node, ArborError>;

    /// Overwrite every field of an existing node.
    ///
    /// Fails with `NotFound` if `id` is absent, `Validation` as for `create`
    /// or when the payload kind changes, and `Cycle` when the new parent is
    /// the node itself or one of its descendants. A partition change carries
    /// the whole subtree along in the same write.
    fn update(&self, id: NodeId, fields: NodeFields) -> Result<UpdateOutcome, ArborError>;

    /// Remove a leaf node permanently, returning it.
    ///
    /// Fails with `HasChildren` if any node, active or not, points at it.
    fn delete(&self, id: NodeId) -> Result<Node, ArborError>;

    /// Set the active flag on several nodes at once, returning them updated.
    ///
    /// Fails with `NotFound` (and writes nothing) if any id is absent.
    fn set_active(&self, ids: &[NodeId], active: bool) -> Result<Vec<Node>, ArborError>;

    /// Assign `order_key = position + 1` following `ids`.
    ///
    /// Every id must exist and belong to `partition`.
    fn reorder(&self, partition: &Partition, ids: &[NodeId]) -> Result<(), ArborError>;

    /// Total number of stored nodes.
    fn node_count(&self) -> Result<usize, ArborError>;

    /// Child index over every stored node.
    fn child_index(&self) -> Result<ChildIndex, ArborError> {
        Ok(ChildIndex::from_nodes(&self.list_all()?))
    }

    /// Lookup a node, failing with `NotFound` when absent.
    fn require(&self, id: NodeId) -> Result<Node, ArborError> {
        self.get(id)?.ok_or(ArborError::NotFound(id))
    }
}

// =============================================================================
// WRITE PLANNING (shared by every backend)
// =============================================================================

/// Referential check for a node's parent.
///
/// `parent` is the stored node `fields.parent_id` refers to, if any.
pub(crate) fn check_parent(fields: &NodeFields, parent: Option<&Node>) -> Result<(), ArborError> {
    if fields.parent_id.is_root() {
        return Ok(());
    }
    let Some(parent) = parent else {
        return Err(ArborError::Validation(format!(
            "parent node {} does not exist",
            fields.parent_id
        )));
    };
    if parent.partition != fields.partition {
        return Err(ArborError::Validation(format!(
            "parent node {} belongs to partition '{}', not '{}'",
            parent.id, parent.partition, fields.partition
        )));
    }
    Ok(())
}

/// Planned effect of an update, computed before anything is written.
#[derive(Debug)]
pub(crate) struct UpdatePlan {
    pub node: Node,
    pub moved: Vec<NodeId>,
}

/// Validate an update against the stored structure and plan the write.
pub(crate) fn plan_update(
    existing: &Node,
    fields: NodeFields,
    parent: Option<&Node>,
    index: &ChildIndex,
) -> Result<UpdatePlan, ArborError> {
    if fields.payload.kind() != existing.kind() {
        return Err(ArborError::Validation(format!(
            "node {} is a {} node and cannot become a {} node",
            existing.id,
            existing.kind().name(),
            fields.payload.kind().name()
        )));
    }

    if fields.parent_id != existing.parent_id {
        ReparentGuard::validate(index, existing.id, fields.parent_id)?;
    }
    check_parent(&fields, parent)?;

    let moved = if fields.partition != existing.partition {
        DescendantResolver::new(index)
            .descendants(existing.id, index.len())
            .into_iter()
            .collect()
    } else {
        Vec::new()
    };

    Ok(UpdatePlan {
        node: Node::from_fields(existing.id, fields),
        moved,
    })
}

/// Check a reorder request against stored nodes.
pub(crate) fn check_reorder(
    partition: &Partition,
    ids: &[NodeId],
    lookup: impl Fn(NodeId) -> Result<Option<Node>, ArborError>,
) -> Result<(), ArborError> {
    FieldValidator::validate_ids(ids)?;
    for &id in ids {
        let node = lookup(id)?.ok_or(ArborError::NotFound(id))?;
        if &node.partition != partition {
            return Err(ArborError::Validation(format!(
                "node {} belongs to partition '{}', not '{}'",
                id, node.partition, partition
            )));
        }
    }
    Ok(())
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Debug)]
struct MemoryTables {
    nodes: BTreeMap<NodeId, Node>,
    next_node_id: u64,
}

impl Default for MemoryTables {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_node_id: 1,
        }
    }
}

/// In-memory node store (fast, volatile).
///
/// Writers hold the table lock only for the validate-and-apply step, which is
/// linear in the node count.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node verbatim, keeping its id and skipping every check.
    ///
    /// Used to load legacy data, which may already be inconsistent.
    pub fn import_node(&self, node: Node) {
        let mut tables = self.write();
        if node.id.0 >= tables.next_node_id {
            tables.next_node_id = node.id.0.saturating_add(1);
        }
        tables.nodes.insert(node.id, node);
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NodeStore for MemoryStore {
    fn list_by_partition(&self, partition: &Partition) -> Result<Vec<Node>, ArborError> {
        let tables = self.read();
        let mut nodes: Vec<Node> = tables
            .nodes
            .values()
            .filter(|n| &n.partition == partition)
            .cloned()
            .collect();
        nodes.sort_by_key(Node::sort_key);
        Ok(nodes)
    }

    fn list_all(&self) -> Result<Vec<Node>, ArborError> {
        Ok(self.read().nodes.values().cloned().collect())
    }

    fn get(&self, id: NodeId) -> Result<Option<Node>, ArborError> {
        Ok(self.read().nodes.get(&id).cloned())
    }

    fn create(&self, fields: NodeFields) -> Result<Node, ArborError> {
        let fields = FieldValidator::validate(fields)?;
        let mut tables = self.write();

        check_parent(&fields, tables.nodes.get(&fields.parent_id))?;

        let id = NodeId(tables.next_node_id);
        tables.next_node_id = tables.next_node_id.saturating_add(1);
        let node = Node::from_fields(id, fields);
        tables.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn update(&self, id: NodeId, fields: NodeFields) -> Result<UpdateOutcome, ArborError> {
        let fields = FieldValidator::validate(fields)?;
        let mut tables = self.write();

        let previous = tables
            .nodes
            .get(&id)
            .cloned()
            .ok_or(ArborError::NotFound(id))?;
        let index = ChildIndex::from_nodes(tables.nodes.values());
        let parent = tables.nodes.get(&fields.parent_id).cloned();
        let plan = plan_update(&previous, fields, parent.as_ref(), &index)?;

        for moved in &plan.moved {
            if let Some(node) = tables.nodes.get_mut(moved) {
                node.partition = plan.node.partition.clone();
            }
        }
        tables.nodes.insert(id, plan.node.clone());

        Ok(UpdateOutcome {
            previous,
            node: plan.node,
            moved: plan.moved,
        })
    }

    fn delete(&self, id: NodeId) -> Result<Node, ArborError> {
        let mut tables = self.write();
        if !tables.nodes.contains_key(&id) {
            return Err(ArborError::NotFound(id));
        }
        if ChildIndex::from_nodes(tables.nodes.values()).has_children(id) {
            return Err(ArborError::HasChildren(id));
        }
        tables.nodes.remove(&id).ok_or(ArborError::NotFound(id))
    }

    fn set_active(&self, ids: &[NodeId], active: bool) -> Result<Vec<Node>, ArborError> {
        FieldValidator::validate_ids(ids)?;
        let mut tables = self.write();
        if let Some(missing) = ids.iter().find(|id| !tables.nodes.contains_key(id)) {
            return Err(ArborError::NotFound(*missing));
        }

        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = tables.nodes.get_mut(id) {
                node.active = active;
                updated.push(node.clone());
            }
        }
        Ok(updated)
    }

    fn reorder(&self, partition: &Partition, ids: &[NodeId]) -> Result<(), ArborError> {
        let mut tables = self.write();
        check_reorder(partition, ids, |id| Ok(tables.nodes.get(&id).cloned()))?;

        for (position, id) in ids.iter().enumerate() {
            if let Some(node) = tables.nodes.get_mut(id) {
                node.order_key = position as i64 + 1;
            }
        }
        Ok(())
    }

    fn node_count(&self) -> Result<usize, ArborError> {
        Ok(self.read().nodes.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn menu(partition: &str, title: &str, parent: NodeId) -> NodeFields {
        NodeFields::menu(partition, title, parent)
    }

    #[test]
    fn create_assigns_increasing_ids_from_one() {
        let store = MemoryStore::new();
        let a = store.create(menu("admin", "System", NodeId::ROOT)).expect("create");
        let b = store.create(menu("admin", "Users", a.id)).expect("create");

        assert_eq!(a.id, NodeId(1));
        assert_eq!(b.id, NodeId(2));
        assert_eq!(store.node_count().expect("count"), 2);
    }

    #[test]
    fn create_rejects_missing_or_foreign_parent() {
        let store = MemoryStore::new();
        let missing = store.create(menu("admin", "Orphan", NodeId(42)));
        assert!(matches!(missing, Err(ArborError::Validation(_))));

        let other = store.create(menu("user", "Home", NodeId::ROOT)).expect("create");
        let foreign = store.create(menu("admin", "Child", other.id));
        assert!(matches!(foreign, Err(ArborError::Validation(_))));
        assert_eq!(store.node_count().expect("count"), 1);
    }

    #[test]
    fn list_by_partition_orders_by_key_then_id() {
        let store = MemoryStore::new();
        store.create(menu("admin", "b", NodeId::ROOT).with_order(2)).expect("create");
        store.create(menu("admin", "a", NodeId::ROOT).with_order(1)).expect("create");
        store.create(menu("admin", "c", NodeId::ROOT).with_order(2)).expect("create");
        store.create(menu("user", "x", NodeId::ROOT)).expect("create");

        let titles: Vec<_> = store
            .list_by_partition(&Partition::new("admin"))
            .expect("list")
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn update_rejects_cycle_and_leaves_store_unchanged() {
        let store = MemoryStore::new();
        let a = store.create(menu("admin", "A", NodeId::ROOT)).expect("create");
        let b = store.create(menu("admin", "B", a.id)).expect("create");
        let c = store.create(menu("admin", "C", b.id)).expect("create");

        let result = store.update(a.id, a.to_fields().with_parent(c.id));
        assert!(matches!(result, Err(ArborError::Cycle(_))));

        let self_parent = store.update(b.id, b.to_fields().with_parent(b.id));
        assert!(matches!(self_parent, Err(ArborError::Cycle(_))));

        assert_eq!(store.require(a.id).expect("get").parent_id, NodeId::ROOT);
        assert_eq!(store.require(b.id).expect("get").parent_id, a.id);
    }

    #[test]
    fn update_rejects_kind_change() {
        let store = MemoryStore::new();
        let a = store.create(menu("admin", "A", NodeId::ROOT)).expect("create");
        let result = store.update(a.id, NodeFields::column("admin", "A", NodeId::ROOT));
        assert!(matches!(result, Err(ArborError::Validation(_))));
    }

    #[test]
    fn partition_change_moves_subtree() {
        let store = MemoryStore::new();
        let a = store.create(menu("admin", "A", NodeId::ROOT)).expect("create");
        let b = store.create(menu("admin", "B", a.id)).expect("create");
        let c = store.create(menu("admin", "C", b.id)).expect("create");
        let d = store.create(menu("admin", "D", NodeId::ROOT)).expect("create");

        let mut fields = a.to_fields();
        fields.partition = Partition::new("user");
        let outcome = store.update(a.id, fields).expect("update");

        assert_eq!(outcome.moved, vec![b.id, c.id]);
        assert_eq!(outcome.touched_partitions().len(), 2);
        for id in [a.id, b.id, c.id] {
            assert_eq!(store.require(id).expect("get").partition.as_str(), "user");
        }
        assert_eq!(store.require(d.id).expect("get").partition.as_str(), "admin");
    }

    #[test]
    fn delete_blocked_by_inactive_child() {
        let store = MemoryStore::new();
        let a = store.create(menu("admin", "A", NodeId::ROOT)).expect("create");
        let b = store
            .create(menu("admin", "B", a.id).with_active(false))
            .expect("create");

        assert!(matches!(store.delete(a.id), Err(ArborError::HasChildren(_))));
        store.delete(b.id).expect("delete leaf");
        store.delete(a.id).expect("delete now-leaf");
        assert!(matches!(store.delete(a.id), Err(ArborError::NotFound(_))));
    }

    #[test]
    fn set_active_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = store.create(menu("admin", "A", NodeId::ROOT)).expect("create");

        let result = store.set_active(&[a.id, NodeId(99)], false);
        assert!(matches!(result, Err(ArborError::NotFound(NodeId(99)))));
        assert!(store.require(a.id).expect("get").active);

        let updated = store.set_active(&[a.id], false).expect("set");
        assert!(!updated[0].active);
    }

    #[test]
    fn reorder_assigns_positions_and_checks_partition() {
        let store = MemoryStore::new();
        let a = store.create(menu("admin", "A", NodeId::ROOT).with_order(9)).expect("create");
        let b = store.create(menu("admin", "B", NodeId::ROOT).with_order(1)).expect("create");
        let u = store.create(menu("user", "U", NodeId::ROOT)).expect("create");

        let admin = Partition::new("admin");
        assert!(matches!(
            store.reorder(&admin, &[a.id, u.id]),
            Err(ArborError::Validation(_))
        ));
        assert_eq!(store.require(a.id).expect("get").order_key, 9);

        store.reorder(&admin, &[a.id, b.id]).expect("reorder");
        assert_eq!(store.require(a.id).expect("get").order_key, 1);
        assert_eq!(store.require(b.id).expect("get").order_key, 2);
    }

    #[test]
    fn import_node_bumps_next_id() {
        let store = MemoryStore::new();
        store.import_node(Node::from_fields(NodeId(10), menu("admin", "Legacy", NodeId(10))));
        let fresh = store.create(menu("admin", "New", NodeId::ROOT)).expect("create");
        assert_eq!(fresh.id, NodeId(11));

        // a self-parented legacy row is still deletable
        store.delete(NodeId(10)).expect("delete");
    }
}
