//! # redb-backed Node Storage
//!
//! A disk-backed node store using the redb embedded database.
//!
//! - ACID transactions: every mutation is one write transaction
//! - MVCC: readers never wait for the writer
//! - Crash safety (copy-on-write B-trees)
//!
//! Validation runs inside the write transaction against the data it is about
//! to modify. A rejected mutation drops the transaction uncommitted, so
//! nothing reaches disk.

use crate::descendants::ChildIndex;
use crate::store::{NodeStore, UpdateOutcome, check_parent, check_reorder, plan_update};
use crate::validation::FieldValidator;
use crate::{ArborError, Node, NodeFields, NodeId, Partition};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Table for nodes: NodeId(u64) -> postcard-encoded Node
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_NODE_ID: &str = "next_node_id";

/// A disk-backed node store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a node database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArborError> {
        let db = Database::create(path.as_ref()).map_err(storage)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage)?;
            let _ = write_txn.open_table(NODES).map_err(storage)?;
            let _ = write_txn.open_table(METADATA).map_err(storage)?;
            write_txn.commit().map_err(storage)?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), ArborError> {
        self.db.compact().map_err(storage)?;
        Ok(())
    }

    /// Write a node verbatim, keeping its id and skipping every check.
    ///
    /// Used to load legacy data, which may already be inconsistent.
    pub fn import_node(&self, node: &Node) -> Result<(), ArborError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(storage)?;
            let mut meta = write_txn.open_table(METADATA).map_err(storage)?;

            nodes
                .insert(node.id.0, encode(node)?.as_slice())
                .map_err(storage)?;

            let next = next_id(&meta)?;
            if node.id.0 >= next {
                meta.insert(NEXT_NODE_ID, node.id.0.saturating_add(1))
                    .map_err(storage)?;
            }
        }
        write_txn.commit().map_err(storage)?;
        Ok(())
    }

    fn read_all(&self) -> Result<BTreeMap<NodeId, Node>, ArborError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(NODES).map_err(storage)?;
        load_all(&table)
    }
}

impl NodeStore for RedbStore {
    fn list_by_partition(&self, partition: &Partition) -> Result<Vec<Node>, ArborError> {
        let mut nodes: Vec<Node> = self
            .read_all()?
            .into_values()
            .filter(|n| &n.partition == partition)
            .collect();
        nodes.sort_by_key(Node::sort_key);
        Ok(nodes)
    }

    fn list_all(&self) -> Result<Vec<Node>, ArborError> {
        Ok(self.read_all()?.into_values().collect())
    }

    fn get(&self, id: NodeId) -> Result<Option<Node>, ArborError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(NODES).map_err(storage)?;
        get_node(&table, id)
    }

    fn create(&self, fields: NodeFields) -> Result<Node, ArborError> {
        let fields = FieldValidator::validate(fields)?;

        let write_txn = self.db.begin_write().map_err(storage)?;
        let node = {
            let mut nodes = write_txn.open_table(NODES).map_err(storage)?;
            let mut meta = write_txn.open_table(METADATA).map_err(storage)?;

            let parent = get_node(&nodes, fields.parent_id)?;
            check_parent(&fields, parent.as_ref())?;

            let id = next_id(&meta)?;
            let node = Node::from_fields(NodeId(id), fields);
            nodes
                .insert(id, encode(&node)?.as_slice())
                .map_err(storage)?;
            meta.insert(NEXT_NODE_ID, id.saturating_add(1))
                .map_err(storage)?;
            node
        };
        write_txn.commit().map_err(storage)?;

        Ok(node)
    }

    fn update(&self, id: NodeId, fields: NodeFields) -> Result<UpdateOutcome, ArborError> {
        let fields = FieldValidator::validate(fields)?;

        let write_txn = self.db.begin_write().map_err(storage)?;
        let outcome = {
            let mut nodes = write_txn.open_table(NODES).map_err(storage)?;
            let all = load_all(&nodes)?;

            let previous = all.get(&id).cloned().ok_or(ArborError::NotFound(id))?;
            let index = ChildIndex::from_nodes(all.values());
            let parent = all.get(&fields.parent_id).cloned();
            let plan = plan_update(&previous, fields, parent.as_ref(), &index)?;

            for moved in &plan.moved {
                if let Some(child) = all.get(moved) {
                    let mut child = child.clone();
                    child.partition = plan.node.partition.clone();
                    nodes
                        .insert(moved.0, encode(&child)?.as_slice())
                        .map_err(storage)?;
                }
            }
            nodes
                .insert(id.0, encode(&plan.node)?.as_slice())
                .map_err(storage)?;

            UpdateOutcome {
                previous,
                node: plan.node,
                moved: plan.moved,
            }
        };
        write_txn.commit().map_err(storage)?;

        Ok(outcome)
    }

    fn delete(&self, id: NodeId) -> Result<Node, ArborError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        let removed = {
            let mut nodes = write_txn.open_table(NODES).map_err(storage)?;
            let all = load_all(&nodes)?;

            let existing = all.get(&id).cloned().ok_or(ArborError::NotFound(id))?;
            if ChildIndex::from_nodes(all.values()).has_children(id) {
                return Err(ArborError::HasChildren(id));
            }
            nodes.remove(id.0).map_err(storage)?;
            existing
        };
        write_txn.commit().map_err(storage)?;

        Ok(removed)
    }

    fn set_active(&self, ids: &[NodeId], active: bool) -> Result<Vec<Node>, ArborError> {
        FieldValidator::validate_ids(ids)?;

        let write_txn = self.db.begin_write().map_err(storage)?;
        let updated = {
            let mut nodes = write_txn.open_table(NODES).map_err(storage)?;

            let mut updated = Vec::with_capacity(ids.len());
            for &id in ids {
                let mut node = get_node(&nodes, id)?.ok_or(ArborError::NotFound(id))?;
                node.active = active;
                updated.push(node);
            }
            for node in &updated {
                nodes
                    .insert(node.id.0, encode(node)?.as_slice())
                    .map_err(storage)?;
            }
            updated
        };
        write_txn.commit().map_err(storage)?;

        Ok(updated)
    }

    fn reorder(&self, partition: &Partition, ids: &[NodeId]) -> Result<(), ArborError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(storage)?;
            check_reorder(partition, ids, |id| get_node(&nodes, id))?;

            for (position, &id) in ids.iter().enumerate() {
                if let Some(mut node) = get_node(&nodes, id)? {
                    node.order_key = position as i64 + 1;
                    nodes
                        .insert(id.0, encode(&node)?.as_slice())
                        .map_err(storage)?;
                }
            }
        }
        write_txn.commit().map_err(storage)?;
        Ok(())
    }

    fn node_count(&self) -> Result<usize, ArborError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(NODES).map_err(storage)?;
        Ok(table.len().map_err(storage)? as usize)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn storage(e: impl std::fmt::Display) -> ArborError {
    ArborError::Storage(e.to_string())
}

fn encode(node: &Node) -> Result<Vec<u8>, ArborError> {
    postcard::to_allocvec(node).map_err(|e| ArborError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Node, ArborError> {
    postcard::from_bytes(bytes).map_err(|e| ArborError::Deserialization(e.to_string()))
}

fn get_node<T>(table: &T, id: NodeId) -> Result<Option<Node>, ArborError>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    if id.is_root() {
        return Ok(None);
    }
    match table.get(id.0).map_err(storage)? {
        Some(bytes) => Ok(Some(decode(bytes.value())?)),
        None => Ok(None),
    }
}

fn load_all<T>(table: &T) -> Result<BTreeMap<NodeId, Node>, ArborError>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    let mut nodes = BTreeMap::new();
    for entry in table.iter().map_err(storage)? {
        let (key, value) = entry.map_err(storage)?;
        nodes.insert(NodeId(key.value()), decode(value.value())?);
    }
    Ok(nodes)
}

fn next_id<T>(meta: &T) -> Result<u64, ArborError>
where
    T: ReadableTable<&'static str, u64>,
{
    Ok(meta
        .get(NEXT_NODE_ID)
        .map_err(storage)?
        .map(|v| v.value())
        .unwrap_or(1))
}

// =============================================================================
// TESTS
// =============================================================================
