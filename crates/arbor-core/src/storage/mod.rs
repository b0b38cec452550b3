//! # Storage Backends
//!
//! Disk-backed implementations of `NodeStore`, and `StorageBackend`, the
//! runtime choice between the in-memory and the redb store.

mod redb_store;

pub use redb_store::RedbStore;

use crate::descendants::ChildIndex;
use crate::store::{MemoryStore, NodeStore, UpdateOutcome};
use crate::{ArborError, Node, NodeFields, NodeId, Partition};
use std::path::Path;

/// Storage backend selected at startup.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open or create a redb database at `path`.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, ArborError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Short backend name for status output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "memory",
            Self::Persistent(_) => "redb",
        }
    }

    /// Insert a node verbatim, keeping its id and skipping every check.
    pub fn import_node(&self, node: Node) -> Result<(), ArborError> {
        match self {
            Self::InMemory(store) => {
                store.import_node(node);
                Ok(())
            }
            Self::Persistent(store) => store.import_node(&node),
        }
    }
}

impl NodeStore for StorageBackend {
    fn list_by_partition(&self, partition: &Partition) -> Result<Vec<Node>, ArborError> {
        match self {
            Self::InMemory(s) => s.list_by_partition(partition),
            Self::Persistent(s) => s.list_by_partition(partition),
        }
    }

    fn list_all(&self) -> Result<Vec<Node>, ArborError> {
        match self {
            Self::InMemory(s) => s.list_all(),
            Self::Persistent(s) => s.list_all(),
        }
    }

    fn get(&self, id: NodeId) -> Result<Option<Node>, ArborError> {
        match self {
            Self::InMemory(s) => s.get(id),
            Self::Persistent(s) => s.get(id),
        }
    }

    fn create(&self, fields: NodeFields) -> Result<Node, ArborError> {
        match self {
            Self::InMemory(s) => s.create(fields),
            Self::Persistent(s) => s.create(fields),
        }
    }

    fn update(&self, id: NodeId, fields: NodeFields) -> Result<UpdateOutcome, ArborError> {
        match self {
            Self::InMemory(s) => s.update(id, fields),
            Self::Persistent(s) => s.update(id, fields),
        }
    }

    fn delete(&self, id: NodeId) -> Result<Node, ArborError> {
        match self {
            Self::InMemory(s) => s.delete(id),
            Self::Persistent(s) => s.delete(id),
        }
    }

    fn set_active(&self, ids: &[NodeId], active: bool) -> Result<Vec<Node>, ArborError> {
        match self {
            Self::InMemory(s) => s.set_active(ids, active),
            Self::Persistent(s) => s.set_active(ids, active),
        }
    }

    fn reorder(&self, partition: &Partition, ids: &[NodeId]) -> Result<(), ArborError> {
        match self {
            Self::InMemory(s) => s.reorder(partition, ids),
            Self::Persistent(s) => s.reorder(partition, ids),
        }
    }

    fn node_count(&self) -> Result<usize, ArborError> {
        match self {
            Self::InMemory(s) => s.node_count(),
            Self::Persistent(s) => s.node_count(),
        }
    }

    fn child_index(&self) -> Result<ChildIndex, ArborError> {
        match self {
            Self::InMemory(s) => s.child_index(),
            Self::Persistent(s) => s.child_index(),
        }
    }
}
