//! # arbor-core
//!
//! The tree engine behind Arbor - THE LOGIC.
//!
//! Admin menus and CMS columns are both stored as flat rows with a parent
//! pointer, grouped by a partition key. This crate turns those rows into
//! ordered forests, answers bounded descendant queries, and guards every
//! structural mutation so that committed data never contains a cycle.
//!
//! ## Layout
//!
//! - `store` / `storage`: flat CRUD (`MemoryStore`, `RedbStore`)
//! - `tree`: forest assembly with integrity warnings
//! - `descendants`: breadth-first descendant sets over a child index
//! - `guard`: cycle checks for parent changes
//! - `cache`: per-partition forest cache with explicit invalidation
//! - `lock`: per-partition write exclusion
//! - `permission`: typed role grants and the access-node filter
//! - `service`: `TreeService`, the single mutation path
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Deterministic: ordered collections only
//! - Every traversal is bounded by a depth cap and a visited set

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod descendants;
pub mod guard;
pub mod lock;
pub mod permission;
pub mod primitives;
pub mod service;
pub mod storage;
pub mod store;
pub mod tree;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ArborError, ColumnPayload, ColumnType, MenuPayload, Node, NodeFields, NodeId, NodeKind,
    Partition, Payload,
};

// =============================================================================
// RE-EXPORTS: Tree Engine
// =============================================================================

pub use cache::{CacheInvalidator, CacheKey, CacheStats, ForestCache, MemoryCache, TreeView};
pub use descendants::{ChildIndex, DescendantResolver, Descendants};
pub use guard::ReparentGuard;
pub use lock::{PartitionGuard, PartitionLocks};
pub use permission::{AccessPolicy, Action, PermissionKey, Role, RoleId};
pub use service::{PartitionTab, ServiceStatus, TreeConfig, TreeService};
pub use storage::{RedbStore, StorageBackend};
pub use store::{MemoryStore, NodeStore, UpdateOutcome};
pub use tree::{FlatEntry, Forest, IntegrityWarning, TreeBuilder, TreeNode};
pub use validation::FieldValidator;
