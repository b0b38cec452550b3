//! # Core Type Definitions
//!
//! This module contains the shared types of the Arbor tree engine:
//! - Identifiers (`NodeId`, `Partition`)
//! - Stored records (`Node`) and their kind-specific payloads
//! - Mutation input (`NodeFields`)
//! - Error types (`ArborError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier types implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! and every listing the engine produces has a stable order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier of a stored node.
///
/// `NodeId::ROOT` (`0`) is the parent sentinel of top-level nodes and is
/// never assigned to a stored node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The parent sentinel meaning "no parent".
    pub const ROOT: Self = Self(0);

    /// Whether this id is the root sentinel.
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The grouping key that scopes a tree (menu module or column group).
///
/// Two nodes in different partitions never share an ancestor.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Partition(pub String);

impl Partition {
    /// Create a partition key from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the partition key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Which table a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// An admin menu entry.
    Menu,
    /// A CMS content column.
    Column,
}

impl NodeKind {
    /// Lowercase name, used as the audit event prefix.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Column => "column",
        }
    }
}

/// Menu-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuPayload {
    pub icon: String,
    /// Route or URL; stored lowercase.
    pub url_value: String,
    pub url_type: String,
    /// Link target, `_self` unless set.
    pub url_target: String,
    /// Hidden when the site runs in online mode.
    pub online_hide: bool,
    pub params: BTreeMap<String, String>,
}

impl Default for MenuPayload {
    fn default() -> Self {
        Self {
            icon: String::new(),
            url_value: String::new(),
            url_type: String::new(),
            url_target: crate::primitives::DEFAULT_URL_TARGET.to_string(),
            online_hide: false,
            params: BTreeMap::new(),
        }
    }
}

/// Whether a column lists documents or renders a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    List,
    Page,
}

/// Column-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnPayload {
    pub name: String,
    pub keywords: String,
    pub description: String,
    pub content: String,
    pub cover: String,
    pub url: String,
    pub list_template: String,
    pub detail_template: String,
    pub page_template: String,
    pub column_type: ColumnType,
    /// Items per page on list views.
    pub list_row: u32,
    /// Document model id.
    pub model: u64,
}

impl Default for ColumnPayload {
    fn default() -> Self {
        Self {
            name: String::new(),
            keywords: String::new(),
            description: String::new(),
            content: String::new(),
            cover: String::new(),
            url: String::new(),
            list_template: String::new(),
            detail_template: String::new(),
            page_template: String::new(),
            column_type: ColumnType::List,
            list_row: crate::primitives::DEFAULT_LIST_ROW,
            model: 0,
        }
    }
}

/// Kind-specific node fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Menu(MenuPayload),
    Column(ColumnPayload),
}

impl Payload {
    /// The kind this payload belongs to.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Menu(_) => NodeKind::Menu,
            Self::Column(_) => NodeKind::Column,
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::Menu(MenuPayload::default())
    }
}

// =============================================================================
// NODE
// =============================================================================

/// One stored tree entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Assigned on creation, immutable.
    pub id: NodeId,
    /// Parent node, or `NodeId::ROOT`.
    pub parent_id: NodeId,
    pub partition: Partition,
    pub title: String,
    /// Sibling order; ties broken by `id`.
    pub order_key: i64,
    /// Inactive nodes are hidden from display trees but still count as children.
    pub active: bool,
    pub payload: Payload,
}

impl Node {
    /// Build a stored node from validated fields.
    #[must_use]
    pub fn from_fields(id: NodeId, fields: NodeFields) -> Self {
        Self {
            id,
            parent_id: fields.parent_id,
            partition: fields.partition,
            title: fields.title,
            order_key: fields.order_key,
            active: fields.active,
            payload: fields.payload,
        }
    }

    /// The sibling ordering key: `(order_key, id)` ascending.
    #[must_use]
    pub const fn sort_key(&self) -> (i64, NodeId) {
        (self.order_key, self.id)
    }

    /// The kind of this node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    /// The caller-editable fields of this node.
    #[must_use]
    pub fn to_fields(&self) -> NodeFields {
        NodeFields {
            parent_id: self.parent_id,
            partition: self.partition.clone(),
            title: self.title.clone(),
            order_key: self.order_key,
            active: self.active,
            payload: self.payload.clone(),
        }
    }
}

/// Full set of caller-supplied fields for create and update.
///
/// Updates are full-field overwrites: every field here replaces the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeFields {
    pub parent_id: NodeId,
    pub partition: Partition,
    pub title: String,
    pub order_key: i64,
    pub active: bool,
    pub payload: Payload,
}

impl NodeFields {
    /// Fields for an active menu node with default menu payload.
    #[must_use]
    pub fn menu(partition: impl Into<String>, title: impl Into<String>, parent_id: NodeId) -> Self {
        Self {
            parent_id,
            partition: Partition::new(partition),
            title: title.into(),
            order_key: 0,
            active: true,
            payload: Payload::Menu(MenuPayload::default()),
        }
    }

    /// Fields for an active column node with default column payload.
    #[must_use]
    pub fn column(partition: impl Into<String>, title: impl Into<String>, parent_id: NodeId) -> Self {
        Self {
            parent_id,
            partition: Partition::new(partition),
            title: title.into(),
            order_key: crate::primitives::DEFAULT_COLUMN_ORDER,
            active: true,
            payload: Payload::Column(ColumnPayload::default()),
        }
    }

    /// Set the sibling order key.
    #[must_use]
    pub fn with_order(mut self, order_key: i64) -> Self {
        self.order_key = order_key;
        self
    }

    /// Set the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Set the parent.
    #[must_use]
    pub fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = parent_id;
        self
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the tree engine.
///
/// - Every rejected mutation leaves the store unchanged
/// - None of these are retried; they need caller correction
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum ArborError {
    /// Missing or invalid input fields.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced node does not exist.
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    /// Delete blocked because at least one node points at this one.
    #[error("Cannot delete node {0}: it has children")]
    HasChildren(NodeId),

    /// The reparent would create a cycle or a self-parent.
    #[error("Cannot move node: {0}")]
    Cycle(String),

    /// The acting role lacks a required permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored record could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl ArborError {
    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::HasChildren(_) => "has_children",
            Self::Cycle(_) => "cycle",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::Deserialization(_) => "deserialization",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
