//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Nodes are exposed flat: a `kind` tag plus a `menu` or `column` object
//! carrying the kind-specific fields.

use arbor_core::{
    ArborError, ColumnPayload, FlatEntry, IntegrityWarning, MenuPayload, Node, NodeFields, NodeId,
    NodeKind, Partition, PartitionTab, Payload, TreeNode,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store and cache counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub backend: String,
    pub node_count: usize,
    pub partition_count: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_entries: usize,
}

// =============================================================================
// NODE JSON
// =============================================================================

/// A stored node as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: u64,
    pub parent_id: u64,
    pub partition: String,
    pub title: String,
    pub order_key: i64,
    pub active: bool,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<MenuPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnPayload>,
}

impl From<&Node> for NodeJson {
    fn from(node: &Node) -> Self {
        let (menu, column) = match &node.payload {
            Payload::Menu(menu) => (Some(menu.clone()), None),
            Payload::Column(column) => (None, Some(column.clone())),
        };
        Self {
            id: node.id.0,
            parent_id: node.parent_id.0,
            partition: node.partition.to_string(),
            title: node.title.clone(),
            order_key: node.order_key,
            active: node.active,
            kind: node.kind(),
            menu,
            column,
        }
    }
}

/// A node placed in a tree response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeJson {
    #[serde(flatten)]
    pub node: NodeJson,
    pub depth: usize,
    pub children: Vec<TreeNodeJson>,
}

impl From<&TreeNode> for TreeNodeJson {
    fn from(tree: &TreeNode) -> Self {
        Self {
            node: NodeJson::from(&tree.node),
            depth: tree.depth,
            children: tree.children.iter().map(Self::from).collect(),
        }
    }
}

// =============================================================================
// NODE REQUEST
// =============================================================================

fn default_active() -> bool {
    true
}

/// Body of `POST /nodes` and `PUT /nodes/{id}`.
///
/// `PUT` is a full overwrite: omitted optional fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    pub kind: NodeKind,
    #[serde(default)]
    pub parent_id: u64,
    pub partition: String,
    pub title: String,
    /// Defaults to `0` for menus and `100` for columns.
    #[serde(default)]
    pub order_key: Option<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub menu: Option<MenuPayload>,
    #[serde(default)]
    pub column: Option<ColumnPayload>,
}

impl NodeRequest {
    /// Convert to engine fields, rejecting a payload of the other kind.
    pub fn to_fields(&self) -> Result<NodeFields, ArborError> {
        let parent = NodeId(self.parent_id);
        let fields = match self.kind {
            NodeKind::Menu => {
                if self.column.is_some() {
                    return Err(ArborError::Validation(
                        "column fields sent for a menu node".into(),
                    ));
                }
                let mut fields = NodeFields::menu(self.partition.clone(), self.title.clone(), parent);
                fields.payload = Payload::Menu(self.menu.clone().unwrap_or_default());
                fields
            }
            NodeKind::Column => {
                if self.menu.is_some() {
                    return Err(ArborError::Validation(
                        "menu fields sent for a column node".into(),
                    ));
                }
                let mut fields =
                    NodeFields::column(self.partition.clone(), self.title.clone(), parent);
                fields.payload = Payload::Column(self.column.clone().unwrap_or_default());
                fields
            }
        };

        let fields = match self.order_key {
            Some(order_key) => fields.with_order(order_key),
            None => fields,
        };
        Ok(fields.with_active(self.active))
    }
}

/// Body of `POST /nodes/{id}/move`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    /// New parent; `0` makes the node a root.
    pub parent_id: u64,
}

/// Body of `POST /nodes/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRequest {
    pub ids: Vec<u64>,
    pub active: bool,
}

/// Body of `POST /partitions/{p}/order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub ids: Vec<u64>,
}

/// Convert raw ids from a request body.
pub fn node_ids(ids: &[u64]) -> Vec<NodeId> {
    ids.iter().copied().map(NodeId).collect()
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

/// `?all=` on the tree endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeQuery {
    /// Include inactive nodes (admin listing).
    #[serde(default)]
    pub all: bool,
}

/// `?exclude=` on the parent options endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsQuery {
    pub exclude: Option<u64>,
}

/// `?depth=` on the descendants endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescendantsQuery {
    pub depth: Option<usize>,
}

// =============================================================================
// RESPONSES
// =============================================================================

/// A single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResponse {
    pub success: bool,
    pub node: NodeJson,
}

impl NodeResponse {
    pub fn new(node: &Node) -> Self {
        Self {
            success: true,
            node: NodeJson::from(node),
        }
    }
}

/// Result of an update: the new node and any subtree that changed partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub node: NodeJson,
    /// Descendants moved along with a partition change.
    pub moved: Vec<u64>,
}

/// A flat list of nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeListResponse {
    pub success: bool,
    pub nodes: Vec<NodeJson>,
}

impl NodeListResponse {
    pub fn new(nodes: &[Node]) -> Self {
        Self {
            success: true,
            nodes: nodes.iter().map(NodeJson::from).collect(),
        }
    }
}

/// An assembled forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResponse {
    pub success: bool,
    pub partition: String,
    pub node_count: usize,
    pub roots: Vec<TreeNodeJson>,
    pub warnings: Vec<IntegrityWarning>,
}

/// Parent picker rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub success: bool,
    pub options: Vec<FlatEntry>,
}

/// Descendant ids of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescendantsResponse {
    pub success: bool,
    pub id: u64,
    pub depth: usize,
    pub descendants: Vec<u64>,
}

/// Partition tabs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionsResponse {
    pub success: bool,
    pub partitions: Vec<PartitionTab>,
}

/// Acknowledgement without a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: String,
}

/// An engine error bound to its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    /// A 500 that did not come from the engine.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                success: false,
                error: msg.into(),
                kind: "internal".to_string(),
            },
        }
    }
}

/// HTTP status for an engine error.
pub fn status_for(err: &ArborError) -> StatusCode {
    match err {
        ArborError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ArborError::NotFound(_) => StatusCode::NOT_FOUND,
        ArborError::HasChildren(_) | ArborError::Cycle(_) => StatusCode::CONFLICT,
        ArborError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        ArborError::Storage(_)
        | ArborError::Serialization(_)
        | ArborError::Deserialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ArborError> for ApiError {
    fn from(err: ArborError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), "request failed: {}", err);
        }
        Self {
            status,
            body: ErrorResponse {
                success: false,
                error: err.to_string(),
                kind: err.kind().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Helper for the tree response.
pub fn tree_response(partition: &Partition, roots: &[TreeNode], warnings: &[IntegrityWarning]) -> TreeResponse {
    TreeResponse {
        success: true,
        partition: partition.to_string(),
        node_count: roots.iter().map(TreeNode::size).sum(),
        roots: roots.iter().map(TreeNodeJson::from).collect(),
        warnings: warnings.to_vec(),
    }
}
