//! # API Endpoint Handlers
//!
//! Every handler resolves the acting role, then runs the engine call and its
//! permission check together on a blocking worker.

use super::{
    AppState,
    types::{
        AckResponse, ActiveRequest, ApiError, DescendantsQuery, DescendantsResponse,
        HealthResponse, MoveRequest, NodeListResponse, NodeRequest, NodeResponse, OptionsQuery,
        OptionsResponse, OrderRequest, PartitionsResponse, StatusResponse, TreeQuery,
        TreeResponse, UpdateResponse, node_ids, tree_response,
    },
};
use arbor_core::{
    AccessPolicy, Action, ArborError, FieldValidator, Node, NodeId, NodeKind, Partition,
    PermissionKey, Role, TreeService, primitives::MAX_TRAVERSAL_DEPTH,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use std::collections::BTreeSet;

fn authorize(role: &Role, kind: NodeKind, action: Action) -> Result<(), ArborError> {
    AccessPolicy::authorize(role, &PermissionKey::for_kind(kind, action))
}

/// Kind of the nodes in a partition; menus when it is empty.
fn partition_kind(service: &TreeService, partition: &Partition) -> Result<NodeKind, ArborError> {
    Ok(service
        .list(partition)?
        .first()
        .map_or(NodeKind::Menu, Node::kind))
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Store and cache counters.
pub async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let backend = state.service.store().name().to_string();
    let status = state.run(|svc| svc.status()).await?;

    Ok(Json(StatusResponse {
        backend,
        node_count: status.node_count,
        partition_count: status.partition_count,
        cache_hits: status.cache.hits,
        cache_misses: status.cache.misses,
        cache_entries: status.cache.entries,
    }))
}

// =============================================================================
// PARTITION HANDLERS
// =============================================================================

/// Partition tabs.
pub async fn partitions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PartitionsResponse>, ApiError> {
    let role = state.role(&headers)?;
    authorize(&role, NodeKind::Menu, Action::View)?;

    let partitions = state.run(|svc| svc.partitions()).await?;
    Ok(Json(PartitionsResponse {
        success: true,
        partitions,
    }))
}

/// Flat listing of a partition in sibling order.
pub async fn list_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    headers: HeaderMap,
) -> Result<Json<NodeListResponse>, ApiError> {
    let role = state.role(&headers)?;
    let partition = Partition::new(partition);

    let nodes = state
        .run(move |svc| {
            let nodes = svc.list(&partition)?;
            let kind = nodes.first().map_or(NodeKind::Menu, Node::kind);
            authorize(&role, kind, Action::View)?;
            Ok(nodes)
        })
        .await?;
    Ok(Json(NodeListResponse::new(&nodes)))
}

/// The forest of a partition.
///
/// `?all=true` returns the admin listing with inactive nodes. Otherwise menus
/// are filtered down to the nodes the role may see.
pub async fn tree_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Query(query): Query<TreeQuery>,
    headers: HeaderMap,
) -> Result<Json<TreeResponse>, ApiError> {
    let role = state.role(&headers)?;
    let partition = Partition::new(partition);

    let response = state
        .run(move |svc| {
            let kind = partition_kind(svc, &partition)?;
            authorize(&role, kind, Action::View)?;

            if query.all || kind == NodeKind::Column {
                let forest = svc.get_or_build(&partition, query.all)?;
                Ok(tree_response(&partition, &forest.roots, &forest.warnings))
            } else {
                let forest = svc.tree_for_role(&partition, &role)?;
                Ok(tree_response(&partition, &forest.roots, &forest.warnings))
            }
        })
        .await?;
    Ok(Json(response))
}

/// Parent picker rows, with `?exclude=` and its subtree left out.
pub async fn options_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Query(query): Query<OptionsQuery>,
    headers: HeaderMap,
) -> Result<Json<OptionsResponse>, ApiError> {
    let role = state.role(&headers)?;
    let partition = Partition::new(partition);

    let options = state
        .run(move |svc| {
            authorize(&role, partition_kind(svc, &partition)?, Action::View)?;
            svc.parent_options(&partition, query.exclude.map(NodeId))
        })
        .await?;
    Ok(Json(OptionsResponse {
        success: true,
        options,
    }))
}

/// Save sibling order: `order_key = position + 1`.
pub async fn order_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    headers: HeaderMap,
    Json(request): Json<OrderRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let role = state.role(&headers)?;
    let partition = Partition::new(partition);
    let ids = node_ids(&request.ids);
    let count = ids.len();

    state
        .run(move |svc| {
            authorize(&role, partition_kind(svc, &partition)?, Action::Update)?;
            svc.reorder(&partition, &ids)
        })
        .await?;
    Ok(Json(AckResponse {
        success: true,
        message: format!("saved order of {} nodes", count),
    }))
}

// =============================================================================
// NODE HANDLERS
// =============================================================================

/// Create a node.
pub async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NodeRequest>,
) -> Result<(StatusCode, Json<NodeResponse>), ApiError> {
    let role = state.role(&headers)?;
    let fields = request.to_fields()?;
    authorize(&role, fields.payload.kind(), Action::Create)?;

    let node = state.run(move |svc| svc.create(fields)).await?;
    Ok((StatusCode::CREATED, Json(NodeResponse::new(&node))))
}

/// Read one node.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<NodeResponse>, ApiError> {
    let role = state.role(&headers)?;

    let node = state
        .run(move |svc| {
            let node = svc.get(NodeId(id))?;
            authorize(&role, node.kind(), Action::View)?;
            Ok(node)
        })
        .await?;
    Ok(Json(NodeResponse::new(&node)))
}

/// Overwrite every field of a node.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<NodeRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let role = state.role(&headers)?;
    let fields = request.to_fields()?;
    authorize(&role, fields.payload.kind(), Action::Update)?;

    let outcome = state.run(move |svc| svc.update(NodeId(id), fields)).await?;
    Ok(Json(UpdateResponse {
        success: true,
        node: (&outcome.node).into(),
        moved: outcome.moved.iter().map(|id| id.0).collect(),
    }))
}

/// Delete a leaf node.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<NodeResponse>, ApiError> {
    let role = state.role(&headers)?;

    let node = state
        .run(move |svc| {
            let id = NodeId(id);
            authorize(&role, svc.get(id)?.kind(), Action::Delete)?;
            svc.delete(id)
        })
        .await?;
    Ok(Json(NodeResponse::new(&node)))
}

/// Change the parent of a node.
pub async fn move_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<MoveRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let role = state.role(&headers)?;

    let outcome = state
        .run(move |svc| {
            let id = NodeId(id);
            authorize(&role, svc.get(id)?.kind(), Action::Update)?;
            svc.reparent(id, NodeId(request.parent_id))
        })
        .await?;
    Ok(Json(NodeResponse::new(&outcome.node)))
}

/// Descendant ids of a node, down to `?depth=` levels.
pub async fn descendants_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<DescendantsQuery>,
    headers: HeaderMap,
) -> Result<Json<DescendantsResponse>, ApiError> {
    let role = state.role(&headers)?;
    if let Some(depth) = query.depth.filter(|d| *d > MAX_TRAVERSAL_DEPTH) {
        return Err(ArborError::Validation(format!(
            "depth {} exceeds maximum {}",
            depth, MAX_TRAVERSAL_DEPTH
        ))
        .into());
    }

    let (depth, descendants) = state
        .run(move |svc| {
            let id = NodeId(id);
            authorize(&role, svc.get(id)?.kind(), Action::View)?;
            let depth = query.depth.unwrap_or(svc.config().descendant_max_depth);
            Ok((depth, svc.descendants(id, Some(depth))?))
        })
        .await?;
    Ok(Json(DescendantsResponse {
        success: true,
        id,
        depth,
        descendants: descendants.into_iter().map(|id| id.0).collect(),
    }))
}

/// Enable or disable several nodes at once.
pub async fn set_active_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ActiveRequest>,
) -> Result<Json<NodeListResponse>, ApiError> {
    let role = state.role(&headers)?;
    let ids = node_ids(&request.ids);

    let nodes = state
        .run(move |svc| {
            FieldValidator::validate_ids(&ids)?;
            let mut kinds = BTreeSet::new();
            for id in &ids {
                kinds.insert(svc.get(*id)?.kind());
            }
            for kind in kinds {
                authorize(&role, kind, Action::Update)?;
            }
            svc.set_active(&ids, request.active)
        })
        .await?;
    Ok(Json(NodeListResponse::new(&nodes)))
}
