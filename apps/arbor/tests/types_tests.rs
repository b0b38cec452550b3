//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use arbor::api::{
    ApiError, ErrorResponse, HealthResponse, NodeJson, NodeRequest, TreeNodeJson, status_for,
};
use arbor_core::{
    ArborError, ColumnType, Node, NodeFields, NodeId, NodeKind, Payload, TreeBuilder,
};
use axum::http::StatusCode;

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.4.2".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.4.2\""));
}

// =============================================================================
// NODE REQUEST TESTS
// =============================================================================

#[test]
fn test_node_request_minimal_menu() {
    let json = r#"{"kind":"menu","partition":"admin","title":"System"}"#;
    let request: NodeRequest = serde_json::from_str(json).unwrap();
    let fields = request.to_fields().unwrap();

    assert_eq!(fields.parent_id, NodeId::ROOT);
    assert_eq!(fields.order_key, 0);
    assert!(fields.active);
    match fields.payload {
        Payload::Menu(menu) => assert_eq!(menu.url_target, "_self"),
        Payload::Column(_) => unreachable!("menu payload expected"),
    }
}

#[test]
fn test_node_request_column_fields() {
    let json = r#"{
        "kind": "column",
        "partition": "cms",
        "title": "About",
        "parent_id": 4,
        "active": false,
        "column": {"name": "about", "column_type": "page", "list_row": 20}
    }"#;
    let request: NodeRequest = serde_json::from_str(json).unwrap();
    let fields = request.to_fields().unwrap();

    assert_eq!(fields.parent_id, NodeId(4));
    assert_eq!(fields.order_key, 100);
    assert!(!fields.active);
    match fields.payload {
        Payload::Column(column) => {
            assert_eq!(column.name, "about");
            assert_eq!(column.column_type, ColumnType::Page);
            assert_eq!(column.list_row, 20);
        }
        Payload::Menu(_) => unreachable!("column payload expected"),
    }
}

#[test]
fn test_node_request_rejects_foreign_payload() {
    let json = r#"{"kind":"column","partition":"cms","title":"x","menu":{"icon":"a"}}"#;
    let request: NodeRequest = serde_json::from_str(json).unwrap();
    assert!(matches!(request.to_fields(), Err(ArborError::Validation(_))));
}

#[test]
fn test_node_request_requires_kind() {
    let json = r#"{"partition":"admin","title":"System"}"#;
    assert!(serde_json::from_str::<NodeRequest>(json).is_err());
}

// =============================================================================
// NODE JSON TESTS
// =============================================================================

#[test]
fn test_node_json_flattens_payload() {
    let node = Node::from_fields(NodeId(7), NodeFields::menu("admin", "Users", NodeId(1)));
    let json = serde_json::to_value(NodeJson::from(&node)).unwrap();

    assert_eq!(json["id"], 7);
    assert_eq!(json["parent_id"], 1);
    assert_eq!(json["kind"], "menu");
    assert_eq!(json["menu"]["url_target"], "_self");
    assert!(json.get("column").is_none());
}

#[test]
fn test_tree_node_json_nests_children() {
    let nodes = vec![
        Node::from_fields(NodeId(1), NodeFields::menu("admin", "System", NodeId::ROOT)),
        Node::from_fields(NodeId(2), NodeFields::menu("admin", "Users", NodeId(1))),
    ];
    let forest = TreeBuilder::new().build(&nodes);
    let tree = TreeNodeJson::from(&forest.roots[0]);

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["depth"], 0);
    assert_eq!(json["children"][0]["title"], "Users");
    assert_eq!(json["children"][0]["depth"], 1);

    let back: TreeNodeJson = serde_json::from_value(json).unwrap();
    assert_eq!(back, tree);
    assert_eq!(back.node.kind, NodeKind::Menu);
}

// =============================================================================
// ERROR MAPPING TESTS
// =============================================================================

#[test]
fn test_error_status_mapping() {
    let cases = [
        (ArborError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
        (ArborError::NotFound(NodeId(1)), StatusCode::NOT_FOUND),
        (ArborError::HasChildren(NodeId(1)), StatusCode::CONFLICT),
        (ArborError::Cycle("x".into()), StatusCode::CONFLICT),
        (ArborError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
        (ArborError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        (ArborError::Deserialization("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(status_for(&err), status, "{}", err);
    }
}

#[test]
fn test_error_body_carries_kind() {
    let err = ApiError::from(ArborError::HasChildren(NodeId(3)));
    assert_eq!(err.status, StatusCode::CONFLICT);

    let json = serde_json::to_string(&err.body).unwrap();
    let body: ErrorResponse = serde_json::from_str(&json).unwrap();
    assert!(!body.success);
    assert_eq!(body.kind, "has_children");
    assert!(body.error.contains('3'));
}
