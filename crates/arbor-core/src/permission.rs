//! # Permission Model
//!
//! Typed role permissions and the access-node filter for menu display.
//!
//! A role holds a set of permission keys (`"menu.update"`) and a set of node
//! ids it may see. `RoleId::SUPERUSER` bypasses every check, whatever its status.

use crate::primitives::SUPERUSER_ROLE_ID;
use crate::tree::Forest;
use crate::{ArborError, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// KEYS AND ROLES
// =============================================================================

/// A named permission, `"<kind>.<action>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionKey(pub String);

impl PermissionKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key guarding `action` on nodes of `kind`.
    #[must_use]
    pub fn for_kind(kind: NodeKind, action: Action) -> Self {
        Self(format!("{}.{}", kind.name(), action.name()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations a role may be granted on a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
}

impl Action {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Role identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl RoleId {
    /// The role that bypasses every permission check.
    pub const SUPERUSER: Self = Self(SUPERUSER_ROLE_ID);

    #[must_use]
    pub const fn is_superuser(self) -> bool {
        self.0 == SUPERUSER_ROLE_ID
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An administrator role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub permissions: BTreeSet<PermissionKey>,
    /// Menu nodes this role may see.
    #[serde(default)]
    pub nodes: BTreeSet<NodeId>,
}

fn default_active() -> bool {
    true
}

impl Role {
    /// The active superuser role.
    #[must_use]
    pub fn superuser() -> Self {
        Self {
            id: RoleId::SUPERUSER,
            name: "superuser".to_string(),
            active: true,
            permissions: BTreeSet::new(),
            nodes: BTreeSet::new(),
        }
    }

    /// An active role with no grants.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: RoleId(id),
            name: name.into(),
            active: true,
            permissions: BTreeSet::new(),
            nodes: BTreeSet::new(),
        }
    }

    /// Grant a permission key.
    #[must_use]
    pub fn grant(mut self, key: impl Into<String>) -> Self {
        self.permissions.insert(PermissionKey::new(key));
        self
    }

    /// Allow the role to see the given nodes.
    #[must_use]
    pub fn with_nodes<I: IntoIterator<Item = NodeId>>(mut self, nodes: I) -> Self {
        self.nodes.extend(nodes);
        self
    }
}

// =============================================================================
// ACCESS POLICY
// =============================================================================

/// Permission checks against a role.
pub struct AccessPolicy;

impl AccessPolicy {
    /// Check that `role` holds `required`.
    pub fn authorize(role: &Role, required: &PermissionKey) -> Result<(), ArborError> {
        // Superuser is an explicit rule, checked before status and grants.
        if role.id.is_superuser() {
            return Ok(());
        }

        if !role.active {
            return Err(ArborError::PermissionDenied(format!(
                "role {} is disabled",
                role.id
            )));
        }

        if role.permissions.contains(required) {
            Ok(())
        } else {
            Err(ArborError::PermissionDenied(required.to_string()))
        }
    }

    /// Whether `role` may see node `id`.
    #[must_use]
    pub fn can_see(role: &Role, id: NodeId) -> bool {
        role.id.is_superuser() || (role.active && role.nodes.contains(&id))
    }
}

impl Forest {
    /// Prune every node `role` may not see, together with its subtree.
    pub fn retain_accessible(&mut self, role: &Role) {
        if role.id.is_superuser() {
            return;
        }
        self.retain(|node| AccessPolicy::can_see(role, node.id));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;
    use crate::{Node, NodeFields};

    fn key(s: &str) -> PermissionKey {
        PermissionKey::new(s)
    }

    #[test]
    fn superuser_bypasses_grants() {
        let root = Role::superuser();
        assert!(root.permissions.is_empty());
        assert!(AccessPolicy::authorize(&root, &key("menu.delete")).is_ok());
    }

    #[test]
    fn superuser_ignores_role_status() {
        let mut root = Role::superuser();
        root.active = false;
        assert!(AccessPolicy::authorize(&root, &key("menu.view")).is_ok());
        assert!(AccessPolicy::can_see(&root, NodeId(42)));
    }

    #[test]
    fn inactive_role_is_denied() {
        let mut editor = Role::new(2, "editor").grant("menu.view").with_nodes([NodeId(1)]);
        editor.active = false;
        assert!(matches!(
            AccessPolicy::authorize(&editor, &key("menu.view")),
            Err(ArborError::PermissionDenied(_))
        ));
        assert!(!AccessPolicy::can_see(&editor, NodeId(1)));
    }

    #[test]
    fn grants_are_exact_set_membership() {
        let editor = Role::new(2, "editor").grant("menu.update");
        assert!(AccessPolicy::authorize(&editor, &key("menu.update")).is_ok());
        assert!(AccessPolicy::authorize(&editor, &key("menu.updat")).is_err());
        assert!(AccessPolicy::authorize(&editor, &key("column.update")).is_err());
    }

    #[test]
    fn key_for_kind() {
        assert_eq!(
            PermissionKey::for_kind(NodeKind::Column, Action::Delete).as_str(),
            "column.delete"
        );
    }

    #[test]
    fn retain_accessible_prunes_subtrees() {
        let nodes = vec![
            Node::from_fields(NodeId(1), NodeFields::menu("admin", "System", NodeId::ROOT)),
            Node::from_fields(NodeId(2), NodeFields::menu("admin", "Users", NodeId(1))),
            Node::from_fields(NodeId(3), NodeFields::menu("admin", "Content", NodeId::ROOT)),
            Node::from_fields(NodeId(4), NodeFields::menu("admin", "Articles", NodeId(3))),
        ];
        let forest = TreeBuilder::new().build(&nodes);

        let editor = Role::new(2, "editor").with_nodes([NodeId(3), NodeId(4), NodeId(2)]);
        let mut visible = forest.clone();
        visible.retain_accessible(&editor);
        // node 2 is granted but its parent is not
        assert_eq!(visible.ids(), vec![NodeId(3), NodeId(4)]);

        let mut root = Role::superuser();
        root.active = false;
        let mut all = forest;
        all.retain_accessible(&root);
        assert_eq!(all.node_count(), 4);
    }
}
