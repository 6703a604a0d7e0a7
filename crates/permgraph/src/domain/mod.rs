//! Domain types for the permission dependency graph.
//!
//! This module contains the value types shared by the engine, the storage
//! layer and the CLI. Everything here is plain data; graph algorithms live in
//! [`crate::engine`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Maximum length of a permission machine name
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length of a permission display name
pub const MAX_DISPLAY_NAME_LENGTH: usize = 200;

/// Maximum length of a permission description
pub const MAX_DESCRIPTION_LENGTH: usize = 2_000;

/// Maximum length of a module tag
pub const MAX_MODULE_LENGTH: usize = 50;

/// Opaque identifier for a permission
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(pub String);

impl PermissionId {
    /// Create a new permission ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PermissionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PermissionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of capability a permission grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    /// Read access
    View,

    /// Create new records
    Create,

    /// Modify existing records
    Edit,

    /// Remove records
    Delete,

    /// Administrative control over a resource
    Manage,

    /// Anything that does not fit the conventional CRUD verbs
    Other,
}

impl PermissionType {
    /// Infer the type from the last segment of a dot-namespaced name.
    ///
    /// `users.view` is `View`, `users.update` is `Edit`, `users.export` is `Other`.
    pub fn infer_from_name(name: &str) -> Self {
        let verb = name.rsplit('.').next().unwrap_or(name);
        match verb {
            "view" | "read" | "list" | "show" => Self::View,
            "create" | "add" | "store" => Self::Create,
            "edit" | "update" => Self::Edit,
            "delete" | "destroy" | "remove" => Self::Delete,
            "manage" | "admin" => Self::Manage,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Manage => "manage",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// An atomic access-control capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique identifier
    pub id: PermissionId,

    /// Unique machine key, dot-namespaced (e.g. `users.view`)
    pub name: String,

    /// Human-readable name
    pub display_name: String,

    /// Longer explanation shown to administrators
    #[serde(default)]
    pub description: String,

    /// Grouping tag (e.g. `users`, `roles`)
    pub module: String,

    /// Capability kind
    pub permission_type: PermissionType,

    /// Seed-defined permissions cannot be deleted, renamed or retyped
    #[serde(default)]
    pub is_system: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Resource key of this permission (its name without the last segment).
    pub fn resource_key(&self) -> &str {
        resource_key(&self.name)
    }

    /// Validate the stored fields.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.name,
            &self.display_name,
            &self.description,
            &self.module,
        )
    }
}

/// Return the resource key of a permission name.
///
/// `users.profile.edit` has resource key `users.profile`; a name without a dot
/// is its own resource key.
pub fn resource_key(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(resource, _)| resource)
}

/// Validate a permission machine name.
///
/// # Errors
///
/// Returns a description of why the name is invalid.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Permission name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(format!(
            "Permission name cannot exceed {MAX_NAME_LENGTH} characters"
        ));
    }
    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(format!("Permission name '{name}' has an empty segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(format!(
                "Permission name '{name}' may only contain lowercase letters, digits, '_' and '-'"
            ));
        }
    }
    Ok(())
}

fn validate_fields(
    name: &str,
    display_name: &str,
    description: &str,
    module: &str,
) -> Result<(), String> {
    validate_name(name)?;

    if display_name.trim().is_empty() {
        return Err("Display name cannot be empty".to_string());
    }
    if display_name.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(format!(
            "Display name cannot exceed {MAX_DISPLAY_NAME_LENGTH} characters"
        ));
    }
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        ));
    }
    if module.trim().is_empty() {
        return Err("Module cannot be empty".to_string());
    }
    if module.len() > MAX_MODULE_LENGTH {
        return Err(format!("Module cannot exceed {MAX_MODULE_LENGTH} characters"));
    }
    Ok(())
}

/// Data for creating a new permission
#[derive(Debug, Clone)]
pub struct NewPermission {
    /// Unique machine key
    pub name: String,

    /// Human-readable name
    pub display_name: String,

    /// Description
    pub description: String,

    /// Grouping tag
    pub module: String,

    /// Capability kind
    pub permission_type: PermissionType,

    /// Seed-defined flag
    pub is_system: bool,
}

impl NewPermission {
    /// Build a permission whose module and type are derived from its name.
    ///
    /// `users.edit` lands in module `users` with type `Edit`.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let module = name.split('.').next().unwrap_or_default().to_string();
        let permission_type = PermissionType::infer_from_name(&name);
        Self {
            display_name: name.clone(),
            description: String::new(),
            module,
            permission_type,
            is_system: false,
            name,
        }
    }

    /// Validate the new permission data.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.name,
            &self.display_name,
            &self.description,
            &self.module,
        )
    }
}

/// Data for updating an existing permission
#[derive(Debug, Clone, Default)]
pub struct PermissionUpdate {
    /// New machine name (refused for system permissions)
    pub name: Option<String>,

    /// New display name
    pub display_name: Option<String>,

    /// New description
    pub description: Option<String>,

    /// New module
    pub module: Option<String>,

    /// New type (refused for system permissions)
    pub permission_type: Option<PermissionType>,
}

/// Filter for listing permissions
#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    /// Only permissions in this module
    pub module: Option<String>,

    /// Only permissions of this type
    pub permission_type: Option<PermissionType>,

    /// Only system (or only non-system) permissions
    pub is_system: Option<bool>,

    /// Case-insensitive substring of name or display name
    pub search: Option<String>,

    /// Limit number of results
    pub limit: Option<usize>,
}

impl PermissionFilter {
    /// Check whether a permission passes this filter (ignores `limit`).
    pub fn matches(&self, permission: &Permission) -> bool {
        if let Some(module) = &self.module {
            if &permission.module != module {
                return false;
            }
        }
        if let Some(permission_type) = self.permission_type {
            if permission.permission_type != permission_type {
                return false;
            }
        }
        if let Some(is_system) = self.is_system {
            if permission.is_system != is_system {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !permission.name.to_lowercase().contains(&needle)
                && !permission.display_name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// Directed edge: `dependent` requires `dependency` to be granted first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The permission that has the requirement
    pub dependent: PermissionId,

    /// The permission that is required
    pub dependency: PermissionId,

    /// When the edge was created
    pub created_at: DateTime<Utc>,

    /// Who created the edge
    pub created_by: String,
}

impl DependencyEdge {
    /// Create an edge stamped with the current time.
    pub fn new(dependent: PermissionId, dependency: PermissionId, created_by: &str) -> Self {
        Self {
            dependent,
            dependency,
            created_at: Utc::now(),
            created_by: created_by.to_string(),
        }
    }

    /// The ordered pair identifying this edge.
    pub fn key(&self) -> (PermissionId, PermissionId) {
        (self.dependent.clone(), self.dependency.clone())
    }
}

/// Filter for listing edges
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    /// Only edges whose dependent is this permission
    pub dependent: Option<PermissionId>,

    /// Only edges whose dependency is this permission
    pub dependency: Option<PermissionId>,

    /// Edges touching this permission at either end
    pub touching: Option<PermissionId>,
}

impl EdgeFilter {
    /// Check whether an edge passes this filter.
    pub fn matches(&self, edge: &DependencyEdge) -> bool {
        if let Some(dependent) = &self.dependent {
            if &edge.dependent != dependent {
                return false;
            }
        }
        if let Some(dependency) = &self.dependency {
            if &edge.dependency != dependency {
                return false;
            }
        }
        if let Some(id) = &self.touching {
            if &edge.dependent != id && &edge.dependency != id {
                return false;
            }
        }
        true
    }
}

/// Which edges a traversal follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    /// Follow `dependent -> dependency` edges (what does this require?)
    #[default]
    Dependencies,

    /// Follow edges backwards (what requires this?)
    Dependents,

    /// Follow edges either way at every hop
    Both,
}

/// How a discovered permission relates to the node it was reached from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Reached through an outgoing edge
    Dependency,

    /// Reached through an incoming edge
    Dependent,
}

/// A permission found by a bounded traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredPermission {
    /// The permission
    pub permission: Permission,

    /// Number of hops from the start node (1 for direct neighbors)
    pub depth: usize,

    /// Edge direction through which it was first reached
    pub relation: Relation,

    /// The node it was reached from
    pub via: PermissionId,
}

/// A node of an expanded dependency tree.
///
/// Unlike [`DiscoveredPermission`] lists, a permission reachable through
/// several routes appears once per route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepTreeNode {
    /// Permission ID of this node
    pub id: PermissionId,

    /// Machine name
    pub name: String,

    /// Permission type
    #[serde(rename = "type")]
    pub permission_type: PermissionType,

    /// Set when this node already appears on the path from the root; its
    /// children are not expanded again.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cycle: bool,

    /// Children of this node
    pub children: Vec<DepTreeNode>,
}

impl DepTreeNode {
    /// Total number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DepTreeNode::node_count).sum::<usize>()
    }
}

/// Result of a whole-graph cycle check
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CycleReport {
    /// Whether a cycle exists
    pub has_cycle: bool,

    /// Ids forming the cycle, first id repeated at the end
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycle_path: Vec<PermissionId>,

    /// The back edge that closes the cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_edge: Option<(PermissionId, PermissionId)>,
}

impl CycleReport {
    /// A report for an acyclic graph.
    pub fn acyclic() -> Self {
        Self::default()
    }
}

/// Outcome of validating a prospective edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    /// Whether the edge may be inserted
    pub allowed: bool,

    /// Why the edge was refused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationError>,
}

impl DependencyCheck {
    /// An accepted check.
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// A refused check.
    pub fn rejected(reason: ValidationError) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// One hop of an explained path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    /// Position in the path, starting at 0
    pub index: usize,

    /// The permission at this position
    pub permission: Permission,
}

/// A proposed edge that was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProposal {
    /// Proposed dependent
    pub dependent: PermissionId,

    /// Proposed dependency
    pub dependency: PermissionId,

    /// Why it was not applied
    pub reason: ValidationError,
}

/// Result of policy-driven auto-resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoResolveOutcome {
    /// Edges that passed validation (and were committed, when run via the service)
    pub inserted: Vec<DependencyEdge>,

    /// Proposals that were dropped, with reasons
    pub skipped: Vec<SkippedProposal>,
}

/// Result of adding several dependencies to one permission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Edges committed
    pub added: Vec<DependencyEdge>,

    /// Requested edges refused, with reasons
    pub rejected: Vec<SkippedProposal>,
}

/// Which permissions auto-resolution proposes dependencies for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveScope {
    /// Only the anchor permission itself
    Permission,

    /// Every permission in the anchor's module
    Module,

    /// Permissions of the given type in the anchor's module
    Type(PermissionType),
}

/// Caller identity for a single mutation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Recorded as `created_by` on new edges and in audit events
    pub actor: String,
}

impl RequestContext {
    /// Create a context for the given actor.
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("users.view", PermissionType::View)]
    #[case("users.update", PermissionType::Edit)]
    #[case("roles.destroy", PermissionType::Delete)]
    #[case("settings.manage", PermissionType::Manage)]
    #[case("reports.export", PermissionType::Other)]
    fn test_infer_type_from_name(#[case] name: &str, #[case] expected: PermissionType) {
        assert_eq!(PermissionType::infer_from_name(name), expected);
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(resource_key("users.profile.edit"), "users.profile");
        assert_eq!(resource_key("users.view"), "users");
        assert_eq!(resource_key("dashboard"), "dashboard");
    }

    #[rstest]
    #[case("")]
    #[case("users..view")]
    #[case("Users.view")]
    #[case("users.view ")]
    #[case(".view")]
    fn test_invalid_names(#[case] name: &str) {
        assert!(validate_name(name).is_err());
    }

    #[test]
    fn test_new_permission_from_name() {
        let new = NewPermission::from_name("posts.delete");
        assert_eq!(new.module, "posts");
        assert_eq!(new.permission_type, PermissionType::Delete);
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_edge_filter_touching() {
        let edge = DependencyEdge::new("a".into(), "b".into(), "tester");
        let filter = EdgeFilter {
            touching: Some("b".into()),
            ..Default::default()
        };
        assert!(filter.matches(&edge));

        let filter = EdgeFilter {
            touching: Some("c".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&edge));
    }

    #[test]
    fn test_permission_filter_search_is_case_insensitive() {
        let now = Utc::now();
        let permission = Permission {
            id: "perm-1".into(),
            name: "users.view".to_string(),
            display_name: "View Users".to_string(),
            description: String::new(),
            module: "users".to_string(),
            permission_type: PermissionType::View,
            is_system: false,
            created_at: now,
            updated_at: now,
        };
        let filter = PermissionFilter {
            search: Some("VIEW us".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&permission));
    }
}
