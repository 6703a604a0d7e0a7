//! Core in-memory storage data structures.
//!
//! This module contains the inner store that holds all rows and is wrapped
//! in `Arc<Mutex<>>` for thread safety.

use crate::domain::{DependencyEdge, NewPermission, Permission, PermissionId};
use crate::error::{Error, Result};
use crate::id_generation::IdGenerator;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

/// Inner store (not thread-safe).
///
/// Edges are keyed by `(dependent, dependency)`, which gives the unique-pair
/// constraint for free and keeps iteration in a stable order.
pub(crate) struct InMemoryStoreInner {
    /// Permissions indexed by ID
    pub(super) permissions: HashMap<PermissionId, Permission>,

    /// Machine name to ID, for uniqueness checks and name lookups
    pub(super) names: HashMap<String, PermissionId>,

    /// Dependency edges keyed by `(dependent, dependency)`
    pub(super) edges: BTreeMap<(PermissionId, PermissionId), DependencyEdge>,

    /// Bumped on every change that could alter an edge validation result
    pub(super) revision: u64,

    /// ID generator for new permissions
    pub(super) id_generator: IdGenerator,
}

impl InMemoryStoreInner {
    /// Create an empty store
    pub(crate) fn new(prefix: String) -> Self {
        Self {
            permissions: HashMap::new(),
            names: HashMap::new(),
            edges: BTreeMap::new(),
            revision: 0,
            id_generator: IdGenerator::new(prefix),
        }
    }

    /// Build a permission row from creation data, generating its ID.
    pub(super) fn build_permission(&mut self, new_permission: NewPermission) -> Result<Permission> {
        new_permission.validate().map_err(Error::InvalidPermission)?;

        if self.names.contains_key(&new_permission.name) {
            return Err(Error::DuplicatePermissionName(new_permission.name));
        }

        let id = self
            .id_generator
            .generate(&new_permission.name)
            .map_err(|e| Error::Storage(e.to_string()))?;

        let now = Utc::now();
        Ok(Permission {
            id: PermissionId::new(id),
            name: new_permission.name,
            display_name: new_permission.display_name,
            description: new_permission.description,
            module: new_permission.module,
            permission_type: new_permission.permission_type,
            is_system: new_permission.is_system,
            created_at: now,
            updated_at: now,
        })
    }

    /// Insert a permission row as-is (used by creation and loading).
    pub(super) fn insert_permission(&mut self, permission: Permission) {
        self.id_generator.register_id(permission.id.as_str());
        self.names
            .insert(permission.name.clone(), permission.id.clone());
        self.permissions.insert(permission.id.clone(), permission);
    }

    /// IDs of permissions that depend directly on `id`, sorted.
    pub(super) fn dependents_of(&self, id: &PermissionId) -> Vec<PermissionId> {
        let mut dependents: Vec<PermissionId> = self
            .edges
            .values()
            .filter(|edge| &edge.dependency == id)
            .map(|edge| edge.dependent.clone())
            .collect();
        dependents.sort();
        dependents
    }

    /// Remove every edge whose dependent is `id`, returning them.
    pub(super) fn remove_outgoing(&mut self, id: &PermissionId) -> Vec<DependencyEdge> {
        let keys: Vec<(PermissionId, PermissionId)> = self
            .edges
            .keys()
            .filter(|(dependent, _)| dependent == id)
            .cloned()
            .collect();

        keys.into_iter()
            .filter_map(|key| self.edges.remove(&key))
            .collect()
    }

    pub(super) fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}
