//! PermissionStore trait implementation for in-memory storage.

use super::InMemoryStore;
use crate::domain::{
    DependencyEdge, EdgeFilter, NewPermission, Permission, PermissionFilter, PermissionId,
    PermissionUpdate,
};
use crate::error::{Error, Result, ValidationError};
use crate::storage::{PermissionStore, StoreSnapshot};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn create_permission(&self, new_permission: NewPermission) -> Result<Permission> {
        let mut inner = self.lock().await;

        let permission = inner.build_permission(new_permission)?;
        inner.insert_permission(permission.clone());

        tracing::debug!(id = %permission.id, name = %permission.name, "Created permission");
        Ok(permission)
    }

    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>> {
        let inner = self.lock().await;
        Ok(inner.permissions.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let inner = self.lock().await;
        Ok(inner
            .names
            .get(name)
            .and_then(|id| inner.permissions.get(id))
            .cloned())
    }

    async fn update_permission(
        &self,
        id: &PermissionId,
        update: PermissionUpdate,
    ) -> Result<Permission> {
        let mut inner = self.lock().await;

        // === Phase 1: validate against a copy ===
        let current = inner
            .permissions
            .get(id)
            .ok_or_else(|| Error::PermissionNotFound(id.clone()))?;

        let renames = update.name.as_ref().is_some_and(|name| name != &current.name);
        let retypes = update
            .permission_type
            .is_some_and(|permission_type| permission_type != current.permission_type);
        if current.is_system && (renames || retypes) {
            return Err(Error::SystemPermission(id.clone()));
        }

        let mut updated = current.clone();
        let old_name = current.name.clone();
        if let Some(name) = update.name {
            updated.name = name;
        }
        if let Some(display_name) = update.display_name {
            updated.display_name = display_name;
        }
        if let Some(description) = update.description {
            updated.description = description;
        }
        if let Some(module) = update.module {
            updated.module = module;
        }
        if let Some(permission_type) = update.permission_type {
            updated.permission_type = permission_type;
        }
        updated.validate().map_err(Error::InvalidPermission)?;

        if renames && inner.names.contains_key(&updated.name) {
            return Err(Error::DuplicatePermissionName(updated.name));
        }

        // === Phase 2: apply ===
        updated.updated_at = Utc::now();
        if renames {
            inner.names.remove(&old_name);
            inner.names.insert(updated.name.clone(), id.clone());
        }
        inner.permissions.insert(id.clone(), updated.clone());

        Ok(updated)
    }

    async fn delete_permission(&self, id: &PermissionId) -> Result<Vec<DependencyEdge>> {
        let mut inner = self.lock().await;

        let permission = inner
            .permissions
            .get(id)
            .ok_or_else(|| Error::PermissionNotFound(id.clone()))?;

        if permission.is_system {
            return Err(Error::SystemPermission(id.clone()));
        }

        let dependents = inner.dependents_of(id);
        if !dependents.is_empty() {
            return Err(Error::HasDependents {
                id: id.clone(),
                dependents,
            });
        }

        let removed = inner.remove_outgoing(id);
        if let Some(permission) = inner.permissions.remove(id) {
            inner.names.remove(&permission.name);
        }
        inner.id_generator.release_id(id.as_str());
        inner.bump_revision();

        tracing::debug!(%id, edges = removed.len(), "Deleted permission");
        Ok(removed)
    }

    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<Vec<Permission>> {
        let inner = self.lock().await;

        let mut permissions: Vec<Permission> = inner
            .permissions
            .values()
            .filter(|permission| filter.matches(permission))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(limit) = filter.limit {
            permissions.truncate(limit);
        }
        Ok(permissions)
    }

    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<DependencyEdge>> {
        let inner = self.lock().await;
        Ok(inner
            .edges
            .values()
            .filter(|edge| filter.matches(edge))
            .cloned()
            .collect())
    }

    async fn snapshot(&self) -> Result<StoreSnapshot> {
        let inner = self.lock().await;
        Ok(StoreSnapshot {
            permissions: inner.permissions.values().cloned().collect(),
            edges: inner.edges.values().cloned().collect(),
            revision: inner.revision,
        })
    }

    async fn revision(&self) -> Result<u64> {
        Ok(self.lock().await.revision)
    }

    async fn commit_edges(
        &self,
        expected_revision: u64,
        edges: Vec<DependencyEdge>,
    ) -> Result<u64> {
        let mut inner = self.lock().await;

        if inner.revision != expected_revision {
            return Err(Error::ConcurrencyConflict {
                expected: expected_revision,
                actual: inner.revision,
            });
        }

        // === Phase 1: row constraints (no mutations) ===
        let mut batch = HashSet::with_capacity(edges.len());
        for edge in &edges {
            for id in [&edge.dependent, &edge.dependency] {
                if !inner.permissions.contains_key(id) {
                    return Err(Error::PermissionNotFound(id.clone()));
                }
            }
            if edge.dependent == edge.dependency {
                return Err(ValidationError::SelfDependency.into());
            }
            let key = edge.key();
            if inner.edges.contains_key(&key) || !batch.insert(key) {
                return Err(ValidationError::DuplicateEdge {
                    dependent: edge.dependent.clone(),
                    dependency: edge.dependency.clone(),
                }
                .into());
            }
        }

        if edges.is_empty() {
            return Ok(inner.revision);
        }

        // === Phase 2: apply ===
        let count = edges.len();
        for edge in edges {
            inner.edges.insert(edge.key(), edge);
        }
        let revision = inner.bump_revision();

        tracing::debug!(count, revision, "Committed dependency edges");
        Ok(revision)
    }

    async fn remove_edge(
        &self,
        dependent: &PermissionId,
        dependency: &PermissionId,
    ) -> Result<DependencyEdge> {
        let mut inner = self.lock().await;

        let removed = inner
            .edges
            .remove(&(dependent.clone(), dependency.clone()))
            .ok_or_else(|| Error::DependencyNotFound {
                dependent: dependent.clone(),
                dependency: dependency.clone(),
            })?;
        inner.bump_revision();

        Ok(removed)
    }

    async fn save(&self) -> Result<()> {
        // No-op: the JSONL wrapper handles persistence.
        Ok(())
    }
}
