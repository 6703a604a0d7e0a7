//! Request-scoped dependency service.
//!
//! [`DependencyService`] ties the engine to a [`PermissionStore`]. Queries read
//! one snapshot and never lock. Mutations re-read a fresh snapshot, validate it
//! with the engine, and commit against the snapshot's revision; a
//! `ConcurrencyConflict` is retried once from a new snapshot.
//!
//! Successful mutations emit an audit event on the `permgraph::audit` target.

use crate::domain::{
    AutoResolveOutcome, BatchOutcome, CycleReport, DepTreeNode, DependencyCheck, DependencyEdge,
    DiscoveredPermission, NewPermission, PathStep, Permission, PermissionId, PermissionUpdate,
    RequestContext, ResolveScope, TraversalDirection,
};
use crate::engine::{DependencyGraphEngine, EngineLimits, GraphSnapshot, PrecedencePolicy};
use crate::error::{Error, Result};
use crate::storage::PermissionStore;
use std::sync::Arc;

/// Attempts per mutation: the first try plus one retry on conflict.
const MAX_COMMIT_ATTEMPTS: usize = 2;

const AUDIT_TARGET: &str = "permgraph::audit";

/// Facade over a store and the graph engine.
#[derive(Clone)]
pub struct DependencyService {
    store: Arc<dyn PermissionStore>,
    limits: EngineLimits,
    policy: PrecedencePolicy,
}

impl std::fmt::Debug for DependencyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyService")
            .field("store", &"<dyn PermissionStore>")
            .field("limits", &self.limits)
            .field("policy", &self.policy)
            .finish()
    }
}

impl DependencyService {
    /// Create a service over a shared store.
    pub fn new(
        store: Arc<dyn PermissionStore>,
        limits: EngineLimits,
        policy: PrecedencePolicy,
    ) -> Self {
        Self {
            store,
            limits,
            policy,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    /// The precedence policy used by auto-resolution.
    pub fn policy(&self) -> &PrecedencePolicy {
        &self.policy
    }

    /// Build an engine over a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn engine(&self) -> Result<DependencyGraphEngine> {
        let snapshot = GraphSnapshot::from(self.store.snapshot().await?);
        Ok(DependencyGraphEngine::new(snapshot, self.limits))
    }

    // ===== Queries =====

    /// See [`DependencyGraphEngine::get_dependencies`].
    ///
    /// # Errors
    ///
    /// `PermissionNotFound`, `TraversalLimitExceeded`, or a store failure.
    pub async fn get_dependencies(
        &self,
        id: &PermissionId,
        max_depth: usize,
        direction: TraversalDirection,
    ) -> Result<Vec<DiscoveredPermission>> {
        self.engine().await?.get_dependencies(id, max_depth, direction)
    }

    /// See [`DependencyGraphEngine::dependency_tree`].
    ///
    /// # Errors
    ///
    /// `PermissionNotFound`, `TraversalLimitExceeded`, or a store failure.
    pub async fn dependency_tree(
        &self,
        id: &PermissionId,
        max_depth: usize,
        direction: TraversalDirection,
    ) -> Result<DepTreeNode> {
        self.engine().await?.dependency_tree(id, max_depth, direction)
    }

    /// See [`DependencyGraphEngine::detect_cycle`].
    ///
    /// # Errors
    ///
    /// `TraversalLimitExceeded` or a store failure.
    pub async fn detect_cycle(&self) -> Result<CycleReport> {
        self.engine().await?.detect_cycle()
    }

    /// See [`DependencyGraphEngine::detect_all_cycles`].
    ///
    /// # Errors
    ///
    /// `TraversalLimitExceeded` or a store failure.
    pub async fn detect_all_cycles(&self) -> Result<Vec<Vec<PermissionId>>> {
        self.engine().await?.detect_all_cycles()
    }

    /// See [`DependencyGraphEngine::can_add_dependency`].
    ///
    /// # Errors
    ///
    /// `PermissionNotFound`, `TraversalLimitExceeded`, or a store failure.
    pub async fn can_add_dependency(
        &self,
        dependent: &PermissionId,
        dependency: &PermissionId,
    ) -> Result<DependencyCheck> {
        self.engine()
            .await?
            .can_add_dependency(dependent, dependency)
    }

    /// See [`DependencyGraphEngine::explain_path`].
    ///
    /// # Errors
    ///
    /// `PermissionNotFound`, `TraversalLimitExceeded`, or a store failure.
    pub async fn explain_path(
        &self,
        from: &PermissionId,
        to: &PermissionId,
    ) -> Result<Option<Vec<PathStep>>> {
        self.engine().await?.explain_path(from, to)
    }

    // ===== Edge mutations =====

    /// Validate and insert one edge.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if the engine refuses the edge
    /// - `Error::ConcurrencyConflict` if the retry conflicts too
    /// - `Error::PermissionNotFound` if either id is unknown
    pub async fn add_dependency(
        &self,
        ctx: &RequestContext,
        dependent: &PermissionId,
        dependency: &PermissionId,
    ) -> Result<DependencyEdge> {
        let edge = self
            .commit_with_retry(|engine| {
                engine
                    .can_add_dependency(dependent, dependency)?
                    .into_result()?;
                let edge = DependencyEdge::new(dependent.clone(), dependency.clone(), &ctx.actor);
                Ok((vec![edge.clone()], edge))
            })
            .await?;

        tracing::info!(
            target: AUDIT_TARGET,
            actor = %ctx.actor,
            action = "add_dependency",
            %dependent,
            %dependency,
            "Dependency added"
        );
        Ok(edge)
    }

    /// Validate several dependencies for one permission and commit the
    /// accepted ones together.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if any id is unknown
    /// - `Error::ConcurrencyConflict` if the retry conflicts too
    pub async fn add_dependencies(
        &self,
        ctx: &RequestContext,
        dependent: &PermissionId,
        dependencies: &[PermissionId],
    ) -> Result<BatchOutcome> {
        let outcome = self
            .commit_with_retry(|engine| {
                let outcome = engine.validate_batch(dependent, dependencies, &ctx.actor)?;
                Ok((outcome.added.clone(), outcome))
            })
            .await?;

        tracing::info!(
            target: AUDIT_TARGET,
            actor = %ctx.actor,
            action = "add_dependencies",
            %dependent,
            added = outcome.added.len(),
            rejected = outcome.rejected.len(),
            "Dependencies added"
        );
        Ok(outcome)
    }

    /// Propose dependencies from the precedence policy and commit the ones
    /// that pass validation.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if `anchor` is unknown
    /// - `Error::ConcurrencyConflict` if the retry conflicts too
    pub async fn auto_resolve_dependencies(
        &self,
        ctx: &RequestContext,
        anchor: &PermissionId,
        scope: &ResolveScope,
    ) -> Result<AutoResolveOutcome> {
        let outcome = self
            .commit_with_retry(|engine| {
                let outcome =
                    engine.auto_resolve_dependencies(anchor, scope, &self.policy, &ctx.actor)?;
                Ok((outcome.inserted.clone(), outcome))
            })
            .await?;

        tracing::info!(
            target: AUDIT_TARGET,
            actor = %ctx.actor,
            action = "auto_resolve_dependencies",
            %anchor,
            ?scope,
            inserted = outcome.inserted.len(),
            skipped = outcome.skipped.len(),
            "Dependencies auto-resolved"
        );
        Ok(outcome)
    }

    /// Remove one edge.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyNotFound` if the edge does not exist.
    pub async fn remove_dependency(
        &self,
        ctx: &RequestContext,
        dependent: &PermissionId,
        dependency: &PermissionId,
    ) -> Result<DependencyEdge> {
        let removed = self.store.remove_edge(dependent, dependency).await?;

        tracing::info!(
            target: AUDIT_TARGET,
            actor = %ctx.actor,
            action = "remove_dependency",
            %dependent,
            %dependency,
            "Dependency removed"
        );
        Ok(removed)
    }

    // ===== Permission mutations =====

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// `InvalidPermission`, `DuplicatePermissionName`, or a store failure.
    pub async fn create_permission(
        &self,
        ctx: &RequestContext,
        new_permission: NewPermission,
    ) -> Result<Permission> {
        let permission = self.store.create_permission(new_permission).await?;
        tracing::info!(
            target: AUDIT_TARGET,
            actor = %ctx.actor,
            action = "create_permission",
            id = %permission.id,
            name = %permission.name,
            "Permission created"
        );
        Ok(permission)
    }

    /// Update a permission.
    ///
    /// # Errors
    ///
    /// See [`PermissionStore::update_permission`].
    pub async fn update_permission(
        &self,
        ctx: &RequestContext,
        id: &PermissionId,
        update: PermissionUpdate,
    ) -> Result<Permission> {
        let permission = self.store.update_permission(id, update).await?;
        tracing::info!(
            target: AUDIT_TARGET,
            actor = %ctx.actor,
            action = "update_permission",
            %id,
            "Permission updated"
        );
        Ok(permission)
    }

    /// Delete a permission and its outgoing edges.
    ///
    /// # Errors
    ///
    /// See [`PermissionStore::delete_permission`].
    pub async fn delete_permission(
        &self,
        ctx: &RequestContext,
        id: &PermissionId,
    ) -> Result<Vec<DependencyEdge>> {
        let removed = self.store.delete_permission(id).await?;
        tracing::info!(
            target: AUDIT_TARGET,
            actor = %ctx.actor,
            action = "delete_permission",
            %id,
            edges_removed = removed.len(),
            "Permission deleted"
        );
        Ok(removed)
    }

    /// Run `attempt` against a fresh engine and commit the edges it returns.
    ///
    /// On `ConcurrencyConflict` the whole attempt is repeated from a new
    /// snapshot, up to [`MAX_COMMIT_ATTEMPTS`] times.
    async fn commit_with_retry<T, F>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut(&DependencyGraphEngine) -> Result<(Vec<DependencyEdge>, T)>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            let engine = self.engine().await?;
            let revision = engine.snapshot().revision();
            let (edges, value) = attempt(&engine)?;

            if edges.is_empty() {
                return Ok(value);
            }

            match self.store.commit_edges(revision, edges).await {
                Ok(_) => return Ok(value),
                Err(Error::ConcurrencyConflict { expected, actual })
                    if tries < MAX_COMMIT_ATTEMPTS =>
                {
                    tracing::warn!(expected, actual, "Edge set changed during validation, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::storage::in_memory::new_in_memory_store;

    async fn service_with(names: &[&str]) -> (DependencyService, Vec<PermissionId>) {
        let store = new_in_memory_store("perm".to_string());
        let mut ids = Vec::new();
        for name in names {
            let permission = store
                .create_permission(NewPermission::from_name(*name))
                .await
                .unwrap();
            ids.push(permission.id);
        }
        let service =
            DependencyService::new(store, EngineLimits::default(), PrecedencePolicy::default());
        (service, ids)
    }

    #[tokio::test]
    async fn test_add_dependency_records_actor() {
        let (service, ids) = service_with(&["users.edit", "users.view"]).await;
        let ctx = RequestContext::new("alice");

        let edge = service.add_dependency(&ctx, &ids[0], &ids[1]).await.unwrap();
        assert_eq!(edge.created_by, "alice");
        assert_eq!(service.store().revision().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_dependency_surfaces_refusal() {
        let (service, ids) = service_with(&["users.edit"]).await;
        let result = service
            .add_dependency(&RequestContext::new("alice"), &ids[0], &ids[0])
            .await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::SelfDependency))
        ));
    }

    #[tokio::test]
    async fn test_fully_rejected_batch_commits_nothing() {
        let (service, ids) = service_with(&["users.edit", "users.view"]).await;
        let ctx = RequestContext::new("alice");
        service.add_dependency(&ctx, &ids[0], &ids[1]).await.unwrap();

        let outcome = service
            .add_dependencies(&ctx, &ids[0], &[ids[1].clone()])
            .await
            .unwrap();
        assert!(outcome.added.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(service.store().revision().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_dependency() {
        let (service, ids) = service_with(&["users.edit", "users.view"]).await;
        let result = service
            .remove_dependency(&RequestContext::new("alice"), &ids[0], &ids[1])
            .await;
        assert!(matches!(result, Err(Error::DependencyNotFound { .. })));
    }
}
