//! Storage abstraction layer for permgraph.
//!
//! This module provides the store trait the dependency service runs against
//! and a factory for creating backends:
//!
//! - **In-memory**: fast, ephemeral storage behind a tokio mutex
//! - **JSONL**: the in-memory store loaded from and saved to a JSON Lines file
//!
//! # Consistency model
//!
//! The store owns the edge set and a monotonically increasing **revision**.
//! Callers read a [`StoreSnapshot`], validate against it with the engine, and
//! hand the accepted edges to [`PermissionStore::commit_edges`] together with
//! the revision they validated against. If anything that could change the
//! validation result happened in between, the commit fails with
//! `Error::ConcurrencyConflict` and writes nothing. The store also refuses a
//! pair that already exists, independently of the revision check.
//!
//! # Example
//!
//! ```no_run
//! use permgraph::domain::NewPermission;
//! use permgraph::storage::{StorageBackend, create_storage};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = create_storage(StorageBackend::InMemory, "perm".to_string()).await?;
//!
//!     let view = store.create_permission(NewPermission::from_name("users.view")).await?;
//!     let edit = store.create_permission(NewPermission::from_name("users.edit")).await?;
//!
//!     let snapshot = store.snapshot().await?;
//!     let edge = permgraph::domain::DependencyEdge::new(edit.id, view.id, "seeder");
//!     store.commit_edges(snapshot.revision, vec![edge]).await?;
//!     Ok(())
//! }
//! ```

pub mod in_memory;

use crate::domain::{
    DependencyEdge, EdgeFilter, NewPermission, Permission, PermissionFilter, PermissionId,
    PermissionUpdate,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Consistent read of every permission and edge at one revision.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// All permissions
    pub permissions: Vec<Permission>,

    /// All dependency edges
    pub edges: Vec<DependencyEdge>,

    /// Revision the rows were read at
    pub revision: u64,
}

/// Core storage trait for permissions and dependency edges.
///
/// All methods take `&self`: implementations synchronize internally so one
/// store can be shared across tasks behind an `Arc`.
///
/// The store does not check for cycles. Edges must pass the engine's
/// insertion gate before they are committed; the revision check makes sure
/// that validation is still current when the write lands.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Create a new permission with a generated ID.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPermission` if a field fails validation
    /// - `Error::DuplicatePermissionName` if the name is taken
    async fn create_permission(&self, new_permission: NewPermission) -> Result<Permission>;

    /// Get a permission by ID.
    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>>;

    /// Get a permission by its machine name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Permission>>;

    /// Update a permission's descriptive fields.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if the ID is unknown
    /// - `Error::SystemPermission` when renaming or retyping a system permission
    /// - `Error::DuplicatePermissionName` if the new name is taken
    /// - `Error::InvalidPermission` if the result fails validation
    async fn update_permission(
        &self,
        id: &PermissionId,
        update: PermissionUpdate,
    ) -> Result<Permission>;

    /// Delete a permission together with its outgoing edges.
    ///
    /// Returns the edges that were removed.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if the ID is unknown
    /// - `Error::SystemPermission` for system permissions
    /// - `Error::HasDependents` while other permissions still depend on it
    async fn delete_permission(&self, id: &PermissionId) -> Result<Vec<DependencyEdge>>;

    /// List permissions matching a filter, sorted by name.
    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<Vec<Permission>>;

    /// List edges matching a filter, sorted by `(dependent, dependency)`.
    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<DependencyEdge>>;

    /// Read every permission and edge at the current revision.
    async fn snapshot(&self) -> Result<StoreSnapshot>;

    /// Current revision.
    async fn revision(&self) -> Result<u64>;

    /// Insert validated edges if the store is still at `expected_revision`.
    ///
    /// Either every edge is inserted or none is. Returns the new revision.
    ///
    /// # Errors
    ///
    /// - `Error::ConcurrencyConflict` if the revision moved
    /// - `Error::Validation` with `DuplicateEdge` or `SelfDependency` if a pair
    ///   violates the store's own constraints
    /// - `Error::PermissionNotFound` if an endpoint is unknown
    async fn commit_edges(&self, expected_revision: u64, edges: Vec<DependencyEdge>)
    -> Result<u64>;

    /// Remove one edge. Removal can never introduce a cycle, so it is not
    /// revision-checked.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyNotFound` if the edge does not exist.
    async fn remove_edge(
        &self,
        dependent: &PermissionId,
        dependency: &PermissionId,
    ) -> Result<DependencyEdge>;

    /// Persist pending changes. A no-op for purely in-memory stores.
    ///
    /// # Errors
    ///
    /// - `Error::StaleDataFile` if a file-backed store's file was rewritten
    ///   by another process since it was loaded; nothing is written
    /// - `Error::Io` or `Error::Json` if writing fails
    async fn save(&self) -> Result<()>;
}

/// Storage backend type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// JSONL file storage (persistent)
    Jsonl(PathBuf),
}

impl StorageBackend {
    /// Returns the data file path for file-based backends.
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StorageBackend::Jsonl(path) => Some(path),
            StorageBackend::InMemory => None,
        }
    }
}

/// Wrapper that adds JSONL file persistence to a store.
///
/// Every call is forwarded; `save()` writes the full snapshot atomically.
/// Each process holds its own copy of the data, so the in-memory revision
/// cannot see other writers. Instead `save()` compares the file against the
/// fingerprint taken at load (or at the previous save) and refuses to
/// overwrite a file that changed in between.
struct JsonlBackedStore {
    inner: Arc<dyn PermissionStore>,
    path: PathBuf,
    /// `None` when the file did not exist yet
    fingerprint: Mutex<Option<in_memory::Fingerprint>>,
}

#[async_trait]
impl PermissionStore for JsonlBackedStore {
    async fn create_permission(&self, new_permission: NewPermission) -> Result<Permission> {
        self.inner.create_permission(new_permission).await
    }

    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>> {
        self.inner.get_permission(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Permission>> {
        self.inner.find_by_name(name).await
    }

    async fn update_permission(
        &self,
        id: &PermissionId,
        update: PermissionUpdate,
    ) -> Result<Permission> {
        self.inner.update_permission(id, update).await
    }

    async fn delete_permission(&self, id: &PermissionId) -> Result<Vec<DependencyEdge>> {
        self.inner.delete_permission(id).await
    }

    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<Vec<Permission>> {
        self.inner.list_permissions(filter).await
    }

    async fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<DependencyEdge>> {
        self.inner.list_edges(filter).await
    }

    async fn snapshot(&self) -> Result<StoreSnapshot> {
        self.inner.snapshot().await
    }

    async fn revision(&self) -> Result<u64> {
        self.inner.revision().await
    }

    async fn commit_edges(
        &self,
        expected_revision: u64,
        edges: Vec<DependencyEdge>,
    ) -> Result<u64> {
        self.inner.commit_edges(expected_revision, edges).await
    }

    async fn remove_edge(
        &self,
        dependent: &PermissionId,
        dependency: &PermissionId,
    ) -> Result<DependencyEdge> {
        self.inner.remove_edge(dependent, dependency).await
    }

    async fn save(&self) -> Result<()> {
        let mut fingerprint = self.fingerprint.lock().await;

        let on_disk = in_memory::read_fingerprint(&self.path).await?;
        if on_disk != *fingerprint {
            tracing::warn!(path = %self.path.display(), "Data file changed since it was loaded");
            return Err(Error::StaleDataFile {
                path: self.path.display().to_string(),
            });
        }

        *fingerprint = Some(in_memory::write_jsonl(self.inner.as_ref(), &self.path).await?);
        Ok(())
    }
}

/// Create a store for the given backend.
///
/// For [`StorageBackend::Jsonl`] an existing file is loaded (load warnings are
/// logged and the store stays usable); a missing file starts an empty store
/// that will be created on the first `save()`.
///
/// # Errors
///
/// - `Error::Io` if the data file cannot be read
pub async fn create_storage(
    backend: StorageBackend,
    prefix: String,
) -> Result<Arc<dyn PermissionStore>> {
    match backend {
        StorageBackend::InMemory => Ok(in_memory::new_in_memory_store(prefix)),
        StorageBackend::Jsonl(path) => {
            let (inner, fingerprint) = if path.exists() {
                let (store, warnings, fingerprint) =
                    in_memory::load_with_fingerprint(&path, prefix).await?;
                for warning in &warnings {
                    tracing::warn!(%warning, "JSONL load warning");
                }
                (store, Some(fingerprint))
            } else {
                tracing::debug!(path = %path.display(), "Data file missing, starting empty");
                (in_memory::new_in_memory_store(prefix), None)
            };
            Ok(Arc::new(JsonlBackedStore {
                inner,
                path,
                fingerprint: Mutex::new(fingerprint),
            }))
        }
    }
}
