//! Error types for permgraph operations.
//!
//! Expected outcomes that callers render distinctly (a refused edge, a missing
//! permission) are separate variants so they can be matched on. Infrastructure
//! failures collapse into [`Error::Io`], [`Error::Json`] and [`Error::Storage`].

use crate::domain::{PermissionId, PermissionType};
use serde::Serialize;
use std::io;
use thiserror::Error;

/// The error type for permgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend failure not covered by a more specific variant.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Referenced permission does not exist.
    #[error("Permission not found: {0}")]
    PermissionNotFound(PermissionId),

    /// Another permission already uses this machine name.
    #[error("Permission name already in use: {0}")]
    DuplicatePermissionName(String),

    /// Permission data failed validation.
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    /// System permissions cannot be deleted, renamed or retyped.
    #[error("Permission {0} is a system permission and cannot be changed this way")]
    SystemPermission(PermissionId),

    /// Permission is still required by other permissions.
    #[error("Permission {id} is required by {} other permission(s)", .dependents.len())]
    HasDependents {
        /// The permission that could not be deleted
        id: PermissionId,
        /// Permissions that depend on it
        dependents: Vec<PermissionId>,
    },

    /// No edge exists for the given pair.
    #[error("Dependency not found: {dependent} -> {dependency}")]
    DependencyNotFound {
        /// Dependent end of the missing edge
        dependent: PermissionId,
        /// Dependency end of the missing edge
        dependency: PermissionId,
    },

    /// An edge was refused by graph validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A traversal visited more nodes than allowed.
    #[error("Traversal aborted after visiting {limit} nodes; narrow the query scope")]
    TraversalLimitExceeded {
        /// The node-visit cap that was hit
        limit: usize,
    },

    /// The edge set changed between snapshot and commit.
    #[error("Concurrent modification detected (expected revision {expected}, found {actual}); retry the operation")]
    ConcurrencyConflict {
        /// Revision the caller validated against
        expected: u64,
        /// Revision found at commit time
        actual: u64,
    },

    /// The data file was rewritten by another process after it was loaded.
    #[error("Data file {path} was modified by another process since it was loaded; re-run the command")]
    StaleDataFile {
        /// Path of the data file
        path: String,
    },
}

/// Reasons a prospective dependency edge is refused.
///
/// These are expected outcomes and travel as values inside
/// [`crate::domain::DependencyCheck`] and batch results; only single-edge
/// mutations surface them as [`Error::Validation`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A permission cannot depend on itself.
    #[error("A permission cannot depend on itself")]
    SelfDependency,

    /// The edge already exists.
    #[error("Dependency already exists: {dependent} -> {dependency}")]
    DuplicateEdge {
        /// Dependent end
        dependent: PermissionId,
        /// Dependency end
        dependency: PermissionId,
    },

    /// Inserting the edge would close a cycle.
    #[error("Adding this dependency would create a cycle: {}", format_path(.cycle_path))]
    CycleWouldBeIntroduced {
        /// The cycle that would result, first id repeated at the end
        cycle_path: Vec<PermissionId>,
    },
}

fn format_path(path: &[PermissionId]) -> String {
    path.iter()
        .map(PermissionId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.permgraph/` directory found.
    #[error("Not a permgraph repository (or any parent directory). Run 'permgraph init' first.")]
    NotInitialized,

    /// `.permgraph/` already exists.
    #[error("permgraph is already initialized in {0}")]
    AlreadyInitialized(String),

    /// The config file could not be parsed or holds invalid values.
    #[error("Configuration error: {0}")]
    Invalid(String),

    /// Unsupported storage backend name.
    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    /// A precedence rule whose two sides are the same type.
    #[error("Precedence rule '{0} -> {0}' makes a permission type depend on itself")]
    ReflexiveRule(PermissionType),
}

/// A specialized Result type for permgraph operations.
pub type Result<T> = std::result::Result<T, Error>;
