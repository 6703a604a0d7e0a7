//! JSONL persistence for in-memory storage.
//!
//! One record per line, tagged by `kind`:
//!
//! ```text
//! {"kind":"permission","id":"perm-a1b2","name":"users.view",...}
//! {"kind":"edge","dependent":"perm-c3d4","dependency":"perm-a1b2",...}
//! ```
//!
//! Permissions are written before edges, each group in a stable order, so
//! saves produce minimal diffs under version control.
//!
//! Loads and writes also return a SHA-256 [`Fingerprint`] of the file bytes,
//! which the JSONL backend uses to notice writes made by other processes.

use super::inner::InMemoryStoreInner;
use crate::domain::{DependencyEdge, Permission, PermissionId};
use crate::error::Result;
use crate::storage::PermissionStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// SHA-256 digest of a data file's contents.
pub(crate) type Fingerprint = [u8; 32];

fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

/// Fingerprint of the file at `path`, or `None` if it does not exist.
pub(crate) async fn read_fingerprint(path: &Path) -> Result<Option<Fingerprint>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(fingerprint(&bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// One line of the data file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    Permission(Permission),
    Edge(DependencyEdge),
}

/// Non-fatal problems found while loading a JSONL file.
///
/// Loading continues past every one of these; the offending line or edge is
/// skipped. Cycles are **not** a load warning: they are loaded as-is so that
/// `dep check` can report them.
///
/// ```no_run
/// # use permgraph::storage::in_memory::{LoadWarning, load_from_jsonl};
/// # use std::path::Path;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let (_store, warnings) =
///     load_from_jsonl(Path::new(".permgraph/graph.jsonl"), "perm".to_string()).await?;
/// for warning in warnings {
///     if let LoadWarning::OrphanedEdge { dependent, dependency } = &warning {
///         eprintln!("dropped {dependent} -> {dependency}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A line that is not a valid record.
    ///
    /// **Effect**: the line is skipped.
    MalformedJson {
        /// 1-based line number
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// A permission record whose fields fail validation.
    ///
    /// **Effect**: the permission is skipped; edges touching it become orphans.
    InvalidPermission {
        /// ID from the record
        permission_id: PermissionId,
        /// 1-based line number
        line_number: usize,
        /// Validation message
        error: String,
    },

    /// A permission whose ID or name was already loaded.
    ///
    /// **Effect**: the later record is skipped.
    DuplicatePermission {
        /// ID from the record
        permission_id: PermissionId,
        /// 1-based line number
        line_number: usize,
    },

    /// An edge referencing a permission that was not loaded.
    ///
    /// **Effect**: the edge is skipped.
    OrphanedEdge {
        /// Dependent end
        dependent: PermissionId,
        /// Dependency end
        dependency: PermissionId,
    },

    /// An edge whose pair was already loaded.
    ///
    /// **Effect**: the later record is skipped.
    DuplicateEdge {
        /// Dependent end
        dependent: PermissionId,
        /// Dependency end
        dependency: PermissionId,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed record: {error}")
            }
            Self::InvalidPermission {
                permission_id,
                line_number,
                error,
            } => write!(
                f,
                "line {line_number}: invalid permission {permission_id}: {error}"
            ),
            Self::DuplicatePermission {
                permission_id,
                line_number,
            } => write!(
                f,
                "line {line_number}: duplicate permission {permission_id}"
            ),
            Self::OrphanedEdge {
                dependent,
                dependency,
            } => write!(f, "orphaned edge {dependent} -> {dependency}"),
            Self::DuplicateEdge {
                dependent,
                dependency,
            } => write!(f, "duplicate edge {dependent} -> {dependency}"),
        }
    }
}

/// Load a store from a JSONL file.
///
/// Permissions are imported first, then edges, so record order in the file
/// does not matter. Generated IDs of loaded permissions are registered so new
/// permissions never collide with them.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened or read. Bad records are
/// reported as [`LoadWarning`]s instead.
pub async fn load_from_jsonl(
    path: &Path,
    prefix: String,
) -> Result<(Arc<dyn PermissionStore>, Vec<LoadWarning>)> {
    let (store, warnings, _) = load_with_fingerprint(path, prefix).await?;
    Ok((store, warnings))
}

/// [`load_from_jsonl`], also returning the fingerprint of the bytes read.
pub(crate) async fn load_with_fingerprint(
    path: &Path,
    prefix: String,
) -> Result<(Arc<dyn PermissionStore>, Vec<LoadWarning>, Fingerprint)> {
    let bytes = tokio::fs::read(path).await?;
    let loaded = fingerprint(&bytes);
    let content =
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut warnings = Vec::new();
    let mut permissions = Vec::new();
    let mut edges = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(Record::Permission(permission)) => permissions.push((line_number, permission)),
            Ok(Record::Edge(edge)) => edges.push(edge),
            Err(e) => warnings.push(LoadWarning::MalformedJson {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    let mut inner = InMemoryStoreInner::new(prefix);

    for (line_number, permission) in permissions {
        if let Err(error) = permission.validate() {
            warnings.push(LoadWarning::InvalidPermission {
                permission_id: permission.id,
                line_number,
                error,
            });
            continue;
        }
        if inner.permissions.contains_key(&permission.id)
            || inner.names.contains_key(&permission.name)
        {
            warnings.push(LoadWarning::DuplicatePermission {
                permission_id: permission.id,
                line_number,
            });
            continue;
        }
        inner.insert_permission(permission);
    }

    for edge in edges {
        if !inner.permissions.contains_key(&edge.dependent)
            || !inner.permissions.contains_key(&edge.dependency)
        {
            warnings.push(LoadWarning::OrphanedEdge {
                dependent: edge.dependent,
                dependency: edge.dependency,
            });
            continue;
        }
        let key = edge.key();
        if inner.edges.contains_key(&key) {
            warnings.push(LoadWarning::DuplicateEdge {
                dependent: edge.dependent,
                dependency: edge.dependency,
            });
            continue;
        }
        inner.edges.insert(key, edge);
    }

    tracing::debug!(
        path = %path.display(),
        permissions = inner.permissions.len(),
        edges = inner.edges.len(),
        warnings = warnings.len(),
        "Loaded JSONL data file"
    );

    let store: Arc<dyn PermissionStore> = Arc::new(Arc::new(Mutex::new(inner)));
    Ok((store, warnings, loaded))
}

/// Save a store to a JSONL file with atomic writes.
///
/// Writes to a sibling temp file, then renames it over `path`. If the process
/// dies mid-write the original file is left untouched.
///
/// # Errors
///
/// Returns `Error::Io` or `Error::Json` if writing fails.
pub async fn save_to_jsonl(store: &dyn PermissionStore, path: &Path) -> Result<()> {
    write_jsonl(store, path).await.map(|_| ())
}

/// [`save_to_jsonl`], returning the fingerprint of the bytes written.
pub(crate) async fn write_jsonl(store: &dyn PermissionStore, path: &Path) -> Result<Fingerprint> {
    let temp_path = path.with_extension("tmp");

    let mut snapshot = store.snapshot().await?;
    snapshot.permissions.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot
        .edges
        .sort_by(|a, b| (&a.dependent, &a.dependency).cmp(&(&b.dependent, &b.dependency)));

    let records = snapshot
        .permissions
        .into_iter()
        .map(Record::Permission)
        .chain(snapshot.edges.into_iter().map(Record::Edge));

    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, &record)?;
        buf.push(b'\n');
    }

    tokio::fs::write(&temp_path, &buf).await?;
    tokio::fs::rename(&temp_path, path).await?;

    tracing::debug!(path = %path.display(), bytes = buf.len(), "Saved JSONL data file");
    Ok(fingerprint(&buf))
}
