//! In-memory storage backend.
//!
//! All rows live in RAM and are **lost when the process exits** unless the
//! store is wrapped for JSONL persistence (see [`load_from_jsonl`] and
//! [`save_to_jsonl`], or `StorageBackend::Jsonl`).
//!
//! # Architecture
//!
//! - `HashMap<PermissionId, Permission>` for O(1) permission lookups
//! - `HashMap<String, PermissionId>` enforcing unique machine names
//! - `BTreeMap<(dependent, dependency), DependencyEdge>` enforcing unique
//!   pairs with deterministic iteration
//! - a revision counter for optimistic concurrency
//!
//! The store keeps rows only. Graph structure is rebuilt per operation by the
//! engine from a snapshot.
//!
//! # Thread Safety
//!
//! The store is wrapped in `Arc<Mutex<InMemoryStoreInner>>`. Every operation
//! holds the lock for its whole duration, so the revision check and the write
//! in `commit_edges` are atomic with respect to other callers.

mod inner;
mod jsonl;
mod trait_impl;

use crate::storage::PermissionStore;
use inner::InMemoryStoreInner;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use jsonl::{LoadWarning, load_from_jsonl, save_to_jsonl};
pub(crate) use jsonl::{Fingerprint, load_with_fingerprint, read_fingerprint, write_jsonl};

/// Thread-safe in-memory store.
///
/// Implements [`PermissionStore`] in `trait_impl.rs`.
pub(crate) type InMemoryStore = Arc<Mutex<InMemoryStoreInner>>;

/// Create a new, empty in-memory store.
///
/// # Example
///
/// ```
/// use permgraph::storage::in_memory::new_in_memory_store;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let store = new_in_memory_store("perm".to_string());
///     assert_eq!(store.revision().await.unwrap(), 0);
/// }
/// ```
pub fn new_in_memory_store(prefix: String) -> Arc<dyn PermissionStore> {
    Arc::new(Arc::new(Mutex::new(InMemoryStoreInner::new(prefix))))
}
