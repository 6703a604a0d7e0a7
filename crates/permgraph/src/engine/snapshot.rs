//! Immutable graph snapshot built from store rows.
//!
//! The snapshot is an arena: permissions live as node weights in a petgraph
//! `DiGraph` and are referenced by `NodeIndex`. Nodes are inserted in ascending
//! `PermissionId` order, so index order and id order coincide and every
//! neighbor walk that sorts by index is deterministic.

use crate::domain::{DependencyEdge, Permission, PermissionId, Relation, TraversalDirection};
use crate::error::{Error, Result};
use crate::storage::StoreSnapshot;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Read-only view of permissions and dependency edges for one logical operation.
///
/// Edge direction is **dependent -> dependency**: an edge `a -> b` means `a`
/// requires `b`.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    graph: DiGraph<Permission, ()>,
    node_map: HashMap<PermissionId, NodeIndex>,
    revision: u64,
}

impl GraphSnapshot {
    /// Build a snapshot from raw rows.
    ///
    /// Edges whose endpoints are missing are dropped with a warning. Self-loops
    /// and cycles are kept so that cycle detection can report them.
    pub fn build(mut permissions: Vec<Permission>, edges: &[DependencyEdge], revision: u64) -> Self {
        permissions.sort_by(|a, b| a.id.cmp(&b.id));
        permissions.dedup_by(|a, b| a.id == b.id);

        let mut graph = DiGraph::with_capacity(permissions.len(), edges.len());
        let mut node_map = HashMap::with_capacity(permissions.len());
        for permission in permissions {
            let id = permission.id.clone();
            let node = graph.add_node(permission);
            node_map.insert(id, node);
        }

        let mut pairs: Vec<(&PermissionId, &PermissionId)> = edges
            .iter()
            .map(|edge| (&edge.dependent, &edge.dependency))
            .collect();
        pairs.sort();
        pairs.dedup();

        for (dependent, dependency) in pairs {
            match (node_map.get(dependent), node_map.get(dependency)) {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, ());
                }
                _ => {
                    tracing::warn!(
                        %dependent,
                        %dependency,
                        "Skipping dependency edge with unknown endpoint"
                    );
                }
            }
        }

        Self {
            graph,
            node_map,
            revision,
        }
    }

    /// Store revision this snapshot was read at.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of permissions.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up the node for a permission id.
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionNotFound` if the id is unknown.
    pub fn node(&self, id: &PermissionId) -> Result<NodeIndex> {
        self.node_map
            .get(id)
            .copied()
            .ok_or_else(|| Error::PermissionNotFound(id.clone()))
    }

    /// The permission stored at a node.
    pub fn permission(&self, node: NodeIndex) -> &Permission {
        &self.graph[node]
    }

    /// The permission id stored at a node.
    pub fn id(&self, node: NodeIndex) -> &PermissionId {
        &self.graph[node].id
    }

    /// Look up a permission by id.
    pub fn get(&self, id: &PermissionId) -> Option<&Permission> {
        self.node_map.get(id).map(|&node| &self.graph[node])
    }

    /// All permissions in ascending id order.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.graph.node_indices().map(|node| &self.graph[node])
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// Whether `dependent -> dependency` is present.
    pub fn contains_edge(&self, dependent: NodeIndex, dependency: NodeIndex) -> bool {
        self.graph.find_edge(dependent, dependency).is_some()
    }

    /// Add an edge to this (working) copy. Duplicate pairs are ignored.
    pub(crate) fn add_edge(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        if !self.contains_edge(dependent, dependency) {
            self.graph.add_edge(dependent, dependency, ());
        }
    }

    /// Direct dependencies of a node in ascending id order.
    pub fn dependencies_of(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(node, Direction::Outgoing)
    }

    /// Direct dependents of a node in ascending id order.
    pub fn dependents_of(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(node, Direction::Incoming)
    }

    /// Neighbors in the requested direction(s), tagged with the relation.
    ///
    /// For [`TraversalDirection::Both`] dependencies come before dependents.
    pub(crate) fn neighbors(
        &self,
        node: NodeIndex,
        direction: TraversalDirection,
    ) -> Vec<(NodeIndex, Relation)> {
        let outgoing = || {
            self.dependencies_of(node)
                .into_iter()
                .map(|n| (n, Relation::Dependency))
        };
        let incoming = || {
            self.dependents_of(node)
                .into_iter()
                .map(|n| (n, Relation::Dependent))
        };

        match direction {
            TraversalDirection::Dependencies => outgoing().collect(),
            TraversalDirection::Dependents => incoming().collect(),
            TraversalDirection::Both => outgoing().chain(incoming()).collect(),
        }
    }

    fn sorted_neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }
}

impl From<StoreSnapshot> for GraphSnapshot {
    fn from(snapshot: StoreSnapshot) -> Self {
        Self::build(snapshot.permissions, &snapshot.edges, snapshot.revision)
    }
}
