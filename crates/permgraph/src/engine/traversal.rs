//! Bounded traversals over a [`GraphSnapshot`].
//!
//! Every walk counts the nodes it visits (or, for trees, materializes) and
//! aborts with `Error::TraversalLimitExceeded` once the visit cap is passed,
//! so a corrupted or unexpectedly large graph cannot stall a request.

use super::snapshot::GraphSnapshot;
use crate::domain::{DepTreeNode, Relation, TraversalDirection};
use crate::error::{Error, Result};
use petgraph::graph::NodeIndex;
use std::collections::VecDeque;

/// A node reached by [`bounded_bfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Discovery {
    pub node: NodeIndex,
    pub depth: usize,
    pub relation: Relation,
    pub via: NodeIndex,
}

/// Depth-limited BFS from `start`, excluding `start` itself.
///
/// Results are in first-discovery order. Each node is reported once, at the
/// depth it was first reached.
pub(super) fn bounded_bfs(
    snapshot: &GraphSnapshot,
    start: NodeIndex,
    max_depth: usize,
    direction: TraversalDirection,
    max_visits: usize,
) -> Result<Vec<Discovery>> {
    let mut visited = vec![false; snapshot.node_count()];
    visited[start.index()] = true;

    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut found = Vec::new();
    let mut visits = 0usize;

    while let Some((node, depth)) = queue.pop_front() {
        visits += 1;
        if visits > max_visits {
            return Err(Error::TraversalLimitExceeded { limit: max_visits });
        }

        if depth >= max_depth {
            continue;
        }

        for (neighbor, relation) in snapshot.neighbors(node, direction) {
            if visited[neighbor.index()] {
                continue;
            }
            visited[neighbor.index()] = true;
            found.push(Discovery {
                node: neighbor,
                depth: depth + 1,
                relation,
                via: node,
            });
            queue.push_back((neighbor, depth + 1));
        }
    }

    Ok(found)
}

/// Shortest `from -> ... -> to` path along dependency edges.
///
/// Returns `None` when `to` is unreachable. `from == to` yields `[from]`.
pub(super) fn shortest_path(
    snapshot: &GraphSnapshot,
    from: NodeIndex,
    to: NodeIndex,
    max_visits: usize,
) -> Result<Option<Vec<NodeIndex>>> {
    if from == to {
        return Ok(Some(vec![from]));
    }

    let mut parent: Vec<Option<NodeIndex>> = vec![None; snapshot.node_count()];
    let mut visited = vec![false; snapshot.node_count()];
    visited[from.index()] = true;

    let mut queue = VecDeque::from([from]);
    let mut visits = 0usize;

    while let Some(node) = queue.pop_front() {
        visits += 1;
        if visits > max_visits {
            return Err(Error::TraversalLimitExceeded { limit: max_visits });
        }

        for next in snapshot.dependencies_of(node) {
            if visited[next.index()] {
                continue;
            }
            visited[next.index()] = true;
            parent[next.index()] = Some(node);

            if next == to {
                return Ok(Some(unwind(&parent, from, to)));
            }
            queue.push_back(next);
        }
    }

    Ok(None)
}

/// Expand the tree under `start` down to `max_depth` levels.
///
/// Shared subgraphs are repeated under every route that reaches them, so the
/// tree can be far larger than the graph; every materialized node counts
/// against `max_visits`. A node that repeats one of its ancestors is emitted
/// flagged and not expanded.
pub(super) fn expand_tree(
    snapshot: &GraphSnapshot,
    start: NodeIndex,
    max_depth: usize,
    direction: TraversalDirection,
    max_visits: usize,
) -> Result<DepTreeNode> {
    let mut walk = TreeWalk {
        snapshot,
        direction,
        max_visits,
        visits: 0,
        path: vec![start],
    };
    walk.expand(start, max_depth)
}

struct TreeWalk<'a> {
    snapshot: &'a GraphSnapshot,
    direction: TraversalDirection,
    max_visits: usize,
    visits: usize,
    /// Nodes from the root down to the one being expanded
    path: Vec<NodeIndex>,
}

impl TreeWalk<'_> {
    fn expand(&mut self, node: NodeIndex, remaining: usize) -> Result<DepTreeNode> {
        let mut tree = self.leaf(node, false)?;
        if remaining == 0 {
            return Ok(tree);
        }

        for (child, _) in self.snapshot.neighbors(node, self.direction) {
            if self.path.contains(&child) {
                tree.children.push(self.leaf(child, true)?);
                continue;
            }
            self.path.push(child);
            let subtree = self.expand(child, remaining - 1);
            self.path.pop();
            tree.children.push(subtree?);
        }

        Ok(tree)
    }

    fn leaf(&mut self, node: NodeIndex, cycle: bool) -> Result<DepTreeNode> {
        self.visits += 1;
        if self.visits > self.max_visits {
            return Err(Error::TraversalLimitExceeded {
                limit: self.max_visits,
            });
        }

        let permission = self.snapshot.permission(node);
        Ok(DepTreeNode {
            id: permission.id.clone(),
            name: permission.name.clone(),
            permission_type: permission.permission_type,
            cycle,
            children: Vec::new(),
        })
    }
}

fn unwind(parent: &[Option<NodeIndex>], from: NodeIndex, to: NodeIndex) -> Vec<NodeIndex> {
    let mut path = vec![to];
    let mut current = to;
    while current != from {
        match parent[current.index()] {
            Some(previous) => {
                path.push(previous);
                current = previous;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
