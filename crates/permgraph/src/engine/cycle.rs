//! Three-color depth-first cycle detection.
//!
//! White nodes are unvisited, gray nodes are on the current DFS path, black
//! nodes are finished. An edge into a gray node is a back edge and closes a
//! cycle. The walk is iterative so deep chains cannot overflow the stack, and
//! roots and neighbors are taken in ascending id order so reports are
//! reproducible.

use super::snapshot::GraphSnapshot;
use crate::domain::PermissionId;
use crate::error::{Error, Result};
use petgraph::graph::NodeIndex;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

struct Frame {
    node: NodeIndex,
    neighbors: Vec<NodeIndex>,
    cursor: usize,
}

/// A cycle found by the DFS: the path (first node repeated at the end) and
/// the back edge that closed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FoundCycle {
    pub path: Vec<NodeIndex>,
    pub closing_edge: (NodeIndex, NodeIndex),
}

/// Run the DFS, handing every back-edge cycle to `on_cycle`.
///
/// `on_cycle` returns `false` to stop the walk early.
fn walk<F>(snapshot: &GraphSnapshot, max_visits: usize, mut on_cycle: F) -> Result<()>
where
    F: FnMut(FoundCycle) -> bool,
{
    let mut colors = vec![Color::White; snapshot.node_count()];
    let mut visits = 0usize;

    for root in snapshot.nodes() {
        if colors[root.index()] != Color::White {
            continue;
        }

        let mut stack = Vec::new();
        visits += 1;
        if visits > max_visits {
            return Err(Error::TraversalLimitExceeded { limit: max_visits });
        }
        colors[root.index()] = Color::Gray;
        stack.push(Frame {
            node: root,
            neighbors: snapshot.dependencies_of(root),
            cursor: 0,
        });

        loop {
            let (node, next) = match stack.last_mut() {
                None => break,
                Some(frame) if frame.cursor < frame.neighbors.len() => {
                    let next = frame.neighbors[frame.cursor];
                    frame.cursor += 1;
                    (frame.node, Some(next))
                }
                Some(frame) => (frame.node, None),
            };

            let Some(next) = next else {
                colors[node.index()] = Color::Black;
                stack.pop();
                continue;
            };

            match colors[next.index()] {
                Color::White => {
                    visits += 1;
                    if visits > max_visits {
                        return Err(Error::TraversalLimitExceeded { limit: max_visits });
                    }
                    colors[next.index()] = Color::Gray;
                    stack.push(Frame {
                        node: next,
                        neighbors: snapshot.dependencies_of(next),
                        cursor: 0,
                    });
                }
                Color::Gray => {
                    // Gray nodes are exactly the nodes on the stack.
                    if let Some(start) = stack.iter().position(|frame| frame.node == next) {
                        let mut path: Vec<NodeIndex> =
                            stack[start..].iter().map(|frame| frame.node).collect();
                        path.push(next);
                        let keep_going = on_cycle(FoundCycle {
                            path,
                            closing_edge: (node, next),
                        });
                        if !keep_going {
                            return Ok(());
                        }
                    }
                }
                Color::Black => {}
            }
        }
    }

    Ok(())
}

/// First back-edge cycle in deterministic DFS order.
pub(super) fn first_cycle(snapshot: &GraphSnapshot, max_visits: usize) -> Result<Option<FoundCycle>> {
    let mut found = None;
    walk(snapshot, max_visits, |cycle| {
        found = Some(cycle);
        false
    })?;
    Ok(found)
}

/// Every back-edge cycle, rotated to start at its smallest id, deduplicated.
///
/// Each returned path repeats its first id at the end.
pub(super) fn all_cycles(snapshot: &GraphSnapshot, max_visits: usize) -> Result<Vec<Vec<PermissionId>>> {
    let mut seen: HashSet<Vec<PermissionId>> = HashSet::new();
    let mut cycles = Vec::new();

    walk(snapshot, max_visits, |cycle| {
        let mut open: Vec<PermissionId> = cycle.path[..cycle.path.len() - 1]
            .iter()
            .map(|&node| snapshot.id(node).clone())
            .collect();
        normalize_cycle(&mut open);
        if seen.insert(open.clone()) {
            if let Some(first) = open.first().cloned() {
                open.push(first);
            }
            cycles.push(open);
        }
        true
    })?;

    Ok(cycles)
}

/// Rotate an open cycle so its smallest id comes first.
///
/// Direction is kept: in a directed graph `a -> b -> c` and `a -> c -> b` are
/// different cycles.
fn normalize_cycle(cycle: &mut [PermissionId]) {
    let min_idx = cycle
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    cycle.rotate_left(min_idx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{chain, edge, permission};

    fn path_ids(snapshot: &GraphSnapshot, path: &[NodeIndex]) -> Vec<String> {
        path.iter().map(|&n| snapshot.id(n).to_string()).collect()
    }

    #[test]
    fn test_acyclic_chain() {
        let snapshot = chain(&["a", "b", "c"]);
        assert!(first_cycle(&snapshot, 100).unwrap().is_none());
    }

    #[test]
    fn test_back_edge_yields_cycle_path() {
        let snapshot = GraphSnapshot::build(
            vec![permission("a"), permission("b"), permission("c")],
            &[edge("a", "b"), edge("b", "c"), edge("c", "a")],
            0,
        );
        let cycle = first_cycle(&snapshot, 100).unwrap().unwrap();
        assert_eq!(path_ids(&snapshot, &cycle.path), vec!["a", "b", "c", "a"]);
        assert_eq!(snapshot.id(cycle.closing_edge.0).as_str(), "c");
        assert_eq!(snapshot.id(cycle.closing_edge.1).as_str(), "a");
    }

    #[test]
    fn test_cross_edge_is_not_a_cycle() {
        // Diamond: a -> b -> d, a -> c -> d. Reaching d twice is fine.
        let snapshot = GraphSnapshot::build(
            vec![permission("a"), permission("b"), permission("c"), permission("d")],
            &[edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")],
            0,
        );
        assert!(first_cycle(&snapshot, 100).unwrap().is_none());
    }

    #[test]
    fn test_self_loop() {
        let snapshot = GraphSnapshot::build(vec![permission("x")], &[edge("x", "x")], 0);
        let cycle = first_cycle(&snapshot, 100).unwrap().unwrap();
        assert_eq!(path_ids(&snapshot, &cycle.path), vec!["x", "x"]);
    }

    #[test]
    fn test_all_cycles_are_normalized_and_unique() {
        let snapshot = GraphSnapshot::build(
            vec![
                permission("a"),
                permission("b"),
                permission("c"),
                permission("d"),
            ],
            &[
                edge("b", "c"),
                edge("c", "b"),
                edge("d", "a"),
                edge("a", "d"),
            ],
            0,
        );
        let cycles = all_cycles(&snapshot, 100).unwrap();
        let rendered: Vec<Vec<&str>> = cycles
            .iter()
            .map(|c| c.iter().map(PermissionId::as_str).collect())
            .collect();
        assert_eq!(rendered, vec![vec!["a", "d", "a"], vec!["b", "c", "b"]]);
    }

    #[test]
    fn test_normalize_cycle_rotates_to_smallest() {
        let mut cycle: Vec<PermissionId> = vec!["c".into(), "a".into(), "b".into()];
        normalize_cycle(&mut cycle);
        let ids: Vec<&str> = cycle.iter().map(PermissionId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_visit_cap() {
        let snapshot = chain(&["a", "b", "c", "d"]);
        assert!(matches!(
            first_cycle(&snapshot, 2),
            Err(Error::TraversalLimitExceeded { limit: 2 })
        ));
    }
}
