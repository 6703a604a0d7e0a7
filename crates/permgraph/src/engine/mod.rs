//! Permission dependency graph engine.
//!
//! [`DependencyGraphEngine`] answers structural questions about one
//! [`GraphSnapshot`] and is the only place that decides whether an edge may be
//! inserted. It holds no state beyond the snapshot it was built with: callers
//! load a fresh snapshot per logical operation (see [`crate::service`]).
//!
//! # Edge direction
//!
//! Edges point from **dependent to dependency**. `users.edit -> users.view`
//! means granting `users.edit` requires `users.view`.
//!
//! # Operations
//!
//! - [`get_dependencies`](DependencyGraphEngine::get_dependencies): bounded BFS
//! - [`detect_cycle`](DependencyGraphEngine::detect_cycle): three-color DFS
//! - [`can_add_dependency`](DependencyGraphEngine::can_add_dependency): the
//!   insertion gate (self-loop, duplicate, reachability)
//! - [`auto_resolve_dependencies`](DependencyGraphEngine::auto_resolve_dependencies):
//!   policy proposals with partial success
//! - [`explain_path`](DependencyGraphEngine::explain_path): shortest path
//! - [`dependency_tree`](DependencyGraphEngine::dependency_tree): bounded tree
//!   expansion for display
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use permgraph::domain::{DependencyEdge, Permission, PermissionType, TraversalDirection};
//! use permgraph::engine::{DependencyGraphEngine, EngineLimits, GraphSnapshot};
//!
//! let now = Utc::now();
//! let permission = |id: &str, name: &str| Permission {
//!     id: id.into(),
//!     name: name.to_string(),
//!     display_name: name.to_string(),
//!     description: String::new(),
//!     module: "users".to_string(),
//!     permission_type: PermissionType::infer_from_name(name),
//!     is_system: false,
//!     created_at: now,
//!     updated_at: now,
//! };
//!
//! let snapshot = GraphSnapshot::build(
//!     vec![permission("a", "users.edit"), permission("b", "users.view")],
//!     &[DependencyEdge::new("a".into(), "b".into(), "seeder")],
//!     1,
//! );
//! let engine = DependencyGraphEngine::new(snapshot, EngineLimits::default());
//!
//! let deps = engine
//!     .get_dependencies(&"a".into(), 1, TraversalDirection::Dependencies)
//!     .unwrap();
//! assert_eq!(deps[0].permission.name, "users.view");
//! assert!(!engine.can_add_dependency(&"b".into(), &"a".into()).unwrap().allowed);
//! ```

mod cycle;
mod policy;
mod snapshot;
mod traversal;

pub use policy::{PrecedencePolicy, PrecedenceRule};
pub use snapshot::GraphSnapshot;

use crate::domain::{
    AutoResolveOutcome, BatchOutcome, CycleReport, DepTreeNode, DependencyCheck, DependencyEdge,
    DiscoveredPermission, PathStep, PermissionId, ResolveScope, SkippedProposal,
    TraversalDirection,
};
use crate::error::{Error, Result, ValidationError};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Default cap on `max_depth` for dependency listings
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Default cap on nodes dequeued by a single traversal
pub const DEFAULT_MAX_VISITS: usize = 100_000;

/// Bounds on traversal cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLimits {
    /// Requested depths are clamped to `1..=max_depth`
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Traversals abort with `TraversalLimitExceeded` past this many visits
    #[serde(default = "default_max_visits")]
    pub max_visits: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_visits() -> usize {
    DEFAULT_MAX_VISITS
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_visits: DEFAULT_MAX_VISITS,
        }
    }
}

/// Structural queries and insertion validation over one snapshot.
#[derive(Debug, Clone)]
pub struct DependencyGraphEngine {
    snapshot: GraphSnapshot,
    limits: EngineLimits,
}

impl DependencyGraphEngine {
    /// Create an engine over a snapshot.
    pub fn new(snapshot: GraphSnapshot, limits: EngineLimits) -> Self {
        Self { snapshot, limits }
    }

    /// The snapshot this engine reads.
    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    /// The configured limits.
    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    /// Permissions reachable from `id` within `max_depth` hops, in BFS order.
    ///
    /// `max_depth` is clamped to `1..=limits.max_depth`. The start permission
    /// is never part of the result.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if `id` is unknown
    /// - `Error::TraversalLimitExceeded` if the visit cap is hit
    pub fn get_dependencies(
        &self,
        id: &PermissionId,
        max_depth: usize,
        direction: TraversalDirection,
    ) -> Result<Vec<DiscoveredPermission>> {
        let start = self.snapshot.node(id)?;
        let depth = self.clamp_depth(max_depth);

        let found = traversal::bounded_bfs(
            &self.snapshot,
            start,
            depth,
            direction,
            self.limits.max_visits,
        )?;

        Ok(found
            .into_iter()
            .map(|discovery| DiscoveredPermission {
                permission: self.snapshot.permission(discovery.node).clone(),
                depth: discovery.depth,
                relation: discovery.relation,
                via: self.snapshot.id(discovery.via).clone(),
            })
            .collect())
    }

    /// Expand the dependency tree under `id`.
    ///
    /// `Dependents` builds the reverse tree. `max_depth` is clamped like
    /// [`get_dependencies`](Self::get_dependencies). Every tree node counts
    /// against `max_visits`, since shared subgraphs repeat once per route.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if `id` is unknown
    /// - `Error::TraversalLimitExceeded` if the tree outgrows the visit cap
    pub fn dependency_tree(
        &self,
        id: &PermissionId,
        max_depth: usize,
        direction: TraversalDirection,
    ) -> Result<DepTreeNode> {
        let start = self.snapshot.node(id)?;
        traversal::expand_tree(
            &self.snapshot,
            start,
            self.clamp_depth(max_depth),
            direction,
            self.limits.max_visits,
        )
    }

    /// Report the first cycle found by a deterministic DFS, if any.
    ///
    /// Works on corrupted data: this is how violations introduced outside the
    /// insertion gate are found.
    ///
    /// # Errors
    ///
    /// Returns `Error::TraversalLimitExceeded` if the visit cap is hit.
    pub fn detect_cycle(&self) -> Result<CycleReport> {
        let Some(found) = cycle::first_cycle(&self.snapshot, self.limits.max_visits)? else {
            return Ok(CycleReport::acyclic());
        };

        let (from, to) = found.closing_edge;
        Ok(CycleReport {
            has_cycle: true,
            cycle_path: self.ids(&found.path),
            closing_edge: Some((self.snapshot.id(from).clone(), self.snapshot.id(to).clone())),
        })
    }

    /// Every distinct back-edge cycle, each starting at its smallest id.
    ///
    /// # Errors
    ///
    /// Returns `Error::TraversalLimitExceeded` if the visit cap is hit.
    pub fn detect_all_cycles(&self) -> Result<Vec<Vec<PermissionId>>> {
        cycle::all_cycles(&self.snapshot, self.limits.max_visits)
    }

    /// Decide whether `dependent -> dependency` may be inserted.
    ///
    /// Checks, in order: self-dependency, duplicate edge, and whether
    /// `dependent` is already reachable from `dependency` (which would close a
    /// cycle). Refusals are values, not errors.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if either id is unknown
    /// - `Error::TraversalLimitExceeded` if the reachability walk hits the cap
    pub fn can_add_dependency(
        &self,
        dependent: &PermissionId,
        dependency: &PermissionId,
    ) -> Result<DependencyCheck> {
        let from = self.snapshot.node(dependent)?;
        let to = self.snapshot.node(dependency)?;
        check_edge(&self.snapshot, from, to, self.limits.max_visits)
    }

    /// Validate several dependencies for one permission as a batch.
    ///
    /// Each request is checked against the snapshot plus the requests accepted
    /// before it. Accepted edges are stamped with `actor`; nothing is written.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if any id is unknown
    /// - `Error::TraversalLimitExceeded` if a reachability walk hits the cap
    pub fn validate_batch(
        &self,
        dependent: &PermissionId,
        dependencies: &[PermissionId],
        actor: &str,
    ) -> Result<BatchOutcome> {
        let from = self.snapshot.node(dependent)?;
        let mut pairs = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            pairs.push((from, self.snapshot.node(dependency)?));
        }

        let (accepted, rejected) = self.apply_pairs(&pairs, actor)?;
        Ok(BatchOutcome {
            added: accepted,
            rejected,
        })
    }

    /// Propose and validate policy edges for `id` within `scope`.
    ///
    /// Proposals are checked one at a time against a working copy that
    /// already contains earlier accepted proposals. Refused proposals are
    /// reported in `skipped`; the batch never aborts because of one.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if `id` is unknown
    /// - `Error::TraversalLimitExceeded` if a reachability walk hits the cap
    pub fn auto_resolve_dependencies(
        &self,
        id: &PermissionId,
        scope: &ResolveScope,
        policy: &PrecedencePolicy,
        actor: &str,
    ) -> Result<AutoResolveOutcome> {
        let anchor = self.snapshot.node(id)?;
        let module = &self.snapshot.permission(anchor).module;

        let subjects: Vec<NodeIndex> = match scope {
            ResolveScope::Permission => vec![anchor],
            ResolveScope::Module => self
                .snapshot
                .nodes()
                .filter(|&node| &self.snapshot.permission(node).module == module)
                .collect(),
            ResolveScope::Type(permission_type) => self
                .snapshot
                .nodes()
                .filter(|&node| {
                    let permission = self.snapshot.permission(node);
                    &permission.module == module && permission.permission_type == *permission_type
                })
                .collect(),
        };

        let proposals = policy.propose(&self.snapshot, &subjects);
        tracing::debug!(
            anchor = %id,
            ?scope,
            subjects = subjects.len(),
            proposals = proposals.len(),
            "Auto-resolving dependencies"
        );

        let (inserted, skipped) = self.apply_pairs(&proposals, actor)?;
        Ok(AutoResolveOutcome { inserted, skipped })
    }

    /// One shortest dependency path from `from` to `to`.
    ///
    /// Returns `Ok(None)` when no path exists; that is an answer, not a failure.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionNotFound` if either id is unknown
    /// - `Error::TraversalLimitExceeded` if the walk hits the cap
    pub fn explain_path(
        &self,
        from: &PermissionId,
        to: &PermissionId,
    ) -> Result<Option<Vec<PathStep>>> {
        let start = self.snapshot.node(from)?;
        let goal = self.snapshot.node(to)?;

        let path = traversal::shortest_path(&self.snapshot, start, goal, self.limits.max_visits)?;
        Ok(path.map(|nodes| {
            nodes
                .into_iter()
                .enumerate()
                .map(|(index, node)| PathStep {
                    index,
                    permission: self.snapshot.permission(node).clone(),
                })
                .collect()
        }))
    }

    fn clamp_depth(&self, requested: usize) -> usize {
        let depth = requested.clamp(1, self.limits.max_depth.max(1));
        if depth != requested {
            tracing::debug!(requested, clamped = depth, "Clamped traversal depth");
        }
        depth
    }

    /// Check pairs in order against a growing working copy.
    fn apply_pairs(
        &self,
        pairs: &[(NodeIndex, NodeIndex)],
        actor: &str,
    ) -> Result<(Vec<DependencyEdge>, Vec<SkippedProposal>)> {
        let mut working = self.snapshot.clone();
        let mut accepted = Vec::new();
        let mut skipped = Vec::new();

        for &(from, to) in pairs {
            let check = check_edge(&working, from, to, self.limits.max_visits)?;
            let dependent = working.id(from).clone();
            let dependency = working.id(to).clone();

            match check.reason {
                None => {
                    working.add_edge(from, to);
                    accepted.push(DependencyEdge::new(dependent, dependency, actor));
                }
                Some(reason) => {
                    tracing::debug!(%dependent, %dependency, %reason, "Skipping proposal");
                    skipped.push(SkippedProposal {
                        dependent,
                        dependency,
                        reason,
                    });
                }
            }
        }

        Ok((accepted, skipped))
    }

    fn ids(&self, nodes: &[NodeIndex]) -> Vec<PermissionId> {
        nodes
            .iter()
            .map(|&node| self.snapshot.id(node).clone())
            .collect()
    }
}

/// The insertion gate. Every edge that reaches a store passes through here.
fn check_edge(
    snapshot: &GraphSnapshot,
    dependent: NodeIndex,
    dependency: NodeIndex,
    max_visits: usize,
) -> Result<DependencyCheck> {
    if dependent == dependency {
        return Ok(DependencyCheck::rejected(ValidationError::SelfDependency));
    }

    if snapshot.contains_edge(dependent, dependency) {
        return Ok(DependencyCheck::rejected(ValidationError::DuplicateEdge {
            dependent: snapshot.id(dependent).clone(),
            dependency: snapshot.id(dependency).clone(),
        }));
    }

    // An existing path dependency -> ... -> dependent plus the new edge is a cycle.
    if let Some(path) = traversal::shortest_path(snapshot, dependency, dependent, max_visits)? {
        let mut cycle_path = Vec::with_capacity(path.len() + 1);
        cycle_path.push(snapshot.id(dependent).clone());
        cycle_path.extend(path.into_iter().map(|node| snapshot.id(node).clone()));
        return Ok(DependencyCheck::rejected(
            ValidationError::CycleWouldBeIntroduced { cycle_path },
        ));
    }

    Ok(DependencyCheck::allowed())
}

impl From<ValidationError> for DependencyCheck {
    fn from(reason: ValidationError) -> Self {
        DependencyCheck::rejected(reason)
    }
}

impl DependencyCheck {
    /// Turn a refusal into an error, for single-edge mutations.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` carrying the refusal reason.
    pub fn into_result(self) -> Result<()> {
        match self.reason {
            None => Ok(()),
            Some(reason) => Err(Error::Validation(reason)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{chain, edge, named_permission, permission};
    use super::*;
    use crate::domain::{PermissionType, Relation};

    fn engine(snapshot: GraphSnapshot) -> DependencyGraphEngine {
        DependencyGraphEngine::new(snapshot, EngineLimits::default())
    }

    fn names(found: &[DiscoveredPermission]) -> Vec<&str> {
        found.iter().map(|d| d.permission.id.as_str()).collect()
    }

    #[test]
    fn test_cycle_rejection_carries_path() {
        let engine = engine(chain(&["A", "B", "C"]));
        let check = engine.can_add_dependency(&"C".into(), &"A".into()).unwrap();

        assert!(!check.allowed);
        let Some(ValidationError::CycleWouldBeIntroduced { cycle_path }) = check.reason else {
            panic!("expected a cycle rejection, got {check:?}");
        };
        let ids: Vec<&str> = cycle_path.iter().map(PermissionId::as_str).collect();
        assert_eq!(ids, vec!["C", "A", "B", "C"]);
    }

    #[test]
    fn test_duplicate_is_reported_before_cycle() {
        let engine = engine(chain(&["A", "B"]));
        let check = engine.can_add_dependency(&"A".into(), &"B".into()).unwrap();
        assert!(matches!(
            check.reason,
            Some(ValidationError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let engine = engine(chain(&["A", "B"]));
        assert!(matches!(
            engine.can_add_dependency(&"A".into(), &"Z".into()),
            Err(Error::PermissionNotFound(id)) if id.as_str() == "Z"
        ));
        assert!(matches!(
            engine.get_dependencies(&"Z".into(), 1, TraversalDirection::Dependencies),
            Err(Error::PermissionNotFound(_))
        ));
    }

    #[test]
    fn test_get_dependencies_clamps_depth() {
        let snapshot = chain(&["a", "b", "c", "d"]);
        let engine = DependencyGraphEngine::new(
            snapshot,
            EngineLimits {
                max_depth: 2,
                max_visits: 100,
            },
        );

        let found = engine
            .get_dependencies(&"a".into(), 50, TraversalDirection::Dependencies)
            .unwrap();
        assert_eq!(names(&found), vec!["b", "c"]);

        let found = engine
            .get_dependencies(&"a".into(), 0, TraversalDirection::Dependencies)
            .unwrap();
        assert_eq!(names(&found), vec!["b"]);
    }

    #[test]
    fn test_get_dependencies_both_directions() {
        let engine = engine(chain(&["a", "b", "c"]));
        let found = engine
            .get_dependencies(&"b".into(), 1, TraversalDirection::Both)
            .unwrap();

        assert_eq!(names(&found), vec!["c", "a"]);
        assert_eq!(found[0].relation, Relation::Dependency);
        assert_eq!(found[1].relation, Relation::Dependent);
        assert!(found.iter().all(|d| d.via.as_str() == "b"));
    }

    #[test]
    fn test_isolated_permission_has_no_dependencies() {
        let engine = engine(GraphSnapshot::build(vec![permission("solo")], &[], 0));
        let found = engine
            .get_dependencies(&"solo".into(), 3, TraversalDirection::Both)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_detect_cycle_reports_closing_edge() {
        let engine = engine(GraphSnapshot::build(
            vec![permission("a"), permission("b")],
            &[edge("a", "b"), edge("b", "a")],
            0,
        ));
        let report = engine.detect_cycle().unwrap();

        assert!(report.has_cycle);
        let path: Vec<&str> = report.cycle_path.iter().map(PermissionId::as_str).collect();
        assert_eq!(path, vec!["a", "b", "a"]);
        assert_eq!(report.closing_edge, Some(("b".into(), "a".into())));
    }

    #[test]
    fn test_explain_path_same_node() {
        let engine = engine(chain(&["a", "b"]));
        let path = engine.explain_path(&"a".into(), &"a".into()).unwrap().unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].index, 0);
    }

    #[test]
    fn test_batch_reports_each_refusal() {
        let engine = engine(GraphSnapshot::build(
            vec![permission("a"), permission("b")],
            &[],
            0,
        ));
        let outcome = engine
            .validate_batch(&"a".into(), &["b".into(), "b".into(), "a".into()], "alice")
            .unwrap();

        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.added[0].created_by, "alice");
        assert_eq!(outcome.rejected.len(), 2);
        assert!(matches!(
            outcome.rejected[0].reason,
            ValidationError::DuplicateEdge { .. }
        ));
        assert_eq!(outcome.rejected[1].reason, ValidationError::SelfDependency);
    }

    #[test]
    fn test_auto_resolve_skips_cycle_proposals() {
        // users.view already depends on users.edit; edit -> view would close a cycle.
        let engine = engine(GraphSnapshot::build(
            vec![
                named_permission("p1", "users.view"),
                named_permission("p2", "users.edit"),
                named_permission("p3", "users.delete"),
            ],
            &[edge("p1", "p2")],
            0,
        ));
        let outcome = engine
            .auto_resolve_dependencies(
                &"p1".into(),
                &ResolveScope::Module,
                &PrecedencePolicy::default(),
                "alice",
            )
            .unwrap();

        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(outcome.inserted[0].dependent.as_str(), "p3");
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(
            outcome.skipped[0].reason,
            ValidationError::CycleWouldBeIntroduced { .. }
        ));
    }

    #[test]
    fn test_auto_resolve_type_scope() {
        let engine = engine(GraphSnapshot::build(
            vec![
                named_permission("p1", "users.view"),
                named_permission("p2", "users.edit"),
                named_permission("p3", "users.delete"),
            ],
            &[],
            0,
        ));
        let outcome = engine
            .auto_resolve_dependencies(
                &"p1".into(),
                &ResolveScope::Type(PermissionType::Delete),
                &PrecedencePolicy::default(),
                "alice",
            )
            .unwrap();

        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(outcome.inserted[0].dependent.as_str(), "p3");
        assert_eq!(outcome.inserted[0].dependency.as_str(), "p2");
    }

    #[test]
    fn test_auto_resolve_permission_scope_only_touches_anchor() {
        let engine = engine(GraphSnapshot::build(
            vec![
                named_permission("p1", "users.view"),
                named_permission("p2", "users.edit"),
                named_permission("p3", "users.delete"),
            ],
            &[],
            0,
        ));
        let outcome = engine
            .auto_resolve_dependencies(
                &"p2".into(),
                &ResolveScope::Permission,
                &PrecedencePolicy::default(),
                "alice",
            )
            .unwrap();

        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(outcome.inserted[0].dependent.as_str(), "p2");
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_into_result() {
        assert!(DependencyCheck::allowed().into_result().is_ok());
        assert!(matches!(
            DependencyCheck::from(ValidationError::SelfDependency).into_result(),
            Err(Error::Validation(ValidationError::SelfDependency))
        ));
    }
}
