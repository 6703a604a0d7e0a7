//! Precedence policy for auto-resolving dependencies.
//!
//! A policy is a list of `dependent type -> dependency type` rules. Applied to
//! a permission of the rule's dependent type, it proposes edges to every
//! permission in the same module (and, by default, the same resource key) of
//! the rule's dependency type. The rules are configuration, not code: the
//! defaults below encode the usual CRUD ordering and can be replaced in
//! `config.yaml`.

use super::snapshot::GraphSnapshot;
use crate::domain::PermissionType;
use crate::error::ConfigError;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// One precedence rule: permissions of type `dependent` require `dependency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedenceRule {
    /// Type of the permission that gains the dependency
    pub dependent: PermissionType,

    /// Type of the permission it should depend on
    pub dependency: PermissionType,
}

impl PrecedenceRule {
    /// Create a rule.
    pub fn new(dependent: PermissionType, dependency: PermissionType) -> Self {
        Self {
            dependent,
            dependency,
        }
    }
}

/// Configurable rule set used by auto-resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedencePolicy {
    /// Require proposed pairs to share the resource key (`users.edit` only
    /// pairs with `users.view`, not `users.profile.view`)
    #[serde(default = "default_match_resource")]
    pub match_resource: bool,

    /// Rules, applied in order
    #[serde(default = "default_rules")]
    pub rules: Vec<PrecedenceRule>,
}

fn default_match_resource() -> bool {
    true
}

fn default_rules() -> Vec<PrecedenceRule> {
    use PermissionType::{Create, Delete, Edit, Manage, View};
    vec![
        PrecedenceRule::new(Create, View),
        PrecedenceRule::new(Edit, View),
        PrecedenceRule::new(Delete, Edit),
        PrecedenceRule::new(Manage, Edit),
    ]
}

impl Default for PrecedencePolicy {
    fn default() -> Self {
        Self {
            match_resource: default_match_resource(),
            rules: default_rules(),
        }
    }
}

impl PrecedencePolicy {
    /// Check the rule set for rules that can never produce a valid edge.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReflexiveRule` for the first rule whose two
    /// sides are equal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.rules.iter().find(|rule| rule.dependent == rule.dependency) {
            Some(rule) => Err(ConfigError::ReflexiveRule(rule.dependent)),
            None => Ok(()),
        }
    }

    /// Propose `(dependent, dependency)` pairs for the given subjects.
    ///
    /// Pairs are sorted by id and deduplicated. Nothing here checks the graph
    /// for cycles or existing edges; callers validate each proposal.
    pub(super) fn propose(
        &self,
        snapshot: &GraphSnapshot,
        subjects: &[NodeIndex],
    ) -> Vec<(NodeIndex, NodeIndex)> {
        let mut proposals = Vec::new();

        for &subject in subjects {
            let permission = snapshot.permission(subject);

            for rule in self
                .rules
                .iter()
                .filter(|rule| rule.dependent == permission.permission_type)
            {
                for candidate in snapshot.nodes() {
                    if candidate == subject {
                        continue;
                    }
                    let other = snapshot.permission(candidate);
                    if other.module != permission.module
                        || other.permission_type != rule.dependency
                    {
                        continue;
                    }
                    if self.match_resource && other.resource_key() != permission.resource_key() {
                        continue;
                    }
                    proposals.push((subject, candidate));
                }
            }
        }

        proposals.sort_unstable();
        proposals.dedup();
        proposals
    }
}
