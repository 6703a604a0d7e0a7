//! CLI value enums and domain type conversions.
//!
//! This module contains the value enums used for CLI argument parsing
//! and their conversions to domain types.

use clap::ValueEnum;

use crate::domain::{PermissionType, TraversalDirection};

// ============================================================================
// Value Enums
// ============================================================================

/// Permission type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionTypeArg {
    /// Read access
    View,
    /// Create new records
    Create,
    /// Modify existing records
    Edit,
    /// Remove records
    Delete,
    /// Administrative control
    Manage,
    /// Anything else
    Other,
}

impl std::fmt::Display for PermissionTypeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        PermissionType::from(*self).fmt(f)
    }
}

/// Traversal direction for `dep list`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionArg {
    /// What the permission requires
    #[default]
    Dependencies,
    /// What requires the permission
    Dependents,
    /// Both ways at every hop
    Both,
}

/// Which permissions `dep auto` proposes dependencies for
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeArg {
    /// Only the given permission
    #[default]
    Permission,
    /// Every permission in its module
    Module,
    /// Permissions of one type in its module (requires --type)
    Type,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<PermissionTypeArg> for PermissionType {
    fn from(arg: PermissionTypeArg) -> Self {
        match arg {
            PermissionTypeArg::View => PermissionType::View,
            PermissionTypeArg::Create => PermissionType::Create,
            PermissionTypeArg::Edit => PermissionType::Edit,
            PermissionTypeArg::Delete => PermissionType::Delete,
            PermissionTypeArg::Manage => PermissionType::Manage,
            PermissionTypeArg::Other => PermissionType::Other,
        }
    }
}

impl From<DirectionArg> for TraversalDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Dependencies => TraversalDirection::Dependencies,
            DirectionArg::Dependents => TraversalDirection::Dependents,
            DirectionArg::Both => TraversalDirection::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_type_conversion() {
        assert_eq!(PermissionType::from(PermissionTypeArg::Manage), PermissionType::Manage);
        assert_eq!(PermissionTypeArg::Edit.to_string(), "edit");
    }

    #[test]
    fn test_direction_conversion() {
        assert_eq!(
            TraversalDirection::from(DirectionArg::default()),
            TraversalDirection::Dependencies
        );
        assert_eq!(TraversalDirection::from(DirectionArg::Both), TraversalDirection::Both);
    }
}
