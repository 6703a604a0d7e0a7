//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::{Parser, Subcommand};

use super::types::{DirectionArg, PermissionTypeArg, ScopeArg};
use super::validators::{
    validate_description, validate_display_name, validate_permission_name, validate_prefix,
    validate_reference,
};

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Permission ID prefix (e.g., "perm" for "perm-a1b2")
    ///
    /// Must be 2-20 alphanumeric characters.
    #[arg(short, long, value_parser = validate_prefix)]
    pub prefix: Option<String>,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug, Clone, Default)]
pub struct InfoArgs {}

/// Arguments for the `perm` command
#[derive(Parser, Debug, Clone)]
pub struct PermArgs {
    /// Permission subcommand
    #[command(subcommand)]
    pub action: PermAction,
}

/// Permission management actions
#[derive(Subcommand, Debug, Clone)]
pub enum PermAction {
    /// Create a permission
    ///
    /// Module and type are derived from the name (`users.edit` is module
    /// `users`, type `edit`) unless given explicitly.
    Create {
        /// Machine name, e.g. `users.edit`
        #[arg(value_parser = validate_permission_name)]
        name: String,

        /// Human-readable name (defaults to the machine name)
        #[arg(short = 'N', long, value_parser = validate_display_name)]
        display_name: Option<String>,

        /// Description
        #[arg(short = 'D', long, value_parser = validate_description)]
        description: Option<String>,

        /// Module tag
        #[arg(short, long)]
        module: Option<String>,

        /// Permission type
        #[arg(short = 't', long = "type", value_enum)]
        permission_type: Option<PermissionTypeArg>,

        /// Mark as a system permission (cannot be renamed, retyped or deleted)
        #[arg(long)]
        system: bool,
    },

    /// List permissions
    List {
        /// Filter by module
        #[arg(short, long)]
        module: Option<String>,

        /// Filter by type
        #[arg(short = 't', long = "type", value_enum)]
        permission_type: Option<PermissionTypeArg>,

        /// Only system permissions
        #[arg(long)]
        system: bool,

        /// Substring of the name or display name
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of permissions to display
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show a permission
    Show {
        /// Permission ID or name
        #[arg(value_parser = validate_reference)]
        permission: String,
    },

    /// Update a permission
    Update {
        /// Permission ID or name
        #[arg(value_parser = validate_reference)]
        permission: String,

        /// New machine name
        #[arg(long, value_parser = validate_permission_name)]
        name: Option<String>,

        /// New display name
        #[arg(short = 'N', long, value_parser = validate_display_name)]
        display_name: Option<String>,

        /// New description
        #[arg(short = 'D', long, value_parser = validate_description)]
        description: Option<String>,

        /// New module
        #[arg(short, long)]
        module: Option<String>,

        /// New type
        #[arg(short = 't', long = "type", value_enum)]
        permission_type: Option<PermissionTypeArg>,
    },

    /// Delete a permission and its outgoing dependencies
    ///
    /// Refused while other permissions still depend on it.
    Delete {
        /// Permission ID or name
        #[arg(value_parser = validate_reference)]
        permission: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the `dep` command
#[derive(Parser, Debug, Clone)]
pub struct DepArgs {
    /// Dependency subcommand
    #[command(subcommand)]
    pub action: DepAction,
}

/// Dependency management actions
#[derive(Subcommand, Debug, Clone)]
pub enum DepAction {
    /// Add one or more dependencies
    ///
    /// With several dependencies, each is validated on its own; refused ones
    /// are reported and the rest are added.
    Add {
        /// Permission that requires the others
        #[arg(value_parser = validate_reference)]
        dependent: String,

        /// Permissions it requires
        #[arg(required = true, num_args = 1.., value_parser = validate_reference)]
        dependencies: Vec<String>,
    },

    /// Remove a dependency
    Remove {
        /// Permission that requires the other
        #[arg(value_parser = validate_reference)]
        dependent: String,

        /// Permission being required
        #[arg(value_parser = validate_reference)]
        dependency: String,
    },

    /// List permissions reachable from a permission
    List {
        /// Permission ID or name
        #[arg(value_parser = validate_reference)]
        permission: String,

        /// Which edges to follow
        #[arg(short, long, value_enum, default_value = "dependencies")]
        direction: DirectionArg,

        /// Maximum number of hops (defaults to the configured limit)
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Show the dependency tree of a permission
    Tree {
        /// Permission ID or name
        #[arg(value_parser = validate_reference)]
        permission: String,

        /// Maximum tree depth (defaults to the configured limit)
        #[arg(long)]
        depth: Option<usize>,

        /// Show what depends on the permission instead
        #[arg(short, long)]
        reverse: bool,
    },

    /// Explain why one permission transitively requires another
    Path {
        /// Starting permission
        #[arg(value_parser = validate_reference)]
        from: String,

        /// Target permission
        #[arg(value_parser = validate_reference)]
        to: String,
    },

    /// Check the whole graph for cycles
    Check {
        /// List every distinct cycle, not only the first
        #[arg(short, long)]
        all: bool,
    },

    /// Test whether a dependency could be added, without adding it
    CanAdd {
        /// Proposed dependent
        #[arg(value_parser = validate_reference)]
        dependent: String,

        /// Proposed dependency
        #[arg(value_parser = validate_reference)]
        dependency: String,
    },

    /// Add dependencies implied by the precedence rules
    Auto {
        /// Anchor permission
        #[arg(value_parser = validate_reference)]
        permission: String,

        /// Which permissions to resolve
        #[arg(short, long, value_enum, default_value = "permission")]
        scope: ScopeArg,

        /// Type filter for `--scope type`
        #[arg(short = 't', long = "type", value_enum, required_if_eq("scope", "type"))]
        permission_type: Option<PermissionTypeArg>,
    },
}
