//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for permgraph using clap's
//! derive API. Each command has its own argument struct with validation and
//! helpful error messages.
//!
//! # Commands
//!
//! - `init`: Initialize a new permgraph repository
//! - `info`: Show repository information
//! - `perm`: Create, list, show, update and delete permissions
//! - `dep`: Add, remove, inspect and validate dependencies
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--actor`: Name recorded on changes (defaults to `$USER`)
//!
//! # Example
//!
//! ```bash
//! permgraph perm create users.view
//! permgraph perm create users.edit
//! permgraph dep add users.edit users.view
//! permgraph dep can-add users.view users.edit
//! permgraph dep auto users.edit --scope module
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::RequestContext;

// Re-export argument structs
pub use args::{DepAction, DepArgs, InfoArgs, InitArgs, PermAction, PermArgs};

// Re-export types
pub use types::{DirectionArg, PermissionTypeArg, ScopeArg};

// Re-export validators for external use
pub use validators::{
    validate_description, validate_display_name, validate_permission_name, validate_prefix,
    validate_reference,
};

/// Actor recorded when neither `--actor` nor `$USER` is set
pub const DEFAULT_ACTOR: &str = "cli";

/// Permgraph - permission dependency graph manager
///
/// Tracks which permissions require which others, refuses edges that would
/// form a cycle, and stores the graph in `.permgraph/graph.jsonl`.
#[derive(Parser, Debug)]
#[command(name = "permgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Name recorded as the author of changes
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new permgraph repository
    ///
    /// Creates the `.permgraph/` directory with configuration and an empty
    /// graph file. Run this once in your project root.
    Init(InitArgs),

    /// Show repository information
    ///
    /// Displays the data file, permission prefix, limits and graph size.
    Info(InfoArgs),

    /// Manage permissions
    Perm(PermArgs),

    /// Manage and inspect dependencies between permissions
    Dep(DepArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Request context for this invocation.
    pub fn request_context(&self) -> RequestContext {
        let actor = self
            .actor
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .filter(|actor| !actor.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_string());
        RequestContext::new(actor)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::Init(args)) => execute::execute_init(args).await,
            Some(Commands::Info(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_info(&app, args, output_mode).await
            }
            Some(Commands::Perm(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_perm(&app, &self.request_context(), args, output_mode).await
            }
            Some(Commands::Dep(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_dep(&app, &self.request_context(), args, output_mode).await
            }
            None => {
                println!("Permgraph permission dependency manager");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}
