//! Implementation of the `init` command.
//!
//! Creates the `.permgraph/` directory with a configuration file, an empty
//! graph data file and a `.gitignore`.

use crate::config::{CONFIG_FILE_NAME, DATA_FILE_NAME, PERMGRAPH_DIR_NAME, PermgraphConfig};
use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default permission ID prefix if none specified
pub const DEFAULT_PREFIX: &str = "perm";

/// Name of the gitignore file within .permgraph
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Minimum prefix length
pub const MIN_PREFIX_LENGTH: usize = 2;

/// Maximum prefix length
pub const MAX_PREFIX_LENGTH: usize = 20;

/// Maximum directory depth to traverse when searching for the repository root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created .permgraph directory
    pub permgraph_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created data file
    pub data_file: PathBuf,
    /// Path to the created gitignore file
    pub gitignore_file: PathBuf,
    /// The prefix used for permission IDs
    pub prefix: String,
}

/// Validate the permission ID prefix.
///
/// 2-20 ASCII alphanumeric characters. Expects pre-trimmed input.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` describing the violated rule.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.len() < MIN_PREFIX_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "Prefix must be at least {MIN_PREFIX_LENGTH} characters"
        ))
        .into());
    }

    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "Prefix cannot exceed {MAX_PREFIX_LENGTH} characters"
        ))
        .into());
    }

    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::Invalid(
            "Prefix must contain only alphanumeric characters".to_string(),
        )
        .into());
    }

    Ok(())
}

/// Initialize a new permgraph repository in `base_dir`.
///
/// # Errors
///
/// - `ConfigError::AlreadyInitialized` if `.permgraph/` exists
/// - `ConfigError::Invalid` if the prefix is invalid
/// - `Error::Io` if file system operations fail
pub async fn init(base_dir: &Path, prefix: Option<&str>) -> Result<InitResult> {
    let prefix = prefix.unwrap_or(DEFAULT_PREFIX).trim();
    validate_prefix(prefix)?;

    let permgraph_dir = base_dir.join(PERMGRAPH_DIR_NAME);
    if permgraph_dir.exists() {
        return Err(ConfigError::AlreadyInitialized(base_dir.display().to_string()).into());
    }

    fs::create_dir_all(&permgraph_dir).await?;

    let config_file = permgraph_dir.join(CONFIG_FILE_NAME);
    PermgraphConfig::new(prefix).save(&config_file).await?;

    let data_file = permgraph_dir.join(DATA_FILE_NAME);
    fs::write(&data_file, "").await?;

    let gitignore_file = permgraph_dir.join(GITIGNORE_FILE_NAME);
    let gitignore_content = "\
# permgraph temp files from interrupted saves
*.tmp
# graph.jsonl should be tracked
";
    fs::write(&gitignore_file, gitignore_content).await?;

    tracing::debug!(dir = %permgraph_dir.display(), prefix, "Initialized permgraph repository");

    Ok(InitResult {
        permgraph_dir,
        config_file,
        data_file,
        gitignore_file,
        prefix: prefix.to_string(),
    })
}

/// Find the repository root by searching up from `start_dir`.
///
/// Returns the directory containing `.permgraph/`, or `None` if none is found
/// before the filesystem root or [`MAX_TRAVERSAL_DEPTH`].
pub fn find_permgraph_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(PERMGRAPH_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
