//! Application context for CLI command execution.
//!
//! `App` finds the repository, loads its configuration, opens the store and
//! builds the [`DependencyService`] every command runs through.
//!
//! # Example
//!
//! ```no_run
//! use permgraph::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     let report = app.service().detect_cycle().await?;
//!     println!("cycle: {}", report.has_cycle);
//!     Ok(())
//! }
//! ```

use crate::commands::init::find_permgraph_root;
use crate::config::{CONFIG_FILE_NAME, PERMGRAPH_DIR_NAME, PermgraphConfig};
use crate::domain::{Permission, PermissionId};
use crate::error::{ConfigError, Error, Result};
use crate::service::DependencyService;
use crate::storage::{PermissionStore, create_storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application context for CLI operations.
pub struct App {
    service: DependencyService,
    config: PermgraphConfig,
    permgraph_dir: PathBuf,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("permgraph_dir", &self.permgraph_dir)
            .field("prefix", &self.config.permission_prefix)
            .field("store", &"<dyn PermissionStore>")
            .finish()
    }
}

impl App {
    /// Create an App from the given working directory.
    ///
    /// Searches up the directory tree for `.permgraph/`, loads the
    /// configuration and opens the configured store.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NotInitialized` if no repository is found
    /// - `ConfigError::Invalid` / `UnknownBackend` for a bad configuration
    /// - `Error::Io` if the data file cannot be read
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_permgraph_root(working_dir).ok_or(ConfigError::NotInitialized)?;

        let permgraph_dir = root_dir.join(PERMGRAPH_DIR_NAME);
        let config = PermgraphConfig::load(&permgraph_dir.join(CONFIG_FILE_NAME)).await?;

        let backend = config.storage.to_backend(&root_dir)?;
        let store = create_storage(backend, config.permission_prefix.clone()).await?;
        let service = DependencyService::new(store, config.engine, config.precedence.clone());

        Ok(Self {
            service,
            config,
            permgraph_dir,
        })
    }

    /// The dependency service.
    pub fn service(&self) -> &DependencyService {
        &self.service
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        self.service.store()
    }

    /// The loaded configuration.
    pub fn config(&self) -> &PermgraphConfig {
        &self.config
    }

    /// Path to the `.permgraph` directory.
    pub fn permgraph_dir(&self) -> &Path {
        &self.permgraph_dir
    }

    /// Look a permission up by ID, falling back to its machine name.
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionNotFound` if neither matches.
    pub async fn resolve(&self, reference: &str) -> Result<Permission> {
        let store = self.store();
        if let Some(permission) = store.get_permission(&PermissionId::from(reference)).await? {
            return Ok(permission);
        }
        store
            .find_by_name(reference)
            .await?
            .ok_or_else(|| Error::PermissionNotFound(PermissionId::from(reference)))
    }

    /// Persist the store. Call after every mutating command.
    ///
    /// # Errors
    ///
    /// Propagates IO and serialization failures.
    pub async fn save(&self) -> Result<()> {
        self.store().save().await
    }
}
