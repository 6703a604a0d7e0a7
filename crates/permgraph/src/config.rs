//! Configuration for a permgraph repository.
//!
//! Loaded from `.permgraph/config.yaml`:
//!
//! ```yaml
//! permission-prefix: perm
//! storage:
//!   backend: jsonl
//!   data_file: .permgraph/graph.jsonl
//! engine:
//!   max_depth: 10
//!   max_visits: 100000
//! precedence:
//!   match_resource: true
//!   rules:
//!     - dependent: create
//!       dependency: view
//! ```
//!
//! `engine` and `precedence` may be omitted and fall back to their defaults.

use crate::engine::{EngineLimits, PrecedencePolicy};
use crate::error::{ConfigError, Result};
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Name of the permgraph directory
pub const PERMGRAPH_DIR_NAME: &str = ".permgraph";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the graph data file
pub const DATA_FILE_NAME: &str = "graph.jsonl";

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermgraphConfig {
    /// Permission ID prefix (e.g., "perm" for "perm-a1b2")
    #[serde(rename = "permission-prefix")]
    pub permission_prefix: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Traversal limits
    #[serde(default)]
    pub engine: EngineLimits,

    /// Auto-resolution rules
    #[serde(default)]
    pub precedence: PrecedencePolicy,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend name: `jsonl` (in-memory with file persistence) or `memory`
    pub backend: String,

    /// Path to the data file, relative to the repository root
    pub data_file: String,
}

impl StorageConfig {
    /// Resolve this section to a backend, anchoring relative paths at `root`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownBackend` for unsupported names.
    pub fn to_backend(&self, root: &Path) -> Result<StorageBackend> {
        match self.backend.as_str() {
            "jsonl" => Ok(StorageBackend::Jsonl(root.join(&self.data_file))),
            "memory" => Ok(StorageBackend::InMemory),
            other => Err(ConfigError::UnknownBackend(other.to_string()).into()),
        }
    }
}

impl PermgraphConfig {
    /// Create a configuration with default storage, limits and policy
    pub fn new(prefix: &str) -> Self {
        Self {
            permission_prefix: prefix.to_string(),
            storage: StorageConfig {
                backend: "jsonl".to_string(),
                data_file: format!("{PERMGRAPH_DIR_NAME}/{DATA_FILE_NAME}"),
            },
            engine: EngineLimits::default(),
            precedence: PrecedencePolicy::default(),
        }
    }

    /// Load configuration from a file and check its values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for unparseable YAML or invalid values.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Invalid(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_depth == 0 {
            return Err(ConfigError::Invalid("engine.max_depth must be at least 1".to_string()).into());
        }
        if self.engine.max_visits == 0 {
            return Err(
                ConfigError::Invalid("engine.max_visits must be at least 1".to_string()).into(),
            );
        }
        self.precedence.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PermissionType;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_config_new() {
        let config = PermgraphConfig::new("acme");
        assert_eq!(config.permission_prefix, "acme");
        assert_eq!(config.storage.backend, "jsonl");
        assert_eq!(config.storage.data_file, ".permgraph/graph.jsonl");
        assert_eq!(config.engine, EngineLimits::default());
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let original = PermgraphConfig::new("acme");
        original.save(&path).await.unwrap();

        let loaded = PermgraphConfig::load(&path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_minimal_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            "permission-prefix: acme\nstorage:\n  backend: memory\n  data_file: unused.jsonl\n",
        )
        .await
        .unwrap();

        let config = PermgraphConfig::load(&path).await.unwrap();
        assert_eq!(config.precedence, PrecedencePolicy::default());
        assert_eq!(config.engine.max_depth, crate::engine::DEFAULT_MAX_DEPTH);
    }

    #[tokio::test]
    async fn test_custom_rules_are_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            "permission-prefix: acme\n\
             storage:\n  backend: jsonl\n  data_file: .permgraph/graph.jsonl\n\
             precedence:\n  rules:\n    - dependent: manage\n      dependency: view\n",
        )
        .await
        .unwrap();

        let config = PermgraphConfig::load(&path).await.unwrap();
        assert_eq!(config.precedence.rules.len(), 1);
        assert_eq!(config.precedence.rules[0].dependent, PermissionType::Manage);
        assert!(config.precedence.match_resource);
    }

    #[tokio::test]
    async fn test_zero_depth_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            "permission-prefix: acme\n\
             storage:\n  backend: memory\n  data_file: x\n\
             engine:\n  max_depth: 0\n",
        )
        .await
        .unwrap();

        let err = PermgraphConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[tokio::test]
    async fn test_reflexive_rule_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            "permission-prefix: acme\n\
             storage:\n  backend: memory\n  data_file: x\n\
             precedence:\n  rules:\n    - dependent: edit\n      dependency: edit\n",
        )
        .await
        .unwrap();

        let err = PermgraphConfig::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::ReflexiveRule(PermissionType::Edit))
        ));
        assert!(err.to_string().contains("'edit -> edit'"));
    }

    #[test]
    fn test_storage_backend_resolution() {
        let root = PathBuf::from("/repo");
        let config = PermgraphConfig::new("acme");
        assert_eq!(
            config.storage.to_backend(&root).unwrap(),
            StorageBackend::Jsonl(root.join(".permgraph/graph.jsonl"))
        );

        let unknown = StorageConfig {
            backend: "postgres".to_string(),
            data_file: String::new(),
        };
        assert!(unknown.to_backend(&root).is_err());
    }
}
