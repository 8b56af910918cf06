//! Configuration for a conformance run, loaded from YAML

use crate::conformance::WorkbenchConfig;
use crate::storage::RepositoryOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Repository and workbench settings
///
/// ```yaml
/// repository:
///   soft_delete: true
///   undo: false
/// workbench:
///   user_id: garygeeke
///   run_prefix: nightly
/// ```
///
/// Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    pub repository: RepositoryOptions,
    pub workbench: WorkbenchConfig,
}

impl ConformanceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = ConformanceConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ConformanceConfig::default());
        assert!(config.repository.soft_delete);
        assert!(config.repository.undo);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = ConformanceConfig::from_yaml_str(
            "repository:\n  undo: false\nworkbench:\n  run_prefix: nightly\n",
        )
        .unwrap();
        assert!(!config.repository.undo);
        assert!(config.repository.soft_delete);
        assert_eq!(config.workbench.run_prefix.as_deref(), Some("nightly"));
        assert_eq!(config.workbench.user_id, WorkbenchConfig::default().user_id);
    }

    #[test]
    fn unreadable_config_names_the_path() {
        let err = ConformanceConfig::load("/no/such/omrs.yaml").unwrap_err();
        assert!(err.to_string().contains("/no/such/omrs.yaml"));
    }

    #[test]
    fn malformed_config_is_rejected() {
        let result = ConformanceConfig::from_yaml_str("repository: [1, 2]");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }
}
