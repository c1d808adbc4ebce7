//! Checkpoint store configuration
//!
//! Loaded from JSON or built in code. Only `prefix` is required:
//!
//! ```json
//! { "prefix": "out/primates", "sync_on_append": true, "file_mode": 416 }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extension of the checkpoint file
pub const CHECKPOINT_EXTENSION: &str = "ckp";

/// Suffix appended to the checkpoint filename while compacting
pub const BACKUP_SUFFIX: &str = ".bak";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Checkpoint store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path prefix; the checkpoint lives at `<prefix>.ckp`
    pub prefix: String,

    /// fsync after every appended frame (default: true)
    #[serde(default = "default_sync_on_append")]
    pub sync_on_append: bool,

    /// Permission bits for newly created files (default: 0o640)
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,
}

fn default_sync_on_append() -> bool {
    true
}

fn default_file_mode() -> u32 {
    0o640
}

impl StoreConfig {
    /// Default configuration for `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sync_on_append: default_sync_on_append(),
            file_mode: default_file_mode(),
        }
    }

    /// Disables per-append fsync
    pub fn without_sync(mut self) -> Self {
        self.sync_on_append = false;
        self
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: StoreConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("prefix must not be empty".to_string()));
        }
        if self.file_mode > 0o777 {
            return Err(ConfigError::Invalid(format!(
                "file_mode {:o} is not a permission mask",
                self.file_mode
            )));
        }
        Ok(())
    }

    /// `<prefix>.ckp`
    pub fn checkpoint_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.prefix, CHECKPOINT_EXTENSION))
    }

    /// `<prefix>.ckp.bak`
    pub fn backup_path(&self) -> PathBuf {
        PathBuf::from(format!(
            "{}.{}{}",
            self.prefix, CHECKPOINT_EXTENSION, BACKUP_SUFFIX
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_from_prefix() {
        let config = StoreConfig::new("out/run1");
        assert_eq!(config.checkpoint_path(), PathBuf::from("out/run1.ckp"));
        assert_eq!(config.backup_path(), PathBuf::from("out/run1.ckp.bak"));
    }

    #[test]
    fn test_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"prefix": "p"}"#).unwrap();
        assert!(config.sync_on_append);
        assert_eq!(config.file_mode, 0o640);
        assert_eq!(config, StoreConfig::new("p"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ckplog.json");
        fs::write(&path, r#"{"prefix": "run", "sync_on_append": false}"#).unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.prefix, "run");
        assert!(!config.sync_on_append);
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ckplog.json");
        fs::write(&path, r#"{"prefix": "  "}"#).unwrap();
        assert!(matches!(
            StoreConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_bad_mode_and_json() {
        let config = StoreConfig {
            file_mode: 0o7777,
            ..StoreConfig::new("p")
        };
        assert!(config.validate().is_err());

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(StoreConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = StoreConfig::load(Path::new("/nonexistent/ckplog.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
