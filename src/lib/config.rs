//! Editor settings, loadable from TOML.
//!
//! ```toml
//! auto_backup = true
//! backup_path = "storage/dotenv-editor/backups"
//! always_create_backup_folder = false
//! grammar = "v3"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::parse::Grammar;

const DEFAULT_BACKUP_PATH: &str = "storage/dotenv-editor/backups";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Config file IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Config file parse error: {0}")]
  Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
  /// Back up the file before every save.
  pub auto_backup: bool,
  /// Directory that holds the backups.
  pub backup_path: PathBuf,
  /// Create the backup directory as soon as the editor is built.
  pub always_create_backup_folder: bool,
  /// Grammar used to read setter values.
  pub grammar: Grammar,
}

impl Default for EditorConfig {
  fn default() -> Self {
    Self {
      auto_backup: true,
      backup_path: PathBuf::from(DEFAULT_BACKUP_PATH),
      always_create_backup_folder: false,
      grammar: Grammar::default(),
    }
  }
}

impl EditorConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(s)?)
  }

  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = EditorConfig::from_toml_str("").unwrap();
    assert_eq!(config, EditorConfig::default());
    assert!(config.auto_backup);
    assert_eq!(config.grammar, Grammar::V3);
    assert_eq!(config.backup_path, PathBuf::from(DEFAULT_BACKUP_PATH));
  }

  #[test]
  fn test_partial_override() {
    let config = EditorConfig::from_toml_str(
      "auto_backup = false\ngrammar = \"v1\"\nbackup_path = \"/tmp/backups\"",
    )
    .unwrap();
    assert!(!config.auto_backup);
    assert_eq!(config.grammar, Grammar::V1);
    assert_eq!(config.backup_path, PathBuf::from("/tmp/backups"));
    assert!(!config.always_create_backup_folder);
  }

  #[test]
  fn test_rejects_unknown_grammar() {
    assert!(matches!(
      EditorConfig::from_toml_str("grammar = \"v9\""),
      Err(ConfigError::Toml(_))
    ));
  }

  #[test]
  fn test_rejects_unknown_field() {
    assert!(EditorConfig::from_toml_str("autoBackup = true").is_err());
  }
}
