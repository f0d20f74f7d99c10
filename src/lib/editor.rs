//! High level editing of one dotenv file.
//!
//! The editor reads through a [`DotenvReader`], keeps pending edits in a
//! [`DotenvWriter`] and saves them back, optionally taking a backup first.
//! Read accessors (`keys`, `value`, ...) reflect the file on disk; edits only
//! reach it on [`DotenvEditor::save`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use env_editor::{config::EditorConfig, editor::DotenvEditor};
//! use std::path::Path;
//!
//! let mut editor = DotenvEditor::new(EditorConfig::default()).unwrap();
//! editor.load(Some(Path::new(".env")), false, None).unwrap();
//! editor.set_key("APP_DEBUG", Some("false"), None, None).unwrap();
//! editor.save(true).unwrap();
//! ```

use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::{
  backup::{BackupError, BackupInfo, Backups},
  config::EditorConfig,
  entry::{Entry, RawEntry},
  format::{FormatError, Formatter},
  parse::ParseError,
  reader::{DotenvReader, KeyInfo, ReadError},
  writer::{DotenvWriter, WriterError},
};

const DEFAULT_LOCAL_FILENAME: &str = ".env";

/// Errors reported by the editor.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
  /// The edited file or a file to restore from does not exist
  #[error("File does not exist at path {}", .0.display())]
  FileNotFound(PathBuf),
  #[error("Unable to read the file at {}: {source}", .path.display())]
  UnableReadFile {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Unable to write to the file at {}: {source}", .path.display())]
  UnableWriteFile {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Requested key not found in your environment file: {0}")]
  KeyNotFound(String),
  #[error("There are no available backups!")]
  NoBackupAvailable,
  #[error(transparent)]
  InvalidKey(FormatError),
  #[error(transparent)]
  InvalidValue(ParseError),
  /// Listing, copying or deleting backups failed
  #[error("Backup IO error at {}: {source}", .path.display())]
  Backup {
    path: PathBuf,
    source: std::io::Error,
  },
}

impl From<FormatError> for EditorError {
  fn from(err: FormatError) -> Self {
    EditorError::InvalidKey(err)
  }
}

impl From<ParseError> for EditorError {
  fn from(err: ParseError) -> Self {
    EditorError::InvalidValue(err)
  }
}

impl From<ReadError> for EditorError {
  fn from(err: ReadError) -> Self {
    match err {
      ReadError::UnableReadFile { path, source } => EditorError::UnableReadFile { path, source },
      ReadError::Parse(err) => EditorError::InvalidValue(err),
    }
  }
}

impl From<WriterError> for EditorError {
  fn from(err: WriterError) -> Self {
    match err {
      WriterError::KeyNotFound(key) => EditorError::KeyNotFound(key),
      WriterError::Format(err) => EditorError::InvalidKey(err),
      WriterError::UnableWriteFile { path, source } => EditorError::UnableWriteFile { path, source },
    }
  }
}

impl From<BackupError> for EditorError {
  fn from(err: BackupError) -> Self {
    match err {
      BackupError::FileNotFound(path) => EditorError::FileNotFound(path),
      BackupError::Io { path, source } => EditorError::Backup { path, source },
    }
  }
}

/// One setter to add or update through [`DotenvEditor::set_keys`].
///
/// Fields left as `None` keep their current state on update and fall back to
/// an empty value, no comment and no export prefix on append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyUpdate {
  pub key: String,
  pub value: Option<String>,
  pub comment: Option<String>,
  pub export: Option<bool>,
}

impl KeyUpdate {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: Some(value.into()),
      ..Default::default()
    }
  }

  pub fn comment(mut self, comment: impl Into<String>) -> Self {
    self.comment = Some(comment.into());
    self
  }

  pub fn export(mut self, export: bool) -> Self {
    self.export = Some(export);
    self
  }
}

/// Editor over a single dotenv file.
#[derive(Debug)]
pub struct DotenvEditor {
  reader: DotenvReader,
  writer: DotenvWriter,
  backups: Backups,
  file_path: PathBuf,
  auto_backup: bool,
  has_changed: bool,
}

impl DotenvEditor {
  /// Creates an editor pointed at `.env` in the current directory.
  ///
  /// Nothing is read until [`DotenvEditor::load`] is called.
  pub fn new(config: EditorConfig) -> Result<Self, EditorError> {
    let EditorConfig {
      auto_backup,
      backup_path,
      always_create_backup_folder,
      grammar,
    } = config;

    let backups = Backups::new(backup_path);
    if always_create_backup_folder {
      backups.create_dir()?;
    }

    let file_path = default_file_path();

    #[cfg(feature = "tracing")]
    debug!(%grammar, ?file_path, backup_dir = ?backups.dir(), "Created editor");

    Ok(Self {
      reader: DotenvReader::new(grammar),
      writer: DotenvWriter::new(Formatter::new(grammar)),
      backups,
      file_path,
      auto_backup,
      has_changed: false,
    })
  }

  /// Loads a file for editing, `.env` in the current directory by default.
  ///
  /// A missing file leaves an empty buffer, unless `restore_if_not_found` is
  /// set: the file is then restored from `restore_path` or the latest backup.
  pub fn load(
    &mut self,
    file_path: Option<&Path>,
    restore_if_not_found: bool,
    restore_path: Option<&Path>,
  ) -> Result<&mut Self, EditorError> {
    self.file_path = file_path.map_or_else(default_file_path, Path::to_path_buf);
    self.reader.load(&self.file_path);
    self.writer.set_buffer(Vec::new());
    self.has_changed = false;

    #[cfg(feature = "tracing")]
    debug!("Loading {:?}", self.file_path);

    if self.file_path.is_file() {
      self.build_buffer()?;
    } else if restore_if_not_found {
      self.restore(restore_path)?;
    }

    Ok(self)
  }

  pub fn file_path(&self) -> &Path {
    &self.file_path
  }

  // Reading

  pub fn content(&self) -> Result<String, EditorError> {
    Ok(self.reader.content()?)
  }

  pub fn raw_entries(&self) -> Result<Vec<RawEntry>, EditorError> {
    Ok(self.reader.raw_entries()?)
  }

  pub fn entries(&self) -> Result<Vec<Entry>, EditorError> {
    Ok(self.reader.entries()?)
  }

  /// Setters of the file, all of them or only those named in `filter`.
  pub fn keys(&self, filter: &[&str]) -> Result<Vec<KeyInfo>, EditorError> {
    let mut keys = self.reader.keys()?;
    if !filter.is_empty() {
      keys.retain(|info| filter.contains(&info.key.as_str()));
    }
    Ok(keys)
  }

  pub fn key(&self, key: &str) -> Result<KeyInfo, EditorError> {
    self
      .keys(&[key])?
      .into_iter()
      .next()
      .ok_or_else(|| EditorError::KeyNotFound(key.to_string()))
  }

  pub fn value(&self, key: &str) -> Result<String, EditorError> {
    Ok(self.key(key)?.value)
  }

  pub fn key_exists(&self, key: &str) -> Result<bool, EditorError> {
    Ok(self.reader.keys()?.iter().any(|info| info.key == key))
  }

  // Writing

  pub fn has_changed(&self) -> bool {
    self.has_changed
  }

  pub fn buffer(&self) -> &[Entry] {
    self.writer.buffer()
  }

  /// The buffer as it would be written by [`DotenvEditor::save`].
  pub fn buffer_content(&self) -> Result<String, EditorError> {
    Ok(self.writer.serialize()?)
  }

  pub fn add_empty(&mut self) -> &mut Self {
    self.writer.append_empty();
    self.has_changed = true;
    self
  }

  pub fn add_comment(&mut self, comment: &str) -> &mut Self {
    self.writer.append_comment(comment);
    self.has_changed = true;
    self
  }

  /// Appends each setter missing from the buffer and updates the others.
  pub fn set_keys<I>(&mut self, updates: I) -> Result<&mut Self, EditorError>
  where
    I: IntoIterator<Item = KeyUpdate>,
  {
    for update in updates {
      let KeyUpdate {
        key,
        value,
        comment,
        export,
      } = update;
      let key = self.writer.formatter().format_key(&key, false)?;
      let value = value.unwrap_or_default();

      match self.writer.setter(&key).cloned() {
        Some(current) => {
          let comment = comment.unwrap_or(current.comment);
          let export = export.unwrap_or(current.export);
          self.writer.update_setter(&key, &value, &comment, export)?;
        }
        None => {
          let comment = comment.unwrap_or_default();
          let export = export.unwrap_or_default();
          self.writer.append_setter(&key, &value, &comment, export)?;
        }
      }

      self.has_changed = true;
    }

    Ok(self)
  }

  pub fn set_key(
    &mut self,
    key: &str,
    value: Option<&str>,
    comment: Option<&str>,
    export: Option<bool>,
  ) -> Result<&mut Self, EditorError> {
    self.set_keys([KeyUpdate {
      key: key.to_string(),
      value: value.map(str::to_string),
      comment: comment.map(str::to_string),
      export,
    }])
  }

  pub fn set_setter_comment(
    &mut self,
    key: &str,
    comment: Option<&str>,
  ) -> Result<&mut Self, EditorError> {
    self.writer.update_setter_comment(key, comment)?;
    self.has_changed = true;
    Ok(self)
  }

  pub fn clear_setter_comment(&mut self, key: &str) -> Result<&mut Self, EditorError> {
    self.set_setter_comment(key, None)
  }

  pub fn set_export_setter(&mut self, key: &str, state: bool) -> Result<&mut Self, EditorError> {
    self.writer.update_setter_export(key, state)?;
    self.has_changed = true;
    Ok(self)
  }

  pub fn delete_keys(&mut self, keys: &[&str]) -> &mut Self {
    for key in keys {
      self.writer.delete_setter(key);
    }
    self.has_changed = true;
    self
  }

  pub fn delete_key(&mut self, key: &str) -> &mut Self {
    self.delete_keys(&[key])
  }

  /// Writes the buffer to the file, backing the old file up first when
  /// automatic backups are on.
  ///
  /// With `rebuild_buffer`, a changed buffer is reloaded from the saved file
  /// so that entries get their new line numbers.
  pub fn save(&mut self, rebuild_buffer: bool) -> Result<&mut Self, EditorError> {
    if self.auto_backup && self.file_path.is_file() {
      self.backup()?;
    }

    self.writer.save_to(&self.file_path)?;

    #[cfg(feature = "tracing")]
    info!("Saved {:?}", self.file_path);

    if rebuild_buffer && self.has_changed {
      self.build_buffer()?;
    }

    Ok(self)
  }

  // Backups

  pub fn auto_backup(&mut self, on: bool) -> &mut Self {
    self.auto_backup = on;
    self
  }

  pub fn backup(&self) -> Result<BackupInfo, EditorError> {
    Ok(self.backups.backup(&self.file_path)?)
  }

  pub fn backups(&self) -> Result<Vec<BackupInfo>, EditorError> {
    Ok(self.backups.list()?)
  }

  pub fn latest_backup(&self) -> Result<Option<BackupInfo>, EditorError> {
    Ok(self.backups.latest()?)
  }

  /// Replaces the file with `file_path`, or with the latest backup, and
  /// reloads the buffer from it.
  pub fn restore(&mut self, file_path: Option<&Path>) -> Result<&mut Self, EditorError> {
    let source = match file_path {
      Some(path) => path.to_path_buf(),
      None => {
        self
          .latest_backup()?
          .ok_or(EditorError::NoBackupAvailable)?
          .filepath
      }
    };

    if !source.is_file() {
      return Err(EditorError::FileNotFound(source));
    }

    std::fs::copy(&source, &self.file_path).map_err(|err| EditorError::UnableWriteFile {
      path: self.file_path.clone(),
      source: err,
    })?;

    #[cfg(feature = "tracing")]
    info!("Restored {:?} from {:?}", self.file_path, source);

    self.build_buffer()?;
    Ok(self)
  }

  /// Deletes the given backup files, or all backups when `file_paths` is empty.
  pub fn delete_backups(&self, file_paths: &[PathBuf]) -> Result<&Self, EditorError> {
    self.backups.delete(file_paths)?;
    Ok(self)
  }

  pub fn delete_backup(&self, file_path: &Path) -> Result<&Self, EditorError> {
    self.delete_backups(&[file_path.to_path_buf()])
  }

  fn build_buffer(&mut self) -> Result<(), EditorError> {
    let entries = self.reader.entries()?;
    self.writer.set_buffer(entries);
    self.has_changed = false;
    Ok(())
  }
}

fn default_file_path() -> PathBuf {
  std::env::current_dir()
    .unwrap_or_else(|_| PathBuf::from("."))
    .join(DEFAULT_LOCAL_FILENAME)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn editor_in(dir: &TempDir, content: &str) -> DotenvEditor {
    let file = dir.path().join(".env");
    std::fs::write(&file, content).unwrap();

    let config = EditorConfig {
      backup_path: dir.path().join("backups"),
      ..Default::default()
    };
    let mut editor = DotenvEditor::new(config).unwrap();
    editor.load(Some(file.as_path()), false, None).unwrap();
    editor
  }

  #[test]
  fn test_key_not_found() {
    let dir = TempDir::new().unwrap();
    let editor = editor_in(&dir, "A=1\n");

    assert_eq!(editor.value("A").unwrap(), "1");
    assert!(editor.key_exists("A").unwrap());
    assert!(!editor.key_exists("B").unwrap());
    assert!(matches!(
      editor.key("B"),
      Err(EditorError::KeyNotFound(key)) if key == "B"
    ));
  }

  #[test]
  fn test_set_key_keeps_comment_and_export() {
    let dir = TempDir::new().unwrap();
    let mut editor = editor_in(&dir, "export A=1 # keep me\n");

    editor.set_key("A", Some("2"), None, None).unwrap();
    assert!(editor.has_changed());

    let setter = editor.buffer()[0].setter().unwrap();
    assert_eq!(setter.value, "2");
    assert_eq!(setter.comment, "keep me");
    assert!(setter.export);
  }

  #[test]
  fn test_set_key_twice_appends_once() {
    let dir = TempDir::new().unwrap();
    let mut editor = editor_in(&dir, "");

    editor.set_key("NEW", Some("1"), None, None).unwrap();
    editor.set_key("NEW", Some("2"), Some("second"), Some(true)).unwrap();

    assert_eq!(editor.buffer().len(), 1);
    assert_eq!(
      editor.buffer_content().unwrap(),
      format!("export NEW=2 # second{}", crate::parse::LINE_ENDING)
    );
  }

  #[test]
  fn test_set_key_matches_existing_key_as_stored() {
    let dir = TempDir::new().unwrap();
    let mut editor = editor_in(&dir, "FOO=1\nBAR=2\n");

    editor.set_key("export FOO", Some("x"), None, None).unwrap();
    editor.set_key(" BAR ", Some("y"), None, None).unwrap();
    editor.save(true).unwrap();

    let lines = ["FOO=x", "BAR=y", ""].join(crate::parse::LINE_ENDING);
    assert_eq!(std::fs::read_to_string(editor.file_path()).unwrap(), lines);
    assert_eq!(editor.keys(&[]).unwrap().len(), 2);
  }

  #[test]
  fn test_invalid_key_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut editor = editor_in(&dir, "");
    assert!(matches!(
      editor.set_key("NOT VALID", Some("1"), None, None),
      Err(EditorError::InvalidKey(_))
    ));
    assert!(!editor.has_changed());
  }

  #[test]
  fn test_invalid_value_aborts_load() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join(".env");
    std::fs::write(&file, "A=1\nB=\"a\\qb\"\n").unwrap();

    let mut editor = DotenvEditor::new(EditorConfig::default()).unwrap();
    let err = editor.load(Some(file.as_path()), false, None).unwrap_err();
    assert!(matches!(err, EditorError::InvalidValue(_)));
    assert!(editor.buffer().is_empty());
  }

  #[test]
  fn test_manual_backup_and_auto_backup_toggle() {
    let dir = TempDir::new().unwrap();
    let mut editor = editor_in(&dir, "A=1\n\nB=2\n");

    let raw = editor.raw_entries().unwrap();
    assert_eq!(raw.len(), 3);
    assert_eq!(raw[2].line, 3);

    editor
      .auto_backup(false)
      .delete_keys(&["A", "B"])
      .save(false)
      .unwrap();
    assert!(editor.backups().unwrap().is_empty());

    let info = editor.backup().unwrap();
    assert_eq!(editor.latest_backup().unwrap(), Some(info.clone()));
    editor.delete_backup(&info.filepath).unwrap();
    assert!(editor.backups().unwrap().is_empty());
  }

  #[test]
  fn test_restore_without_backups() {
    let dir = TempDir::new().unwrap();
    let mut editor = editor_in(&dir, "A=1\n");
    assert!(matches!(
      editor.restore(None),
      Err(EditorError::NoBackupAvailable)
    ));
    assert!(matches!(
      editor.restore(Some(dir.path().join("missing").as_path())),
      Err(EditorError::FileNotFound(_))
    ));
  }
}
