//! Timestamped copies of a dotenv file.
//!
//! Backups live in one directory and are named `.env.backup_` followed by the
//! local time of their creation as `YYYY_MM_DD_HHMMSS`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

pub const BACKUP_FILENAME_PREFIX: &str = ".env.backup_";
pub const BACKUP_FILENAME_SUFFIX: &str = "";

const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H%M%S";
const TIMESTAMP_SHAPE: &str = "dddd_dd_dd_dddddd";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
  #[error("File does not exist at path {}", .0.display())]
  FileNotFound(PathBuf),
  #[error("Backup IO error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
}

impl BackupError {
  fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
    move |source| BackupError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
  pub filename: String,
  pub filepath: PathBuf,
  pub created_at: NaiveDateTime,
}

/// The backup file name for a given creation time.
pub fn backup_filename(created_at: NaiveDateTime) -> String {
  format!(
    "{BACKUP_FILENAME_PREFIX}{}{BACKUP_FILENAME_SUFFIX}",
    created_at.format(TIMESTAMP_FORMAT)
  )
}

/// The creation time encoded in a backup file name, if it is one.
pub fn parse_backup_filename(filename: &str) -> Option<NaiveDateTime> {
  let stamp = filename
    .strip_prefix(BACKUP_FILENAME_PREFIX)?
    .strip_suffix(BACKUP_FILENAME_SUFFIX)?;

  let well_formed = stamp.len() == TIMESTAMP_SHAPE.len()
    && stamp
      .bytes()
      .zip(TIMESTAMP_SHAPE.bytes())
      .all(|(c, shape)| match shape {
        b'd' => c.is_ascii_digit(),
        _ => c == shape,
      });
  if !well_formed {
    return None;
  }

  NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Manages the backups stored in one directory.
#[derive(Debug, Clone)]
pub struct Backups {
  dir: PathBuf,
}

impl Backups {
  pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn create_dir(&self) -> Result<(), BackupError> {
    if !self.dir.is_dir() {
      #[cfg(feature = "tracing")]
      debug!("Creating backup directory {:?}", self.dir);

      std::fs::create_dir_all(&self.dir).map_err(BackupError::io(&self.dir))?;
    }
    Ok(())
  }

  /// Copies `file` into the backup directory under a timestamped name.
  pub fn backup(&self, file: &Path) -> Result<BackupInfo, BackupError> {
    if !file.is_file() {
      return Err(BackupError::FileNotFound(file.to_path_buf()));
    }

    self.create_dir()?;

    let created_at = Local::now().naive_local();
    let filename = backup_filename(created_at);
    let filepath = self.dir.join(&filename);

    std::fs::copy(file, &filepath).map_err(BackupError::io(&filepath))?;

    #[cfg(feature = "tracing")]
    info!("Backed up {:?} to {:?}", file, filepath);

    Ok(BackupInfo {
      filename,
      filepath,
      created_at: created_at.with_nanosecond(0).unwrap_or(created_at),
    })
  }

  /// All backups in the directory, oldest first.
  pub fn list(&self) -> Result<Vec<BackupInfo>, BackupError> {
    if !self.dir.is_dir() {
      return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for dir_entry in std::fs::read_dir(&self.dir).map_err(BackupError::io(&self.dir))? {
      let dir_entry = dir_entry.map_err(BackupError::io(&self.dir))?;
      let filename = dir_entry.file_name().to_string_lossy().into_owned();

      if let Some(created_at) = parse_backup_filename(&filename) {
        backups.push(BackupInfo {
          filepath: dir_entry.path(),
          filename,
          created_at,
        });
      }
    }

    backups.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    #[cfg(feature = "tracing")]
    debug!("Found {} backups in {:?}", backups.len(), self.dir);

    Ok(backups)
  }

  pub fn latest(&self) -> Result<Option<BackupInfo>, BackupError> {
    Ok(self.list()?.pop())
  }

  /// Deletes the given files, or every backup when `paths` is empty.
  ///
  /// Paths that are not existing files are skipped.
  pub fn delete(&self, paths: &[PathBuf]) -> Result<(), BackupError> {
    let paths = if paths.is_empty() {
      self.list()?.into_iter().map(|backup| backup.filepath).collect()
    } else {
      paths.to_vec()
    };

    for path in paths.iter().filter(|path| path.is_file()) {
      #[cfg(feature = "tracing")]
      debug!("Deleting backup {:?}", path);

      std::fs::remove_file(path).map_err(BackupError::io(path))?;
    }

    Ok(())
  }
}
