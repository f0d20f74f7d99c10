//! Reading a dotenv file into entries and keys.

use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::{
  entry::{Entry, ParsedEntry, RawEntry},
  parse::{Grammar, ParseError, segment},
};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
  #[error("Unable to read the file at {}: {source}", .path.display())]
  UnableReadFile {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error(transparent)]
  Parse(#[from] ParseError),
}

/// What the file says about one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
  pub key: String,
  pub line: usize,
  pub export: bool,
  pub value: String,
  pub comment: String,
}

/// Parses dotenv content into entries carrying line numbers and raw data.
pub fn parse_entries(grammar: Grammar, content: &str) -> Result<Vec<Entry>, ParseError> {
  segment(content)
    .into_iter()
    .map(|raw| {
      let parsed = grammar.parse_entry(&raw.raw_data)?;
      Ok(Entry {
        line: Some(raw.line),
        raw_data: Some(raw.raw_data),
        parsed,
      })
    })
    .collect()
}

/// Collects the setters of `entries` in file order.
///
/// A repeated key keeps the position of its first occurrence and the data of
/// its last one.
pub fn collect_keys(entries: &[Entry]) -> Vec<KeyInfo> {
  let mut keys: Vec<KeyInfo> = Vec::new();

  for entry in entries {
    let ParsedEntry::Setter(setter) = &entry.parsed else {
      continue;
    };

    let info = KeyInfo {
      key: setter.key.clone(),
      line: entry.line.unwrap_or_default(),
      export: setter.export,
      value: setter.value.clone(),
      comment: setter.comment.clone(),
    };

    match keys.iter_mut().find(|known| known.key == info.key) {
      Some(known) => *known = info,
      None => keys.push(info),
    }
  }

  keys
}

/// Reads one dotenv file with a given grammar.
#[derive(Debug, Clone, Default)]
pub struct DotenvReader {
  grammar: Grammar,
  path: PathBuf,
}

impl DotenvReader {
  pub fn new(grammar: Grammar) -> Self {
    Self {
      grammar,
      path: PathBuf::new(),
    }
  }

  pub fn load<P: Into<PathBuf>>(&mut self, path: P) -> &mut Self {
    self.path = path.into();
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn grammar(&self) -> Grammar {
    self.grammar
  }

  /// The file content as it is on disk.
  pub fn content(&self) -> Result<String, ReadError> {
    #[cfg(feature = "tracing")]
    debug!("Reading {:?}", self.path);

    std::fs::read_to_string(&self.path).map_err(|source| ReadError::UnableReadFile {
      path: self.path.clone(),
      source,
    })
  }

  /// Line numbers and raw text of every entry, without parsing them.
  pub fn raw_entries(&self) -> Result<Vec<RawEntry>, ReadError> {
    Ok(segment(&self.content()?))
  }

  /// Every entry of the file, parsed. Any invalid entry fails the whole read.
  pub fn entries(&self) -> Result<Vec<Entry>, ReadError> {
    let entries = parse_entries(self.grammar, &self.content()?)?;

    #[cfg(feature = "tracing")]
    debug!("Parsed {} entries", entries.len());

    Ok(entries)
  }

  pub fn keys(&self) -> Result<Vec<KeyInfo>, ReadError> {
    Ok(collect_keys(&self.entries()?))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::EntryType;

  #[test]
  fn test_parse_entries() {
    let entries = parse_entries(Grammar::V3, "# head\n\nA=1\nB=\"x\ny\"\nC=3").unwrap();
    let summary: Vec<(Option<usize>, EntryType)> = entries
      .iter()
      .map(|entry| (entry.line, entry.entry_type()))
      .collect();
    assert_eq!(
      summary,
      vec![
        (Some(1), EntryType::Comment),
        (Some(2), EntryType::Empty),
        (Some(3), EntryType::Setter),
        (Some(4), EntryType::Setter),
        (Some(6), EntryType::Setter),
      ]
    );
  }

  #[test]
  fn test_parse_error_aborts_everything() {
    let err = parse_entries(Grammar::V3, "A=1\nB=\"open\nC=3").unwrap_err();
    assert!(matches!(err, ParseError::InvalidValue { .. }));
  }

  #[test]
  fn test_collect_keys_with_duplicates() {
    let entries = parse_entries(Grammar::V3, "A=1\nB=2 # b\nA=3").unwrap();
    let keys = collect_keys(&entries);
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].key, "A");
    assert_eq!(keys[0].value, "3");
    assert_eq!(keys[0].line, 3);
    assert_eq!(keys[1].comment, "b");
  }

  #[test]
  fn test_unreadable_file() {
    let mut reader = DotenvReader::new(Grammar::V3);
    reader.load("/nonexistent-dir/.env");
    assert_eq!(reader.path(), Path::new("/nonexistent-dir/.env"));
    assert_eq!(reader.grammar(), Grammar::V3);
    assert!(matches!(
      reader.content(),
      Err(ReadError::UnableReadFile { .. })
    ));
  }
}
