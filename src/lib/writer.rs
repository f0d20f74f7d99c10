//! The pending content of a dotenv file and the edits applied to it.
//!
//! Setters are matched by key with a linear scan. Keys are expected to be
//! unique, but a hand-edited file may repeat one: updates then touch the first
//! match only, while deletion removes every match.

use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::{
  entry::{Entry, ParsedEntry, Setter},
  format::{FormatError, Formatter},
  parse::LINE_ENDING,
};

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
  #[error("Key not found in buffer: {0}")]
  KeyNotFound(String),
  #[error(transparent)]
  Format(#[from] FormatError),
  #[error("Unable to write to the file at {}: {source}", .path.display())]
  UnableWriteFile {
    path: PathBuf,
    source: std::io::Error,
  },
}

/// Holds the ordered entries that will be written to the file.
#[derive(Debug, Clone, Default)]
pub struct DotenvWriter {
  formatter: Formatter,
  buffer: Vec<Entry>,
}

impl DotenvWriter {
  pub fn new(formatter: Formatter) -> Self {
    Self {
      formatter,
      buffer: Vec::new(),
    }
  }

  pub fn set_buffer(&mut self, entries: Vec<Entry>) -> &mut Self {
    self.buffer = entries;
    self
  }

  pub fn buffer(&self) -> &[Entry] {
    &self.buffer
  }

  pub fn formatter(&self) -> &Formatter {
    &self.formatter
  }

  /// Whether the buffer holds a setter for `key`.
  pub fn contains(&self, key: &str) -> bool {
    self.setter(key).is_some()
  }

  /// The first setter for `key`, if any.
  ///
  /// Keys are looked up the way they are stored, so `export FOO` and ` FOO `
  /// both find `FOO`.
  pub fn setter(&self, key: &str) -> Option<&Setter> {
    let stored = self.stored_key(key)?;
    self
      .buffer
      .iter()
      .find(|entry| entry.is_setter_for(&stored))
      .and_then(Entry::setter)
  }

  /// Appends an entry without checking for duplicate keys.
  pub fn append(&mut self, parsed: ParsedEntry) -> &mut Self {
    #[cfg(feature = "tracing")]
    trace!("Appending {} entry", parsed.entry_type());

    self.buffer.push(Entry::new(parsed));
    self
  }

  pub fn append_empty(&mut self) -> &mut Self {
    self.append(ParsedEntry::Empty)
  }

  pub fn append_comment(&mut self, comment: &str) -> &mut Self {
    let comment = self.comment_text(comment);
    self.append(ParsedEntry::Comment(comment))
  }

  pub fn append_setter(
    &mut self,
    key: &str,
    value: &str,
    comment: &str,
    export: bool,
  ) -> Result<&mut Self, WriterError> {
    let setter = self.build_setter(key, value, comment, export)?;
    Ok(self.append(ParsedEntry::Setter(setter)))
  }

  /// Replaces the value, comment and export flag of the first setter for `key`.
  pub fn update_setter(
    &mut self,
    key: &str,
    value: &str,
    comment: &str,
    export: bool,
  ) -> Result<&mut Self, WriterError> {
    let setter = self.build_setter(key, value, comment, export)?;
    let key = setter.key.clone();
    self.modify(&key, move |current| *current = setter)
  }

  /// Sets or clears the comment of the first setter for `key`.
  pub fn update_setter_comment(
    &mut self,
    key: &str,
    comment: Option<&str>,
  ) -> Result<&mut Self, WriterError> {
    let comment = self.comment_text(comment.unwrap_or_default());
    self.modify(key, |current| current.comment = comment)
  }

  pub fn update_setter_export(
    &mut self,
    key: &str,
    export: bool,
  ) -> Result<&mut Self, WriterError> {
    self.modify(key, |current| current.export = export)
  }

  /// Removes every setter for `key`. Does nothing when there is none.
  pub fn delete_setter(&mut self, key: &str) -> &mut Self {
    let Some(stored) = self.stored_key(key) else {
      return self;
    };

    #[cfg(feature = "tracing")]
    let before = self.buffer.len();

    self.buffer.retain(|entry| !entry.is_setter_for(&stored));

    #[cfg(feature = "tracing")]
    trace!("Deleted {} entries for {}", before - self.buffer.len(), key);

    self
  }

  /// Renders the buffer, one entry per line plus a final line terminator.
  ///
  /// Entries read from a file and left untouched are written back exactly as
  /// they were read.
  pub fn serialize(&self) -> Result<String, WriterError> {
    let lines = self
      .buffer
      .iter()
      .map(|entry| self.render(entry))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(lines.join(LINE_ENDING) + LINE_ENDING)
  }

  pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), WriterError> {
    let path = path.as_ref();

    #[cfg(feature = "tracing")]
    debug!("Writing {} entries to {:?}", self.buffer.len(), path);

    let content = self.serialize()?;
    std::fs::write(path, content).map_err(|source| WriterError::UnableWriteFile {
      path: path.to_path_buf(),
      source,
    })
  }

  fn render(&self, entry: &Entry) -> Result<String, WriterError> {
    if let Some(raw) = &entry.raw_data {
      return Ok(raw.clone());
    }

    let line = match &entry.parsed {
      ParsedEntry::Empty | ParsedEntry::Unknown => String::new(),
      ParsedEntry::Comment(comment) => self.formatter.format_comment(comment),
      ParsedEntry::Setter(setter) => self.formatter.format(setter)?,
    };
    Ok(line)
  }

  fn build_setter(
    &self,
    key: &str,
    value: &str,
    comment: &str,
    export: bool,
  ) -> Result<Setter, WriterError> {
    let key = self.formatter.format_key(key, false)?;
    Ok(Setter {
      export,
      key,
      value: value.to_string(),
      comment: self.comment_text(comment),
    })
  }

  /// The normalized text of a comment, without its `# ` marker.
  fn comment_text(&self, comment: &str) -> String {
    let formatted = self.formatter.format_comment(comment);
    formatted
      .strip_prefix("# ")
      .unwrap_or_default()
      .to_string()
  }

  /// The key as it is stored in the buffer. `None` for a key that could
  /// never have been stored.
  fn stored_key(&self, key: &str) -> Option<String> {
    self.formatter.format_key(key, false).ok()
  }

  fn modify<F>(&mut self, key: &str, apply: F) -> Result<&mut Self, WriterError>
  where
    F: FnOnce(&mut Setter),
  {
    let stored = self.stored_key(key);
    let entry = stored
      .and_then(|stored| {
        self
          .buffer
          .iter_mut()
          .find(|entry| entry.is_setter_for(&stored))
      })
      .ok_or_else(|| WriterError::KeyNotFound(key.to_string()))?;

    if let ParsedEntry::Setter(setter) = &mut entry.parsed {
      apply(setter);
      entry.raw_data = None;
    }

    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entry::EntryType, parse::Grammar};

  fn loaded(content: &str) -> DotenvWriter {
    let grammar = Grammar::default();
    let entries = crate::parse::segment(content)
      .into_iter()
      .map(|raw| Entry {
        line: Some(raw.line),
        parsed: grammar.parse_entry(&raw.raw_data).unwrap(),
        raw_data: Some(raw.raw_data),
      })
      .collect();

    let mut writer = DotenvWriter::new(Formatter::new(grammar));
    writer.set_buffer(entries);
    writer
  }

  fn keys(writer: &DotenvWriter) -> Vec<&str> {
    writer
      .buffer()
      .iter()
      .filter_map(Entry::setter)
      .map(|setter| setter.key.as_str())
      .collect()
  }

  #[test]
  fn test_append_leaves_line_unset() {
    let mut writer = DotenvWriter::default();
    writer.append_empty();
    writer.append_comment("## Section ");
    writer.append_setter("APP_ENV", "local", "", false).unwrap();

    let types: Vec<EntryType> = writer.buffer().iter().map(Entry::entry_type).collect();
    assert_eq!(
      types,
      vec![EntryType::Empty, EntryType::Comment, EntryType::Setter]
    );
    assert!(writer.buffer().iter().all(|entry| entry.line.is_none()));
    assert_eq!(writer.buffer()[1].parsed.comment(), "Section");
    assert_eq!(
      writer.serialize().unwrap(),
      ["", "# Section", "APP_ENV=local", ""].join(LINE_ENDING)
    );
  }

  #[test]
  fn test_append_rejects_invalid_key() {
    let mut writer = DotenvWriter::default();
    assert_eq!(writer.formatter().grammar(), Grammar::V3);
    let err = writer.append_setter("BAD-KEY", "1", "", false).unwrap_err();
    assert!(matches!(err, WriterError::Format(FormatError::InvalidKey(_))));
    assert!(writer.buffer().is_empty());
  }

  #[test]
  fn test_update_preserves_position() {
    let mut writer = loaded("APP_NAME=Laravel\n# a comment\nDEBUG=true\nLAST=1\n");
    writer.update_setter("DEBUG", "false", "", false).unwrap();

    assert_eq!(keys(&writer), vec!["APP_NAME", "DEBUG", "LAST"]);
    assert_eq!(writer.buffer()[2].line, Some(3));
    assert_eq!(
      writer.serialize().unwrap(),
      ["APP_NAME=Laravel", "# a comment", "DEBUG=false", "LAST=1", ""].join(LINE_ENDING)
    );
  }

  #[test]
  fn test_update_missing_key() {
    let mut writer = loaded("A=1");
    let err = writer.update_setter("B", "2", "", false).unwrap_err();
    assert!(matches!(err, WriterError::KeyNotFound(key) if key == "B"));
  }

  #[test]
  fn test_untouched_entries_are_verbatim() {
    let content = "A = 1   # spaced\nexport B='two words'\nC=\"multi\nline\"\n";
    let mut writer = loaded(content);
    writer.update_setter_export("A", true).unwrap();

    let expected = [
      "export A=1 # spaced",
      "export B='two words'",
      "C=\"multi",
      "line\"",
      "",
    ]
    .join(LINE_ENDING);
    assert_eq!(writer.serialize().unwrap(), expected);
  }

  #[test]
  fn test_update_comment() {
    let mut writer = loaded("A=1 # old");
    writer.update_setter_comment("A", Some("new")).unwrap();
    assert_eq!(writer.setter("A").unwrap().comment, "new");

    writer.update_setter_comment("A", None).unwrap();
    assert_eq!(writer.serialize().unwrap(), format!("A=1{LINE_ENDING}"));
  }

  #[test]
  fn test_duplicates_update_first_only() {
    let mut writer = loaded("K=1\nOTHER=x\nK=2");
    assert_eq!(keys(&writer), vec!["K", "OTHER", "K"]);

    writer.update_setter("K", "changed", "", false).unwrap();
    let values: Vec<&str> = writer
      .buffer()
      .iter()
      .filter_map(Entry::setter)
      .filter(|setter| setter.key == "K")
      .map(|setter| setter.value.as_str())
      .collect();
    assert_eq!(values, vec!["changed", "2"]);
  }

  #[test]
  fn test_duplicate_appends_then_delete_all() {
    let mut writer = DotenvWriter::default();
    writer.append_setter("K", "1", "", false).unwrap();
    writer.append_setter("K", "2", "", false).unwrap();
    writer.append_setter("OTHER", "x", "", false).unwrap();
    assert_eq!(keys(&writer), vec!["K", "K", "OTHER"]);

    writer.delete_setter("K");
    assert_eq!(keys(&writer), vec!["OTHER"]);
    assert!(!writer.contains("K"));

    writer.delete_setter("K");
    assert_eq!(keys(&writer), vec!["OTHER"]);
  }

  #[test]
  fn test_keys_are_matched_as_stored() {
    let mut writer = loaded("FOO=1\nBAR=2\n");
    assert!(writer.contains("export FOO"));
    assert_eq!(writer.setter(" 'BAR' ").unwrap().value, "2");

    writer.update_setter_comment(" BAR ", Some("c")).unwrap();
    writer.update_setter_export("export FOO", true).unwrap();
    assert!(matches!(
      writer.update_setter_export("NOT VALID", true),
      Err(WriterError::KeyNotFound(key)) if key == "NOT VALID"
    ));

    writer.delete_setter("NOT VALID");
    assert_eq!(keys(&writer), vec!["FOO", "BAR"]);
    assert_eq!(
      writer.serialize().unwrap(),
      ["export FOO=1", "BAR=2 # c", ""].join(LINE_ENDING)
    );

    writer.delete_setter(" BAR ");
    assert_eq!(keys(&writer), vec!["FOO"]);
  }

  #[test]
  fn test_unknown_entries_survive() {
    let writer = loaded("not a setter\nA=1");
    assert_eq!(writer.buffer()[0].entry_type(), EntryType::Unknown);
    assert_eq!(
      writer.serialize().unwrap(),
      ["not a setter", "A=1", ""].join(LINE_ENDING)
    );
  }

  #[test]
  fn test_save_to_unwritable_path() {
    let writer = DotenvWriter::default();
    let err = writer
      .save_to("/nonexistent-dir/for-sure/.env")
      .unwrap_err();
    assert!(matches!(err, WriterError::UnableWriteFile { .. }));
  }
}
