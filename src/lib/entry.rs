//! The entry model: one logical unit of a dotenv file.

use std::fmt;

/// The kind of a parsed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
  Empty,
  Comment,
  Setter,
  Unknown,
}

impl fmt::Display for EntryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      EntryType::Empty => "empty",
      EntryType::Comment => "comment",
      EntryType::Setter => "setter",
      EntryType::Unknown => "unknown",
    };
    f.write_str(name)
  }
}

/// A `KEY=VALUE` line, with the value unescaped and the comment normalized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Setter {
  pub export: bool,
  pub key: String,
  pub value: String,
  pub comment: String,
}

impl Setter {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
      ..Default::default()
    }
  }

  pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
    self.comment = comment.into();
    self
  }

  pub fn with_export(mut self, export: bool) -> Self {
    self.export = export;
    self
  }
}

/// Structured content of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEntry {
  Empty,
  /// A standalone comment, without its leading `#`.
  Comment(String),
  Setter(Setter),
  /// A line matching no known shape. Written back verbatim.
  Unknown,
}

impl ParsedEntry {
  pub fn entry_type(&self) -> EntryType {
    match self {
      ParsedEntry::Empty => EntryType::Empty,
      ParsedEntry::Comment(_) => EntryType::Comment,
      ParsedEntry::Setter(_) => EntryType::Setter,
      ParsedEntry::Unknown => EntryType::Unknown,
    }
  }

  pub fn as_setter(&self) -> Option<&Setter> {
    match self {
      ParsedEntry::Setter(setter) => Some(setter),
      _ => None,
    }
  }

  pub fn comment(&self) -> &str {
    match self {
      ParsedEntry::Comment(comment) => comment,
      ParsedEntry::Setter(setter) => &setter.comment,
      _ => "",
    }
  }
}

/// One line, or one multi-line block, of a dotenv file.
///
/// `line` is the 1-based number of the first physical line the entry came
/// from. Entries created in memory have neither a line number nor raw data
/// until the buffer is saved and reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
  pub line: Option<usize>,
  pub raw_data: Option<String>,
  pub parsed: ParsedEntry,
}

impl Entry {
  pub fn new(parsed: ParsedEntry) -> Self {
    Self {
      line: None,
      raw_data: None,
      parsed,
    }
  }

  pub fn entry_type(&self) -> EntryType {
    self.parsed.entry_type()
  }

  pub fn setter(&self) -> Option<&Setter> {
    self.parsed.as_setter()
  }

  /// Whether this entry is a setter for `key`.
  pub fn is_setter_for(&self, key: &str) -> bool {
    self.setter().is_some_and(|setter| setter.key == key)
  }
}

/// Raw result of line segmentation, before any entry-level parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
  pub line: usize,
  pub raw_data: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_entry_type_names() {
    assert_eq!(EntryType::Setter.to_string(), "setter");
    assert_eq!(ParsedEntry::Empty.entry_type(), EntryType::Empty);
    assert_eq!(
      ParsedEntry::Comment("note".into()).entry_type(),
      EntryType::Comment
    );
  }

  #[test]
  fn test_is_setter_for() {
    let entry = Entry::new(ParsedEntry::Setter(Setter::new("APP_NAME", "demo")));
    assert!(entry.is_setter_for("APP_NAME"));
    assert!(!entry.is_setter_for("APP"));
    assert!(entry.line.is_none());

    let comment = Entry::new(ParsedEntry::Comment("APP_NAME".into()));
    assert!(!comment.is_setter_for("APP_NAME"));
    assert_eq!(comment.parsed.comment(), "APP_NAME");
  }

  #[test]
  fn test_setter_builder() {
    let setter = Setter::new("A", "1").with_comment("note").with_export(true);
    assert_eq!(
      setter,
      Setter {
        export: true,
        key: "A".into(),
        value: "1".into(),
        comment: "note".into(),
      }
    );
    assert_eq!(ParsedEntry::Setter(setter).comment(), "note");
  }
}
