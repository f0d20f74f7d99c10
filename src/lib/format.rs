//! Rendering of setters and comments back into dotenv lines.
//!
//! Formatting canonicalizes: quotes are only added when the value could not
//! be read back without them, and comments always come out as `# text`.

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::{
  entry::Setter,
  parse::{COMMENT_LEAD, Grammar, LINE_ENDING},
};

const EXPORT_PREFIX: &str = "export ";
const KEY_STRIPPED: &[char] = &['\'', '"'];
const LINE_BREAKS: &[char] = &['\r', '\n'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
  #[error("There is an invalid setter key. Caught at [{0}].")]
  InvalidKey(String),
}

/// Formats dotenv lines for a given grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
  grammar: Grammar,
}

impl Formatter {
  pub fn new(grammar: Grammar) -> Self {
    Self { grammar }
  }

  pub fn grammar(&self) -> Grammar {
    self.grammar
  }

  /// Cleans up a key and checks it against `[A-Za-z0-9_.]+`.
  pub fn format_key(&self, key: &str, export: bool) -> Result<String, FormatError> {
    let key = key.replace(EXPORT_PREFIX, "").replace(KEY_STRIPPED, "");
    let key = key.trim();

    if !is_valid_key(key) {
      return Err(FormatError::InvalidKey(key.to_string()));
    }

    if export {
      Ok(format!("{EXPORT_PREFIX}{key}"))
    } else {
      Ok(key.to_string())
    }
  }

  /// Returns `# text`, or an empty string when there is no text.
  pub fn format_comment(&self, comment: &str) -> String {
    let comment = comment.replace("\r\n", " ").replace(LINE_BREAKS, " ");
    let comment = comment.trim_start_matches(COMMENT_LEAD).trim_end_matches(' ');

    if comment.is_empty() {
      String::new()
    } else {
      format!("# {comment}")
    }
  }

  /// Renders a value followed by an already formatted comment.
  pub fn format_value(&self, value: &str, comment: &str) -> String {
    let has_comment = !comment.is_empty();
    let force_quotes = has_comment && value.is_empty();

    let mut output = if force_quotes || self.needs_quotes(value) {
      format!("\"{}\"", quote_escape(value))
    } else {
      value.to_string()
    };

    if has_comment {
      output.push(' ');
      output.push_str(comment);
    }

    output
  }

  pub fn format_setter(
    &self,
    key: &str,
    value: &str,
    comment: &str,
    export: bool,
  ) -> Result<String, FormatError> {
    let key = self.format_key(key, export)?;
    let value = self.format_value(value, &self.format_comment(comment));

    #[cfg(feature = "tracing")]
    trace!("Formatted setter {}", key);

    Ok(format!("{key}={value}"))
  }

  pub fn format(&self, setter: &Setter) -> Result<String, FormatError> {
    self.format_setter(&setter.key, &setter.value, &setter.comment, setter.export)
  }

  fn needs_quotes(&self, value: &str) -> bool {
    let special = |c: char| {
      matches!(
        c,
        '#' | '"' | '\'' | '\\' | ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r'
      )
    };

    value.chars().any(special)
      || (self.grammar.quotes_references() && contains_reference(value))
  }
}

/// Escapes a value for double quotes. Line endings stay literal so the value
/// is written as a multi-line block; any other carriage return would be read
/// back as a line break and is written as `\r`.
fn quote_escape(value: &str) -> String {
  value
    .split(LINE_ENDING)
    .map(|part| {
      part
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "\\r")
    })
    .collect::<Vec<_>>()
    .join(LINE_ENDING)
}

fn is_valid_key(key: &str) -> bool {
  !key.is_empty()
    && key
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Whether `value` contains a `${NAME}` reference.
fn contains_reference(value: &str) -> bool {
  value.match_indices("${").any(|(pos, _)| {
    let rest = &value[pos + 2..];
    let name_len = rest
      .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
      .unwrap_or(rest.len());
    name_len > 0 && rest[name_len..].starts_with('}')
  })
}
