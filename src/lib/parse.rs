//! Dotenv grammar: line segmentation and entry parsing.
//!
//! Parsing happens in two steps. [`segment`] splits the file text into
//! [`RawEntry`] values, folding double-quoted values that span several
//! physical lines into a single entry. [`Grammar::parse_entry`] then turns the
//! raw text of one entry into a [`ParsedEntry`].
//!
//! Three grammar variants exist. They share everything but the decision table
//! of the setter value state machine:
//!
//! - [`Grammar::V1`] treats `'` and `"` alike: the value closes on the quote
//!   that opened it and escapes are processed inside both.
//! - [`Grammar::V2`] only processes escapes inside double quotes; single
//!   quoted values are taken literally.
//! - [`Grammar::V3`] behaves like V2. Values are decoded per code point, so
//!   escapes next to non-ASCII text are handled correctly.

use std::{fmt, str::FromStr};

use serde::Deserialize;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::entry::{ParsedEntry, RawEntry, Setter};

/// Separator used when joining the physical lines of a multi-line value and
/// when writing a file back.
pub const LINE_ENDING: &str = if cfg!(windows) { "\r\n" } else { "\n" };

const COMMENT_PREFIX: char = '#';
const ASSIGNMENT_OPERATOR: char = '=';
const EXPORT_PREFIX: &str = "export ";
const MULTILINE_OPENER: &str = "=\"";

/// Characters removed when trimming keys and setter data.
pub(crate) const BLANKS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];
/// Characters removed from the left of a comment.
pub(crate) const COMMENT_LEAD: &[char] = &['#', ' '];
const KEY_QUOTES: &[char] = &['\'', '"'];

/// The grammar variant used to decode setter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
  V1,
  V2,
  #[default]
  V3,
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Grammar::V1 => "v1",
      Grammar::V2 => "v2",
      Grammar::V3 => "v3",
    };
    f.write_str(name)
  }
}

impl FromStr for Grammar {
  type Err = UnknownGrammar;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "v1" | "1" => Ok(Grammar::V1),
      "v2" | "2" => Ok(Grammar::V2),
      "v3" | "3" => Ok(Grammar::V3),
      _ => Err(UnknownGrammar(s.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown grammar version: {0} (expected v1, v2 or v3)")]
pub struct UnknownGrammar(pub String);

/// Why a setter value could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
  UnexpectedEscapeSequence,
  UnexpectedWhitespace,
  MissingClosingQuote,
}

impl fmt::Display for Cause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Cause::UnexpectedEscapeSequence => "an unexpected escape sequence",
      Cause::UnexpectedWhitespace => "unexpected whitespace",
      Cause::MissingClosingQuote => "a missing closing quote",
    };
    f.write_str(text)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
  #[error(
    "Failed to parse dotenv setter value due to {cause}. Failed at [{}].",
    first_line(.subject)
  )]
  InvalidValue { cause: Cause, subject: String },
}

fn first_line(subject: &str) -> &str {
  subject.lines().next().unwrap_or_default()
}

/// Splits text into physical lines, accepting `\n`, `\r\n` and `\r`.
///
/// A terminator at the very end of the text does not start another line.
pub fn split_lines(text: &str) -> Vec<&str> {
  let bytes = text.as_bytes();
  let mut lines = Vec::new();
  let mut start = 0;
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'\n' => {
        lines.push(&text[start..i]);
        i += 1;
        start = i;
      }
      b'\r' => {
        lines.push(&text[start..i]);
        i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
        start = i;
      }
      _ => i += 1,
    }
  }

  if start < text.len() {
    lines.push(&text[start..]);
  }

  lines
}

/// Splits file content into raw entries.
///
/// Physical lines of a multi-line double-quoted value are joined with
/// [`LINE_ENDING`] into one entry numbered after its first line. Numbering of
/// later entries keeps following the physical lines.
pub fn segment(text: &str) -> Vec<RawEntry> {
  let lines = split_lines(text);

  #[cfg(feature = "tracing")]
  debug!("Segmenting dotenv content with {} lines", lines.len());

  let mut output = Vec::new();
  let mut block: Vec<&str> = Vec::new();
  let mut block_start = 0;

  for (index, line) in lines.into_iter().enumerate() {
    let started = looks_like_multiline_start(line);

    if started && block.is_empty() {
      #[cfg(feature = "tracing")]
      trace!("Multi-line value starts at line {}", index + 1);

      block_start = index;
    }

    if started || !block.is_empty() {
      block.push(line);

      if looks_like_multiline_stop(line, started) {
        output.push(RawEntry {
          line: block_start + 1,
          raw_data: block.join(LINE_ENDING),
        });
        block.clear();
      }
      continue;
    }

    output.push(RawEntry {
      line: index + 1,
      raw_data: line.to_string(),
    });
  }

  if !block.is_empty() {
    #[cfg(feature = "tracing")]
    debug!("Content ended inside a multi-line value");

    output.push(RawEntry {
      line: block_start + 1,
      raw_data: block.join(LINE_ENDING),
    });
  }

  output
}

fn looks_like_multiline_start(line: &str) -> bool {
  line.contains(MULTILINE_OPENER) && !looks_like_multiline_stop(line, true)
}

/// Counts unescaped quotes, ignoring `\\` pairs. A line that did not open the
/// value counts as having seen the opening quote already.
fn looks_like_multiline_stop(line: &str, started: bool) -> bool {
  if line == "\"" {
    return true;
  }

  let chars: Vec<char> = line.replace("\\\\", "").chars().collect();
  let quotes = chars
    .windows(2)
    .filter(|pair| pair[0] != '\\' && pair[1] == '"')
    .count();
  let seen = usize::from(!started) + quotes;

  seen > 1
}

/// Whitespace as seen by the value state machine.
fn is_space(c: char) -> bool {
  matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

pub(crate) fn normalise_comment(comment: &str) -> String {
  comment
    .trim_start_matches(COMMENT_LEAD)
    .trim_end_matches(' ')
    .to_string()
}

fn normalise_key(key: &str) -> String {
  key
    .replace(EXPORT_PREFIX, "")
    .replace(KEY_QUOTES, "")
    .trim_matches(BLANKS)
    .to_string()
}

fn is_export_key(key: &str) -> bool {
  key
    .trim_matches(BLANKS)
    .strip_prefix("export")
    .and_then(|rest| rest.strip_prefix(|c: char| c == ' ' || c == '\t'))
    .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('\n'))
}

impl Grammar {
  /// Parses the raw text of one entry.
  pub fn parse_entry(&self, data: &str) -> Result<ParsedEntry, ParseError> {
    let trimmed = data.trim_matches(BLANKS);

    if trimmed.is_empty() {
      return Ok(ParsedEntry::Empty);
    }

    if trimmed.starts_with(COMMENT_PREFIX) {
      return Ok(ParsedEntry::Comment(normalise_comment(trimmed)));
    }

    if data.find(ASSIGNMENT_OPERATOR).is_some_and(|pos| pos > 0) {
      return self.parse_setter(data).map(ParsedEntry::Setter);
    }

    #[cfg(feature = "tracing")]
    trace!("Unrecognized entry: {:?}", data);

    Ok(ParsedEntry::Unknown)
  }

  fn parse_setter(&self, setter: &str) -> Result<Setter, ParseError> {
    let (key, data) = setter
      .split_once(ASSIGNMENT_OPERATOR)
      .unwrap_or((setter, ""));
    let key = key.trim_matches(BLANKS);
    let (value, comment) = self.parse_setter_data(data.trim_matches(BLANKS))?;

    #[cfg(feature = "tracing")]
    trace!(
      "Parsed setter: key={}, value={:?}, has_comment={}",
      key,
      value,
      !comment.is_empty()
    );

    Ok(Setter {
      export: is_export_key(key),
      key: normalise_key(key),
      value,
      comment,
    })
  }

  /// Separates a setter's data into its unescaped value and its comment.
  pub fn parse_setter_data(&self, data: &str) -> Result<(String, String), ParseError> {
    if data.trim_matches(BLANKS).is_empty() {
      return Ok((String::new(), String::new()));
    }

    let mut machine = ValueMachine::new(*self);
    for c in data.chars() {
      machine.feed(c).map_err(|cause| ParseError::InvalidValue {
        cause,
        subject: data.to_string(),
      })?;
    }

    machine.finish().map_err(|cause| ParseError::InvalidValue {
      cause,
      subject: data.to_string(),
    })
  }

  /// Whether `c` opens a quoted value.
  fn opens_quote(&self, c: char) -> bool {
    c == '"' || c == '\''
  }

  /// Whether escape sequences are decoded inside values quoted with `quote`.
  fn decodes_escapes(&self, quote: char) -> bool {
    match self {
      Grammar::V1 => true,
      Grammar::V2 | Grammar::V3 => quote == '"',
    }
  }

  /// The character produced by `\c` inside a value quoted with `quote`.
  fn unescape(&self, quote: char, c: char) -> Option<char> {
    let literal = match self {
      Grammar::V1 => c == quote || c == '\\',
      Grammar::V2 | Grammar::V3 => matches!(c, '"' | '\\' | '$'),
    };
    if literal {
      return Some(c);
    }

    match c {
      'f' => Some('\x0C'),
      'n' => Some('\n'),
      'r' => Some('\r'),
      't' => Some('\t'),
      'v' => Some('\x0B'),
      _ => None,
    }
  }

  /// Whether a `${NAME}` reference in a value must be quoted when written.
  pub fn quotes_references(&self) -> bool {
    !matches!(self, Grammar::V1)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  Initial,
  Unquoted,
  /// Inside a value opened by the given quote.
  Quoted(char),
  /// Right after a backslash inside a value opened by the given quote.
  EscapeSequence(char),
  /// After a closed quote or unquoted value; only whitespace or `#` may follow.
  Whitespace,
  Comment,
}

struct ValueMachine {
  grammar: Grammar,
  state: State,
  value: String,
  comment: String,
}

impl ValueMachine {
  fn new(grammar: Grammar) -> Self {
    Self {
      grammar,
      state: State::Initial,
      value: String::new(),
      comment: String::new(),
    }
  }

  fn feed(&mut self, c: char) -> Result<(), Cause> {
    self.state = match self.state {
      State::Initial => {
        if self.grammar.opens_quote(c) {
          State::Quoted(c)
        } else if c == COMMENT_PREFIX {
          State::Comment
        } else {
          self.value.push(c);
          State::Unquoted
        }
      }
      State::Unquoted => {
        if c == COMMENT_PREFIX {
          State::Comment
        } else if is_space(c) {
          State::Whitespace
        } else {
          self.value.push(c);
          State::Unquoted
        }
      }
      State::Quoted(quote) => {
        if c == quote {
          State::Whitespace
        } else if c == '\\' && self.grammar.decodes_escapes(quote) {
          State::EscapeSequence(quote)
        } else {
          self.value.push(c);
          State::Quoted(quote)
        }
      }
      State::EscapeSequence(quote) => {
        let unescaped = self
          .grammar
          .unescape(quote, c)
          .ok_or(Cause::UnexpectedEscapeSequence)?;
        self.value.push(unescaped);
        State::Quoted(quote)
      }
      State::Whitespace => {
        if c == COMMENT_PREFIX {
          State::Comment
        } else if is_space(c) {
          State::Whitespace
        } else {
          return Err(Cause::UnexpectedWhitespace);
        }
      }
      State::Comment => {
        self.comment.push(c);
        State::Comment
      }
    };

    Ok(())
  }

  fn finish(self) -> Result<(String, String), Cause> {
    match self.state {
      State::Quoted(_) | State::EscapeSequence(_) => Err(Cause::MissingClosingQuote),
      _ => Ok((self.value, normalise_comment(&self.comment))),
    }
  }
}
