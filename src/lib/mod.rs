//! Programmatic editing of `.env` files.
//!
//! This library reads a dotenv file into ordered entries (blank lines,
//! comments and `KEY=VALUE` setters), lets you add, update and delete them in
//! memory, and writes the result back without disturbing the lines you did
//! not touch. It can also keep timestamped backups of the file and restore
//! from them.
//!
//! # Features
//!
//! - **Layout preservation**: untouched lines are written back byte for byte
//! - **Quoted values**: single and double quotes, escape sequences, inline
//!   comments, `export` prefixes and multi-line double-quoted values
//! - **Grammar variants**: three compatible value grammars, selected through
//!   configuration
//! - **Backups**: automatic backup before every save, listing and restore
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust,no_run
//! use env_editor::{config::EditorConfig, editor::DotenvEditor};
//!
//! let mut editor = DotenvEditor::new(EditorConfig::default()).unwrap();
//! editor.load(None, false, None).unwrap(); // defaults to .env
//! editor.set_key("DEBUG", Some("false"), None, None).unwrap();
//! editor.save(true).unwrap();
//! ```

pub mod backup;
pub mod config;
pub mod editor;
pub mod entry;
pub mod format;
pub mod parse;
pub mod reader;
pub mod writer;

pub use config::EditorConfig;
pub use editor::{DotenvEditor, EditorError, KeyUpdate};
pub use entry::{Entry, EntryType, ParsedEntry, Setter};
pub use format::Formatter;
pub use parse::Grammar;
