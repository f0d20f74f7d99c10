use clap::{Parser, Subcommand};
use env_editor::{
  config::EditorConfig,
  editor::{DotenvEditor, EditorError},
  parse::Grammar,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
  name = "env-editor",
  about = "Read, edit and write back your .env file without losing its layout",
  version,
  author
)]
struct Cli {
  /// Path to the .env file (defaults to .env in the current directory)
  #[arg(short, long, global = true)]
  file: Option<PathBuf>,

  /// TOML file with editor settings
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Value grammar (v1, v2 or v3)
  #[arg(short, long, global = true)]
  grammar: Option<Grammar>,

  /// Restore the file from a backup or --restore-path if it does not exist
  #[arg(short, long, global = true)]
  restore: bool,

  /// File to restore from instead of the latest backup
  #[arg(long, global = true)]
  restore_path: Option<PathBuf>,

  /// Do not back up the file before saving
  #[arg(long, global = true)]
  no_backup: bool,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print all setters, or only the given keys
  Keys {
    keys: Vec<String>,
  },
  /// Add a new setter or update an existing one
  Set {
    key: String,
    value: Option<String>,
    comment: Option<String>,
    /// Lead the key with "export "
    #[arg(short, long)]
    export: bool,
  },
  /// Delete a setter
  Delete {
    key: String,
  },
  /// Back up the file
  Backup,
  /// List backups
  Backups {
    /// Only show the latest backup
    #[arg(long)]
    latest: bool,
  },
  /// Restore the file from PATH or from the latest backup
  Restore {
    path: Option<PathBuf>,
  },
}

fn setup_tracing(verbose: u8) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match verbose {
    1 => "debug",
    2 => "trace",
    _ => "info",
  };

  tracing_subscriber::registry()
    .with(fmt::layer())
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
  let mut config = match &cli.config {
    Some(path) => EditorConfig::from_file(path)?,
    None => EditorConfig::default(),
  };
  if let Some(grammar) = cli.grammar {
    config.grammar = grammar;
  }
  if cli.no_backup {
    config.auto_backup = false;
  }

  let mut editor = DotenvEditor::new(config)?;

  let restoring = matches!(cli.command, Command::Restore { .. });
  editor.load(
    cli.file.as_deref(),
    cli.restore && !restoring,
    cli.restore_path.as_deref(),
  )?;

  match cli.command {
    Command::Keys { keys } => {
      let filter: Vec<&str> = keys.iter().map(String::as_str).collect();
      for info in editor.keys(&filter)? {
        let export = if info.export { "export " } else { "" };
        println!("{}{}={}", export, info.key, info.value);
      }
    }
    Command::Set {
      key,
      value,
      comment,
      export,
    } => {
      editor.set_key(
        &key,
        value.as_deref(),
        comment.as_deref(),
        export.then_some(true),
      )?;
      editor.save(true)?;
      println!(
        "The key [{}] is set with value [{}].",
        key,
        value.unwrap_or_default()
      );
    }
    Command::Delete { key } => {
      if !editor.key_exists(&key)? {
        return Err(EditorError::KeyNotFound(key).into());
      }
      editor.delete_key(&key).save(true)?;
      println!("The key [{}] is deleted.", key);
    }
    Command::Backup => {
      let backup = editor.backup()?;
      println!("Backed up to {}", backup.filepath.display());
    }
    Command::Backups { latest } => {
      let backups: Vec<_> = if latest {
        editor.latest_backup()?.into_iter().collect()
      } else {
        editor.backups()?
      };
      if backups.is_empty() {
        println!("No backups available.");
      }
      for backup in backups {
        println!(
          "{}  {}",
          backup.created_at.format("%Y-%m-%d %H:%M:%S"),
          backup.filepath.display()
        );
      }
    }
    Command::Restore { path } => {
      editor.restore(path.as_deref())?;
      println!("Restored {}", editor.file_path().display());
    }
  }

  Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let cli = Cli::parse();

  setup_tracing(cli.verbose);

  run(cli)
}
