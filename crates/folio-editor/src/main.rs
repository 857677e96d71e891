//! folio-editor — command-line front end for the site configuration.
//!
//! Each invocation is one editor "session": it loads the document from
//! the daemon, restores any unsaved draft from `$FOLIO_HOME/drafts`, and
//! runs one command against the synchronizer. Because edits persist to
//! the draft cache on every `set`, unsaved changes survive across
//! invocations until `save` commits them or `reset` discards them —
//! exactly how a browser editor survives a page reload.

mod transport;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use folio_core::sync::draft::DraftCache;
use folio_core::sync::events::{SyncEvent, SyncObserver};
use folio_core::sync::Synchronizer;
use tracing_subscriber::EnvFilter;

use crate::transport::HttpTransport;

/// Draft-cache key for the editable site configuration.
const DRAFT_KEY: &str = "site-config";

/// folio editor — edit the site configuration through the local daemon
#[derive(Parser, Debug)]
#[command(name = "folio-editor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the folio daemon
    #[arg(long, default_value = "http://127.0.0.1:7878")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the working copy (including unsaved edits)
    Show,
    /// Print one field of the working copy
    Get {
        /// Dot-separated field path, e.g. `theme.mode`
        path: String,
    },
    /// Edit one field of the working copy (kept as an unsaved draft)
    Set {
        /// Dot-separated field path, e.g. `theme.mode`
        path: String,
        /// New value, parsed as YAML (`dark`, `42`, `[a, b]`)
        value: String,
    },
    /// Show whether unsaved edits exist and which sections they touch
    Status,
    /// Commit unsaved edits to the daemon
    Save,
    /// Discard unsaved edits and the draft
    Reset,
}

/// Prints lifecycle transitions for the human at the terminal.
struct ConsoleObserver;

impl SyncObserver for ConsoleObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::DirtyChanged(true) => eprintln!("* unsaved changes"),
            SyncEvent::DirtyChanged(false) => eprintln!("* in sync with saved configuration"),
            SyncEvent::Saving => eprintln!("saving..."),
            SyncEvent::Saved => eprintln!("saved"),
            SyncEvent::SaveFailed { detail } => eprintln!("save failed: {detail}"),
            SyncEvent::LoadFailed { detail } => eprintln!("load failed: {detail}"),
            SyncEvent::Loaded { .. } | SyncEvent::Changed { .. } | SyncEvent::Reset => {},
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let mut sync = build_synchronizer(&args.server)?;

    // A failed load blocks everything: without a baseline there is no
    // meaningful working copy to edit.
    sync.load().context("cannot reach the folio daemon")?;

    match args.command {
        Command::Show => {
            let working = sync.working().context("no working copy")?;
            print!("{}", working.to_yaml_string()?);
        },
        Command::Get { path } => {
            let working = sync.working().context("no working copy")?;
            match working.get_path(&path) {
                Some(value) => print!("{}", serde_yaml::to_string(value)?),
                None => bail!("no value at '{path}'"),
            }
        },
        Command::Set { path, value } => {
            let value = parse_value(&value);
            sync.update(&path, value)?;
            eprintln!("set {path} (unsaved; run `save` to commit)");
        },
        Command::Status => {
            if sync.is_dirty() {
                println!("dirty (unsaved sections: {})", sync.dirty_sections().join(", "));
            } else {
                println!("clean");
            }
        },
        Command::Save => {
            sync.save()?;
        },
        Command::Reset => {
            sync.reset()?;
            eprintln!("working copy reset to saved configuration");
        },
    }
    Ok(())
}

fn build_synchronizer(server: &str) -> Result<Synchronizer> {
    let transport = HttpTransport::new(server)?;
    let drafts = DraftCache::new(folio_home()?.join("drafts"));
    let mut sync = Synchronizer::new(Box::new(transport), drafts, DRAFT_KEY);
    sync.subscribe(Box::new(ConsoleObserver));
    Ok(sync)
}

/// Resolves the editor's state directory: `$FOLIO_HOME`, falling back to
/// `~/.folio`.
fn folio_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("FOLIO_HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    let home = std::env::var("HOME").context("neither FOLIO_HOME nor HOME is set")?;
    Ok(PathBuf::from(home).join(".folio"))
}

/// Parses a command-line value as YAML so `42`, `true`, and `[a, b]` keep
/// their types; anything unparsable is taken as a plain string.
fn parse_value(input: &str) -> serde_yaml::Value {
    serde_yaml::from_str(input)
        .unwrap_or_else(|_| serde_yaml::Value::String(input.to_string()))
}
