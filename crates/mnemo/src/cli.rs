//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Mnemo - conversational context memory
///
/// Buffers messages per session, compresses them into summaries, moves old
/// summaries into long-term memory and retrieves them by meaning.
#[derive(Parser, Debug)]
#[command(name = "mnemo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: $MNEMO_CONFIG or <data dir>/mnemo/config.toml)
    #[arg(long, global = true, env = "MNEMO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overrides the config
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Use the offline extractive summarizer instead of the configured model
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Session management (create, show, list, set)
    Session(SessionCommand),

    /// Record a message and run compression/consolidation if due
    Say {
        /// Session ID (created on first use)
        session_id: String,

        /// Message text
        text: String,

        /// Sender: user or assistant
        #[arg(short, long, default_value = "user")]
        role: String,
    },

    /// Summarize the session's recent messages
    Compress {
        session_id: String,

        /// Compress even below the thresholds
        #[arg(short, long)]
        force: bool,
    },

    /// Move old summaries into long-term memory
    Consolidate { session_id: String },

    /// Index summaries that are missing from the vector index
    Reindex { session_id: String },

    /// Retrieve summaries and long-term memories relevant to a query
    Recall {
        session_id: String,

        /// Free-text query
        query: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Configuration (show, init, path)
    Config(ConfigCommand),

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SessionCommand {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Create an empty session
    Create {
        /// Session ID (default: random UUID)
        session_id: Option<String>,
    },

    /// Show a session's state
    Show {
        session_id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List stored sessions
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Set intent, topic or preferences
    Set {
        session_id: String,

        #[arg(long)]
        intent: Option<String>,

        #[arg(long)]
        topic: Option<String>,

        /// Preference as key=value (value parsed as JSON when possible)
        #[arg(short, long = "pref", action = clap::ArgAction::Append)]
        prefs: Vec<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}
