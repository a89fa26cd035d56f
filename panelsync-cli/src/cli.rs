//! Command-line surface.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "panelsync",
    version,
    about = "Manage device accounts and playlists across IPTV panels"
)]
pub struct Args {
    /// Path to the configuration file (defaults to the platform config dir).
    #[arg(long, global = true, env = "PANELSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// More verbose logging (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List managed accounts.
    Accounts {
        /// Restrict to one group.
        #[arg(long)]
        group: Option<String>,
    },

    /// Playlist operations against a single account.
    #[command(subcommand)]
    Playlists(PlaylistCommand),

    /// Session cache operations.
    #[command(subcommand)]
    Session(SessionCommand),

    /// Warm up (or refresh) a session by logging in now.
    Login {
        /// Account id.
        #[arg(long)]
        account: String,
    },

    /// Bulk playlist-domain migration across a group of accounts.
    Migrate(MigrateArgs),
}

#[derive(Debug, Subcommand)]
pub enum PlaylistCommand {
    /// List an account's playlist entries.
    List {
        #[arg(long)]
        account: String,
    },
    /// Add a playlist entry.
    Add {
        #[arg(long)]
        account: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Content-type tag.
        #[arg(long, default_value = "general")]
        kind: String,
        #[arg(long)]
        protected: bool,
        #[arg(long, default_value = "")]
        pin: String,
    },
    /// Edit an existing entry; omitted fields keep their current value.
    Edit {
        #[arg(long)]
        account: String,
        /// Backend-native entry id.
        #[arg(long)]
        entry: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        protected: Option<bool>,
        #[arg(long)]
        pin: Option<String>,
    },
    /// Delete an entry.
    Delete {
        #[arg(long)]
        account: String,
        #[arg(long)]
        entry: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Show the cached session for an account.
    Show {
        #[arg(long)]
        account: String,
    },
    /// Drop the cached session (required after credential changes).
    Invalidate {
        #[arg(long)]
        account: String,
    },
    /// Delete every expired session now.
    Sweep,
    /// Run the periodic sweeper until interrupted.
    Sweeper {
        /// Sweep period in hours.
        #[arg(long, default_value_t = 6)]
        period_hours: u64,
    },
}

#[derive(Debug, ClapArgs)]
pub struct MigrateArgs {
    /// Target account group.
    #[arg(long, conflicts_with = "accounts")]
    pub group: Option<String>,

    /// Explicit comma-separated account ids instead of a group.
    #[arg(long, value_delimiter = ',')]
    pub accounts: Vec<String>,

    /// Which entries to rewrite.
    #[arg(long, value_enum, default_value = "all")]
    pub mode: MigrateModeArg,

    /// Old domain to match (required for --mode match).
    #[arg(long)]
    pub old_domain: Option<String>,

    /// New domain to rewrite entry hosts to.
    #[arg(long)]
    pub new_domain: String,

    /// Execute without the preview gate.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MigrateModeArg {
    /// Rewrite every entry.
    All,
    /// Rewrite only the first entry of each account.
    First,
    /// Rewrite entries whose URL host contains --old-domain.
    Match,
}
