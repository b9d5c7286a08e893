use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use memosync_core::DataType;

#[derive(Parser)]
#[command(name = "memosync")]
#[command(about = "Reconcile offline notes, calendar and settings across devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local cache database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the sync engine config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Account whose cache and sync metadata are used
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge a remote and a local snapshot file without touching the cache
    Merge {
        /// Data type of both snapshots
        data_type: DataType,
        /// Remote snapshot (JSON)
        #[arg(long, value_name = "PATH")]
        remote: PathBuf,
        /// Local snapshot (JSON)
        #[arg(long, value_name = "PATH")]
        local: PathBuf,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Emit conflicts and local-only decisions along with the merged data
        #[arg(long)]
        report: bool,
    },
    /// Record a snapshot as successfully written upstream
    Record {
        data_type: DataType,
        /// Snapshot that was written (JSON)
        file: PathBuf,
    },
    /// List cached entities that still need uploading
    Pending {
        /// Limit to one data type
        data_type: Option<DataType>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or replace the local cache
    Local {
        #[command(subcommand)]
        command: LocalCommands,
    },
    /// Reconcile the local cache with a directory-backed remote store
    Sync {
        /// Limit to one data type
        data_type: Option<DataType>,
        /// Root directory of the remote store
        #[arg(long, value_name = "DIR")]
        remote_dir: PathBuf,
        /// Skip uploading pending local changes after merging
        #[arg(long)]
        no_push: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entity or calendar day upstream and locally
    Delete {
        data_type: DataType,
        /// Entity id or date key
        id: String,
        /// Root directory of the remote store
        #[arg(long, value_name = "DIR")]
        remote_dir: PathBuf,
    },
    /// Decide per data type whether server or device data is fresher
    Status {
        /// Server last-update times: JSON object of data type to timestamp
        #[arg(long, value_name = "PATH")]
        server: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage per-data-type sync timestamps
    Metadata {
        #[command(subcommand)]
        command: MetadataCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum LocalCommands {
    /// Replace the cached data of a data type with a snapshot file
    Import {
        data_type: DataType,
        file: PathBuf,
    },
    /// Print the cached data of a data type
    Show { data_type: DataType },
}

#[derive(Subcommand)]
pub enum MetadataCommands {
    /// Print the last sync time of every data type
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the last sync time (all data types unless one is given)
    Touch {
        data_type: Option<DataType>,
        /// Unix milliseconds or RFC 3339 time (now when omitted)
        #[arg(long, value_name = "TIME")]
        at: Option<String>,
    },
    /// Remove every sync timestamp of the user, as on logout
    Clear,
}
