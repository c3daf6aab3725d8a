use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use darts_core::VERSION;

/// Darts - scorer database maintenance and sync
#[derive(Parser)]
#[command(name = "darts")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the database directory (holds Darts.db)
    #[arg(short, long, global = true, env = "DARTS_DATABASE")]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Directory where the database will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Directory holding sync remotes
    #[arg(long, value_name = "DIR")]
    pub remote_directory: Option<String>,

    /// Default remote name for `darts sync`
    #[arg(long, value_name = "NAME")]
    pub remote_name: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `check` command
#[derive(Args)]
pub struct CheckArgs {
    /// Apply every available auto-fix without prompting
    #[arg(long)]
    pub fix: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `backup` command
#[derive(Args)]
pub struct BackupArgs {
    /// Destination directory; the backup is written to DEST/Databases
    #[arg(value_name = "DEST")]
    pub destination: String,
}

/// Arguments for the `restore` command
#[derive(Args)]
pub struct RestoreArgs {
    /// Directory holding the database to restore
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_input: bool,
}

/// Arguments for the `sync` command
#[derive(Args)]
pub struct SyncArgs {
    /// Remote to sync with (defaults to the configured remote)
    #[arg(value_name = "REMOTE")]
    pub remote: Option<String>,

    /// Directory holding sync remotes (overrides config)
    #[arg(long, value_name = "DIR", env = "DARTS_REMOTE_DIRECTORY")]
    pub remote_directory: Option<String>,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and write a config file
    Init(InitArgs),

    /// Run sanity checks against the database
    Check(CheckArgs),

    /// Run setup diagnostics
    Doctor,

    /// Back up the database directory
    Backup(BackupArgs),

    /// Replace the database with a backup
    Restore(RestoreArgs),

    /// Sync the database with a remote
    Sync(SyncArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
