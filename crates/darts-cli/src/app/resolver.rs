//! Path resolution for the config file, database directory and sync remote.

use std::path::{Path, PathBuf};

use crate::config::default_config_path;

/// Resolve the config file path, checking DARTS_CONFIG env var first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("DARTS_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Error message when no database exists in the resolved directory.
pub fn missing_database_message(directory: &Path) -> String {
    format!(
        "No database found at {}\n\nRun:\n  darts init\n\nOr specify a database directory:\n  DARTS_DATABASE=/path/to/Darts darts init",
        directory.display()
    )
}

/// Error message when the config file is missing.
pub fn missing_config_message(config_path: &Path) -> String {
    format!(
        "No config found at {}\n\nRun:\n  darts init\n\nOr specify a database directory:\n  DARTS_DATABASE=/path/to/Darts darts init",
        config_path.display()
    )
}

/// Error message when `sync` has nowhere to sync to.
pub fn missing_remote_message(what: &str) -> String {
    format!(
        "No sync {} configured\n\nPass it on the command line:\n  darts sync <REMOTE> --remote-directory /path/to/remotes\n\nOr set it in the [sync] section of the config file.",
        what
    )
}
