//! Application context for the Darts CLI.
//!
//! Provides a unified context that combines CLI arguments with the
//! lazily-loaded config file and database handle.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use darts_core::db::DATABASE_FILE_NAME;
use darts_core::migration::initialise_database;
use darts_core::{Database, DatabaseConfig};

use crate::cli::Cli;
use crate::config::{default_database_directory, read_config, DartsConfig};

use super::resolver::{missing_database_message, resolve_config_path};

/// Application context that bundles CLI args with configuration and the
/// open database.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<Option<DartsConfig>>,
    database: OnceCell<Arc<Database>>,
}

impl<'a> AppContext<'a> {
    /// Create a new application context from CLI arguments.
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            database: OnceCell::new(),
        }
    }

    /// Get the CLI arguments.
    pub fn cli(&self) -> &Cli {
        self.cli
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// The config file, loaded on first use. `None` when there is no file.
    pub fn config(&self) -> anyhow::Result<Option<&DartsConfig>> {
        let config = self.config.get_or_try_init(|| {
            let path = resolve_config_path()?;
            if path.exists() {
                read_config(&path).map(Some)
            } else {
                Ok(None)
            }
        })?;
        Ok(config.as_ref())
    }

    /// `--database` (or `DARTS_DATABASE`), then the config file, then the
    /// default data directory.
    pub fn database_directory(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.cli.database.as_deref() {
            return Ok(PathBuf::from(path));
        }
        match self.config()? {
            Some(config) => Ok(PathBuf::from(&config.database.directory)),
            None => default_database_directory(),
        }
    }

    pub fn database_config(&self) -> anyhow::Result<DatabaseConfig> {
        Ok(self
            .config()?
            .map(DartsConfig::database_config)
            .unwrap_or_default())
    }

    /// Open the existing database and bring its schema up to date.
    pub fn database(&self) -> anyhow::Result<&Arc<Database>> {
        self.database.get_or_try_init(|| {
            let directory = self.database_directory()?;
            if !directory.join(DATABASE_FILE_NAME).exists() {
                return Err(anyhow::anyhow!(missing_database_message(&directory)));
            }
            let database = Database::open(directory, self.database_config()?)?;
            initialise_database(&database)?;
            Ok(Arc::new(database))
        })
    }
}
