//! Backup and restore of the whole database directory.

use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::{DartsError, Result};
use crate::fs;
use crate::migration::initialise_database;

/// Name of the directory a backup is written to inside the chosen destination.
pub const BACKUP_DIR_NAME: &str = "Databases";

/// Copy the open database into `<destination>/Databases` and return that path.
pub fn backup_database(db: &Database, destination: &Path) -> Result<PathBuf> {
    let target = destination.join(BACKUP_DIR_NAME);
    if target.exists() {
        return Err(DartsError::InvalidInput(format!(
            "{} already exists",
            target.display()
        )));
    }

    log::info!("Backing up {} to {}", db.directory().display(), target.display());
    db.copy_to(&target)?;
    Ok(target)
}

/// Check that `source` holds a database this build could open.
pub fn validate_restore_source(source: &Path, db: &Database) -> Result<()> {
    let candidate = Database::new(source, db.config().clone());
    if candidate.test_connection() {
        Ok(())
    } else {
        Err(DartsError::InvalidInput(format!(
            "{} does not contain a valid database",
            source.display()
        )))
    }
}

/// Replace the database with the one in `source`.
///
/// The source is copied next to the live directory first, so a failed copy
/// never touches the live files. The pool is then shut down, the copy swapped
/// in and the pool reopened; a restored backup from an older version is
/// upgraded on reopen.
pub fn restore_database(db: &Database, source: &Path) -> Result<()> {
    validate_restore_source(source, db)?;

    let copying = copying_directory(db.directory())?;
    if copying.exists() {
        std::fs::remove_dir_all(&copying)?;
    }
    fs::copy_dir_recursive(source, &copying).map_err(|e| {
        DartsError::Storage(format!("Restore failed - failed to copy the new database files: {}", e))
    })?;

    if !db.shutdown() {
        return Err(DartsError::Database(
            "Failed to shut down current database connection".to_string(),
        ));
    }

    if let Err(err) = fs::swap_in_directory(db.directory(), &copying) {
        db.initialise_connection_pool()?;
        return Err(DartsError::Storage(format!(
            "Restore failed - could not replace the database: {}",
            err
        )));
    }

    db.initialise_connection_pool()?;
    initialise_database(db)?;
    log::info!("Restored database from {}", source.display());
    Ok(())
}

fn copying_directory(live: &Path) -> Result<PathBuf> {
    let name = live
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DartsError::InvalidInput(format!("Invalid database path {}", live.display())))?;
    Ok(live.with_file_name(format!("{}_copying", name)))
}
