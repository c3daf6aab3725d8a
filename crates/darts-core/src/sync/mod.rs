//! Two-way sync of the local database with a named remote.
//!
//! A sync fetches the remote into a staging directory, merges local changes
//! into that copy, checks nothing local was lost, pushes the result back
//! (failing if someone else pushed meanwhile) and finally swaps the merged
//! copy in as the local database. Until the swap the live local files are
//! never written, so every earlier failure leaves both sides as they were.

pub mod merge;
pub mod remote;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::db::Database;
use crate::entity::sync_audit::SyncAuditEntity;
use crate::fs;
use crate::migration::{DatabaseMigrator, MigrationResult};

use self::merge::{find_missing_rows, DatabaseMerger, RowSnapshot};
use self::remote::{RemoteDatabaseStore, RemoteStoreError};

/// Counts reported after a successful sync. Deletion audits are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub rows_pushed: usize,
    pub rows_pulled: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sync completed successfully!\n\nRows pushed: {}\nRows pulled: {}",
            self.rows_pushed, self.rows_pulled
        )
    }
}

/// Why a sync stopped. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("A connection error occurred. Check your internet connection and try again.")]
    Network(String),

    #[error("An error occurred connecting to the remote database.")]
    InvalidRemote,

    #[error("The remote database is at a version this build cannot sync with - no data has been changed.")]
    RemoteVersion(MigrationResult),

    #[error("An unexpected error occurred - no data has been changed.")]
    Unexpected(String),

    #[error("Sync resulted in missing data. \n\nResults have been discarded.")]
    DataLoss,

    #[error("Another sync has been performed since this one started. \n\nResults have been discarded.")]
    ConcurrentModification,

    /// The remote was updated but the merged copy could not replace the local
    /// database. It is left on disk at the given path.
    #[error("Sync data was pushed but the local database could not be replaced. The next sync will bring it up to date.")]
    LocalSwap(PathBuf),
}

impl From<RemoteStoreError> for SyncFailure {
    fn from(err: RemoteStoreError) -> Self {
        match err {
            RemoteStoreError::Network(message) => SyncFailure::Network(message),
            RemoteStoreError::ConcurrentModification(_) => SyncFailure::ConcurrentModification,
            other => SyncFailure::Unexpected(other.to_string()),
        }
    }
}

impl SyncFailure {
    fn log(&self) {
        match self {
            SyncFailure::Network(cause) => {
                log::warn!("Caught network error during sync: {}", cause)
            }
            SyncFailure::ConcurrentModification => {
                log::warn!("Remote was modified during sync, results discarded")
            }
            SyncFailure::Unexpected(cause) => log::error!("Sync failed: {}", cause),
            SyncFailure::RemoteVersion(result) => {
                log::error!("Remote database could not be migrated: {:?}", result)
            }
            SyncFailure::LocalSwap(path) => log::error!(
                "Failed to swap in merged database, left at {}",
                path.display()
            ),
            SyncFailure::InvalidRemote | SyncFailure::DataLoss => {
                log::error!("Sync failed: {}", self)
            }
        }
    }
}

pub type SyncOutcome = Result<SyncSummary, SyncFailure>;

/// Runs syncs of one local database against one store.
#[derive(Clone)]
pub struct SyncManager {
    store: Arc<dyn RemoteDatabaseStore>,
    local: Arc<Database>,
    staging_root: PathBuf,
}

impl SyncManager {
    /// Staging directories are created next to the local database directory,
    /// so the final swap is a rename on one filesystem.
    pub fn new(store: Arc<dyn RemoteDatabaseStore>, local: Arc<Database>) -> Self {
        let staging_root = local
            .directory()
            .parent()
            .map(|parent| parent.join("SyncStaging"))
            .unwrap_or_else(|| PathBuf::from("SyncStaging"));
        Self::with_staging_root(store, local, staging_root)
    }

    pub fn with_staging_root(
        store: Arc<dyn RemoteDatabaseStore>,
        local: Arc<Database>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            local,
            staging_root: staging_root.into(),
        }
    }

    /// Run a sync on a worker thread.
    pub fn do_sync(&self, remote_name: &str) -> JoinHandle<SyncOutcome> {
        let manager = self.clone();
        let remote_name = remote_name.to_string();
        thread::spawn(move || manager.run_sync(&remote_name))
    }

    /// Run a sync on the calling thread.
    pub fn run_sync(&self, remote_name: &str) -> SyncOutcome {
        log::info!("Starting sync with remote {}", remote_name);

        let staging = self.new_staging_directory()?;
        let outcome = self.sync_via(remote_name, &staging);

        let keep_staging = matches!(outcome, Err(SyncFailure::LocalSwap(_)));
        if !keep_staging && staging.exists() {
            if let Err(err) = std::fs::remove_dir_all(&staging) {
                log::warn!("Failed to remove staging directory {}: {}", staging.display(), err);
            }
        }

        match &outcome {
            Ok(summary) => log::info!(
                "Sync with {} complete: {} pushed, {} pulled",
                remote_name,
                summary.rows_pushed,
                summary.rows_pulled
            ),
            Err(failure) => failure.log(),
        }
        outcome
    }

    fn new_staging_directory(&self) -> Result<PathBuf, SyncFailure> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let staging = self.staging_root.join(format!("sync-{}", nanos));
        std::fs::create_dir_all(&staging)
            .map_err(|e| SyncFailure::Unexpected(format!("Failed to create staging directory: {}", e)))?;
        Ok(staging)
    }

    fn sync_via(&self, remote_name: &str, staging: &Path) -> SyncOutcome {
        if !self.store.database_exists(remote_name)? {
            return self.first_sync(remote_name, staging);
        }

        let fetched = self.store.fetch_database(remote_name, &staging.join("Darts"))?;
        let remote = fetched.database;
        if !remote.test_connection() {
            return Err(SyncFailure::InvalidRemote);
        }
        if let Err(err) = remote.initialise_connection_pool() {
            log::error!("Failed to open fetched remote: {}", err);
            return Err(SyncFailure::InvalidRemote);
        }

        let merged = RowSnapshot::take(&self.local)
            .map_err(|e| SyncFailure::Unexpected(e.to_string()))
            .and_then(|snapshot| {
                let summary = self.merge_into(&remote, remote_name, &snapshot)?;
                Ok((summary, snapshot))
            })
            .and_then(|(summary, snapshot)| {
                self.store
                    .push_database(remote_name, &remote, Some(fetched.last_modified))?;
                Ok((summary, snapshot))
            });

        match merged {
            Ok((summary, snapshot)) => {
                self.swap_in(&remote, &snapshot)?;
                Ok(summary)
            }
            Err(failure) => {
                remote.shutdown();
                Err(failure)
            }
        }
    }

    fn merge_into(
        &self,
        remote: &Database,
        remote_name: &str,
        snapshot: &RowSnapshot,
    ) -> SyncOutcome {
        match DatabaseMigrator::default().migrate_to_latest(remote, "Remote") {
            MigrationResult::Success => {}
            other => return Err(SyncFailure::RemoteVersion(other)),
        }

        let counts = DatabaseMerger::new(&self.local, remote, remote_name)
            .perform_merge(snapshot)
            .map_err(|e| SyncFailure::Unexpected(e.to_string()))?;

        let missing = find_missing_rows(snapshot, remote)
            .map_err(|e| SyncFailure::Unexpected(e.to_string()))?;
        if !missing.is_empty() {
            for (entity, ids) in &missing {
                log::error!(
                    "{} {} row(s) missing from resulting database after merge: {:?}",
                    ids.len(),
                    entity,
                    ids
                );
            }
            return Err(SyncFailure::DataLoss);
        }

        Ok(SyncSummary {
            rows_pushed: counts.rows_pushed,
            rows_pulled: counts.rows_pulled,
        })
    }

    /// The remote does not exist yet: it becomes a copy of the local database.
    fn first_sync(&self, remote_name: &str, staging: &Path) -> SyncOutcome {
        log::info!("Remote {} does not exist yet, creating it from the local database", remote_name);

        let copy = self
            .local
            .copy_to(&staging.join("Darts"))
            .and_then(|copy| copy.initialise_connection_pool().map(|_| copy))
            .map_err(|e| SyncFailure::Unexpected(e.to_string()))?;

        let prepared = RowSnapshot::take(&copy)
            .map_err(|e| SyncFailure::Unexpected(e.to_string()))
            .and_then(|snapshot| {
                SyncAuditEntity::insert_sync_audit(&copy, remote_name)
                    .map(|_| snapshot)
                    .ok_or_else(|| SyncFailure::Unexpected("Failed to insert sync audit".to_string()))
            })
            .and_then(|snapshot| {
                self.store.push_database(remote_name, &copy, None)?;
                Ok(snapshot)
            });

        match prepared {
            Ok(snapshot) => {
                self.swap_in(&copy, &snapshot)?;
                Ok(SyncSummary {
                    rows_pushed: snapshot.data_row_count(),
                    rows_pulled: 0,
                })
            }
            Err(failure) => {
                copy.shutdown();
                Err(failure)
            }
        }
    }

    /// Replace the local database with `merged`, unless local rows changed
    /// since `merged_from` was taken. Those changes are not in the merged copy,
    /// so the local database is kept and the next sync pushes them.
    fn swap_in(&self, merged: &Database, merged_from: &RowSnapshot) -> Result<(), SyncFailure> {
        merged.shutdown();
        self.local.shutdown();

        if !self.local_unchanged_since(merged_from) {
            if let Err(err) = self.local.initialise_connection_pool() {
                log::error!("Failed to reopen local database: {}", err);
            }
            return Err(SyncFailure::LocalSwap(merged.directory().to_path_buf()));
        }

        let swapped = fs::swap_in_directory(self.local.directory(), merged.directory());
        let reopened = self.local.initialise_connection_pool();

        match (swapped, reopened) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), _) => {
                log::error!(
                    "Failed to move merged database {} into place: {}",
                    merged.directory().display(),
                    err
                );
                Err(SyncFailure::LocalSwap(merged.directory().to_path_buf()))
            }
            (Ok(()), Err(err)) => {
                log::error!("Swapped in merged database but failed to reopen it: {}", err);
                Err(SyncFailure::LocalSwap(self.local.directory().to_path_buf()))
            }
        }
    }

    /// Re-read the closed local database through a handle of its own.
    fn local_unchanged_since(&self, snapshot: &RowSnapshot) -> bool {
        let check = Database::new(self.local.directory(), self.local.config().clone());
        let current = check
            .initialise_connection_pool()
            .and_then(|_| RowSnapshot::take(&check));
        check.shutdown();

        match current {
            Ok(current) if current == *snapshot => true,
            Ok(_) => {
                log::warn!("Local database changed during sync, keeping it in place");
                false
            }
            Err(err) => {
                log::error!("Failed to re-read local database before swap: {}", err);
                false
            }
        }
    }
}
