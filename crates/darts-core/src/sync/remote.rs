//! Where remote databases live.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::value::now;
use crate::db::{Database, DatabaseConfig};
use crate::error::DartsError;
use crate::fs;

#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// The store could not be reached at all.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote database {0} not found")]
    NotFound(String),

    /// The remote changed after it was fetched.
    #[error("Remote database {0} has been modified since it was fetched")]
    ConcurrentModification(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<DartsError> for RemoteStoreError {
    fn from(err: DartsError) -> Self {
        RemoteStoreError::Other(err.to_string())
    }
}

/// A fetched remote: an unopened handle on the staged copy, plus the remote's
/// modification time for the optimistic check on push.
#[derive(Debug)]
pub struct FetchDatabaseResult {
    pub database: Database,
    pub last_modified: DateTime<Utc>,
}

pub trait RemoteDatabaseStore: Send + Sync {
    fn database_exists(&self, remote_name: &str) -> Result<bool, RemoteStoreError>;

    /// Copy the remote into `staging` and return a handle on the copy.
    fn fetch_database(
        &self,
        remote_name: &str,
        staging: &Path,
    ) -> Result<FetchDatabaseResult, RemoteStoreError>;

    /// Replace the remote with `database`.
    ///
    /// `expected_last_modified` is the time seen at fetch, or `None` when the
    /// remote is expected not to exist. A mismatch fails with
    /// [`RemoteStoreError::ConcurrentModification`] and leaves the remote alone.
    fn push_database(
        &self,
        remote_name: &str,
        database: &Database,
        expected_last_modified: Option<DateTime<Utc>>,
    ) -> Result<(), RemoteStoreError>;
}

const METADATA_FILE_NAME: &str = "remote.json";
const DATABASE_DIR_NAME: &str = "Darts";
const LOCK_FILE_NAME: &str = "push.lock";

/// A lock file older than this was left behind by a push that never finished.
const STALE_LOCK_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoteMetadata {
    last_modified: DateTime<Utc>,
}

/// Remotes kept under a shared directory, e.g. a mounted network share:
///
/// ```text
/// <root>/<remote name>/remote.json
/// <root>/<remote name>/Darts/Darts.db
/// <root>/<remote name>/push.lock   (only while a push is running)
/// ```
///
/// The lock file is what serialises pushes, so it holds across processes and
/// machines sharing the directory.
pub struct DirectoryRemoteStore {
    root: PathBuf,
    config: DatabaseConfig,
}

/// Exclusive hold on `<remote>/push.lock`, released on drop.
struct PushLock {
    path: PathBuf,
}

impl PushLock {
    fn acquire(remote_dir: &Path, remote_name: &str) -> Result<Self, RemoteStoreError> {
        let path = remote_dir.join(LOCK_FILE_NAME);
        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                if !Self::is_stale(&path) {
                    log::warn!("Remote {} is locked by another push", remote_name);
                    return Err(RemoteStoreError::ConcurrentModification(
                        remote_name.to_string(),
                    ));
                }
                log::warn!("Removing stale push lock {}", path.display());
                let busy = |err: std::io::Error| match err.kind() {
                    ErrorKind::AlreadyExists | ErrorKind::NotFound => {
                        RemoteStoreError::ConcurrentModification(remote_name.to_string())
                    }
                    _ => RemoteStoreError::Io(err),
                };
                std::fs::remove_file(&path).map_err(busy)?;
                Self::create(&path).map_err(busy)
            }
            Err(err) => Err(RemoteStoreError::Io(err)),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let lock = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(lock)
    }

    fn is_stale(path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > STALE_LOCK_AGE)
    }
}

impl Drop for PushLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release push lock {}: {}", self.path.display(), e);
        }
    }
}

impl DirectoryRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, DatabaseConfig::default())
    }

    /// Fetched handles are created with `config`.
    pub fn with_config(root: impl Into<PathBuf>, config: DatabaseConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn remote_dir(&self, remote_name: &str) -> PathBuf {
        self.root.join(remote_name)
    }

    fn check_reachable(&self) -> Result<(), RemoteStoreError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(RemoteStoreError::Network(format!(
                "Remote root {} is not available",
                self.root.display()
            )))
        }
    }

    fn read_metadata(&self, remote_name: &str) -> Result<Option<RemoteMetadata>, RemoteStoreError> {
        let path = self.remote_dir(remote_name).join(METADATA_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let metadata = serde_json::from_str(&contents).map_err(|e| {
            RemoteStoreError::Other(format!("Invalid metadata in {}: {}", path.display(), e))
        })?;
        Ok(Some(metadata))
    }

    fn write_metadata(&self, remote_name: &str, metadata: &RemoteMetadata) -> Result<(), RemoteStoreError> {
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| RemoteStoreError::Other(e.to_string()))?;
        fs::write_atomic(&self.remote_dir(remote_name).join(METADATA_FILE_NAME), &json)?;
        Ok(())
    }
}

impl RemoteDatabaseStore for DirectoryRemoteStore {
    fn database_exists(&self, remote_name: &str) -> Result<bool, RemoteStoreError> {
        self.check_reachable()?;
        Ok(self.read_metadata(remote_name)?.is_some())
    }

    fn fetch_database(
        &self,
        remote_name: &str,
        staging: &Path,
    ) -> Result<FetchDatabaseResult, RemoteStoreError> {
        self.check_reachable()?;
        let metadata = self
            .read_metadata(remote_name)?
            .ok_or_else(|| RemoteStoreError::NotFound(remote_name.to_string()))?;

        let source = self.remote_dir(remote_name).join(DATABASE_DIR_NAME);
        let bytes = fs::copy_dir_recursive(&source, staging)?;
        log::debug!(
            "Fetched remote {} ({} bytes) into {}",
            remote_name,
            bytes,
            staging.display()
        );

        Ok(FetchDatabaseResult {
            database: Database::new(staging, self.config.clone()),
            last_modified: metadata.last_modified,
        })
    }

    fn push_database(
        &self,
        remote_name: &str,
        database: &Database,
        expected_last_modified: Option<DateTime<Utc>>,
    ) -> Result<(), RemoteStoreError> {
        self.check_reachable()?;
        let remote_dir = self.remote_dir(remote_name);
        std::fs::create_dir_all(&remote_dir)?;
        let _lock = PushLock::acquire(&remote_dir, remote_name)?;

        let current = self.read_metadata(remote_name)?.map(|m| m.last_modified);
        if current != expected_last_modified {
            log::warn!(
                "Remote {} last modified {:?}, expected {:?}",
                remote_name,
                current,
                expected_last_modified
            );
            return Err(RemoteStoreError::ConcurrentModification(remote_name.to_string()));
        }

        let live = remote_dir.join(DATABASE_DIR_NAME);
        let incoming = fs::temp_sibling(&live, "pushing")?;

        if database.is_open() {
            database.copy_to(&incoming)?;
        } else {
            fs::copy_dir_recursive(database.directory(), &incoming)?;
        }
        fs::swap_in_directory(&live, &incoming)?;

        // Strictly later than the time handed out by the previous fetch.
        let mut last_modified = now();
        if let Some(previous) = current {
            if last_modified <= previous {
                last_modified = previous + chrono::Duration::milliseconds(1);
            }
        }
        self.write_metadata(remote_name, &RemoteMetadata { last_modified })?;

        log::info!("Pushed database to remote {}", remote_name);
        Ok(())
    }
}
