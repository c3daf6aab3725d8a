mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use darts_core::db::value::now;
use darts_core::db::DATABASE_FILE_NAME;
use darts_core::entity::game::{GameEntity, GameType};
use darts_core::entity::player::PlayerEntity;
use darts_core::entity::sync_audit::SyncAuditEntity;
use darts_core::sync::remote::{
    DirectoryRemoteStore, FetchDatabaseResult, RemoteDatabaseStore, RemoteStoreError,
};
use darts_core::{Database, DatabaseConfig, Entity, SyncFailure, SyncManager, SyncSummary};
use tempfile::{tempdir, TempDir};

use common::{count_rows, open_database};

const REMOTE_NAME: &str = "Goomba";

static FETCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct Fixture {
    dir: TempDir,
    local: Arc<Database>,
    store: Arc<DirectoryRemoteStore>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let local = Arc::new(open_database(&dir.path().join("Local"), "Darts"));
        let root = dir.path().join("Remote");
        std::fs::create_dir_all(&root).unwrap();
        let store = Arc::new(DirectoryRemoteStore::new(root));
        Self { dir, local, store }
    }

    /// Create the remote from a fresh database prepared by `seed`, with a
    /// marker file next to it so a swap can be detected.
    fn seed_remote(&self, seed: impl FnOnce(&Database)) {
        let remote = open_database(&self.dir.path().join("Seed"), "Darts");
        seed(&remote);
        std::fs::write(remote.directory().join("SomeFile.txt"), b"").unwrap();
        self.store.push_database(REMOTE_NAME, &remote, None).unwrap();
        remote.shutdown();
    }

    fn fetch_remote(&self) -> Database {
        let n = FETCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let staging = self.dir.path().join(format!("Fetched{}", n));
        let fetched = self.store.fetch_database(REMOTE_NAME, &staging).unwrap();
        fetched.database.initialise_connection_pool().unwrap();
        fetched.database
    }

    fn manager(&self) -> SyncManager {
        SyncManager::new(self.store.clone(), self.local.clone())
    }

    fn manager_with(&self, store: impl RemoteDatabaseStore + 'static) -> SyncManager {
        SyncManager::new(Arc::new(store), self.local.clone())
    }

    fn databases_swapped(&self) -> bool {
        self.local.directory().join("SomeFile.txt").exists()
    }

    fn remote_file(&self) -> PathBuf {
        self.store
            .root()
            .join(REMOTE_NAME)
            .join("Darts")
            .join(DATABASE_FILE_NAME)
    }

    /// Content hashes of the local and remote database files.
    fn file_hashes(&self) -> (blake3::Hash, blake3::Hash) {
        (file_hash(&self.local.file_path()), file_hash(&self.remote_file()))
    }
}

fn file_hash(path: &Path) -> blake3::Hash {
    blake3::hash(&std::fs::read(path).unwrap())
}

fn at(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 1, 1, 12, 0, 0).unwrap()
}

fn game_with_id(row_id: &str, params: &str) -> GameEntity {
    let mut game = GameEntity {
        game_type: GameType::X01,
        game_params: params.to_string(),
        ..GameEntity::default()
    };
    game.row.row_id = row_id.to_string();
    game
}

#[test]
fn test_two_sided_merge_pushes_and_pulls() {
    let fixture = Fixture::new();
    GameEntity::factory_and_save(&fixture.local, GameType::X01, "501").unwrap();
    fixture.seed_remote(|remote| {
        GameEntity::factory_and_save(remote, GameType::Golf, "18").unwrap();
    });

    let handle = fixture.manager().do_sync(REMOTE_NAME);
    let summary = handle.join().unwrap().expect("sync should succeed");

    assert_eq!(
        summary,
        SyncSummary {
            rows_pushed: 1,
            rows_pulled: 1
        }
    );
    assert_eq!(
        summary.to_string(),
        "Sync completed successfully!\n\nRows pushed: 1\nRows pulled: 1"
    );
    assert_eq!(count_rows(&fixture.fetch_remote(), "Game"), 2);
    assert_eq!(count_rows(&fixture.local, "Game"), 2);
    assert!(fixture.databases_swapped());
    assert!(SyncAuditEntity::last_sync_for(&fixture.local, REMOTE_NAME).is_some());
}

#[test]
fn test_later_remote_update_wins() {
    let fixture = Fixture::new();
    game_with_id("g1", "local").save_to_database_at(&fixture.local, at(2020));
    fixture.seed_remote(|remote| {
        game_with_id("g1", "remote").save_to_database_at(remote, at(2021));
    });

    let summary = fixture.manager().run_sync(REMOTE_NAME).expect("sync should succeed");

    assert_eq!(summary.rows_pushed, 0);
    assert_eq!(summary.rows_pulled, 1);
    let game = GameEntity::retrieve_for_id(&fixture.local, "g1").unwrap();
    assert_eq!(game.game_params, "remote");
    assert_eq!(game.row.dt_last_update, at(2021));
}

#[test]
fn test_later_local_update_wins() {
    let fixture = Fixture::new();
    game_with_id("g1", "local").save_to_database_at(&fixture.local, at(2022));
    fixture.seed_remote(|remote| {
        game_with_id("g1", "remote").save_to_database_at(remote, at(2021));
    });

    let summary = fixture.manager().run_sync(REMOTE_NAME).expect("sync should succeed");

    assert_eq!(summary.rows_pushed, 1);
    assert_eq!(summary.rows_pulled, 0);
    let remote = fixture.fetch_remote();
    let game = GameEntity::retrieve_for_id(&remote, "g1").unwrap();
    assert_eq!(game.game_params, "local");
}

#[test]
fn test_first_sync_creates_remote() {
    let fixture = Fixture::new();
    PlayerEntity::factory_and_save(&fixture.local, "Alice", "").unwrap();
    GameEntity::factory_and_save(&fixture.local, GameType::Dartzee, "").unwrap();

    let summary = fixture.manager().run_sync(REMOTE_NAME).expect("sync should succeed");

    assert_eq!(summary.rows_pushed, 2);
    assert_eq!(summary.rows_pulled, 0);
    assert!(fixture.store.database_exists(REMOTE_NAME).unwrap());
    let remote = fixture.fetch_remote();
    assert_eq!(count_rows(&remote, "Player"), 1);
    assert_eq!(count_rows(&remote, "SyncAudit"), 1);
    assert_eq!(count_rows(&fixture.local, "SyncAudit"), 1);
}

#[test]
fn test_deletions_propagate_instead_of_resurrecting() {
    let fixture = Fixture::new();
    let game = GameEntity::factory_and_save(&fixture.local, GameType::X01, "301").unwrap();
    fixture.manager().run_sync(REMOTE_NAME).expect("first sync should succeed");
    assert_eq!(count_rows(&fixture.fetch_remote(), "Game"), 1);

    let game = GameEntity::retrieve_for_id(&fixture.local, game.row_id()).unwrap();
    assert!(game.delete_with_audit(&fixture.local));

    fixture.manager().run_sync(REMOTE_NAME).expect("second sync should succeed");

    assert_eq!(count_rows(&fixture.fetch_remote(), "Game"), 0);
    assert_eq!(count_rows(&fixture.local, "Game"), 0);
    assert_eq!(count_rows(&fixture.local, "DeletionAudit"), 1);
}

#[test]
fn test_missing_data_discards_results() {
    let fixture = Fixture::new();
    game_with_id("old", "501").save_to_database_at(&fixture.local, at(2000));
    SyncAuditEntity::insert_sync_audit(&fixture.local, REMOTE_NAME).unwrap();
    fixture.seed_remote(|_| {});
    let before = fixture.file_hashes();

    let result = fixture.manager().run_sync(REMOTE_NAME);

    let failure = result.expect_err("sync should fail");
    assert!(matches!(failure, SyncFailure::DataLoss));
    assert_eq!(
        failure.to_string(),
        "Sync resulted in missing data. \n\nResults have been discarded."
    );
    assert!(!fixture.databases_swapped());
    assert_eq!(fixture.file_hashes(), before);
    assert_eq!(count_rows(&fixture.local, "Game"), 1);
    assert_eq!(count_rows(&fixture.fetch_remote(), "Game"), 0);
}

#[test]
fn test_sql_error_during_merge_changes_nothing() {
    let fixture = Fixture::new();
    PlayerEntity::factory_and_save(&fixture.local, "Alice", "").unwrap();
    fixture.seed_remote(|remote| {
        assert!(remote.drop_table("Player"));
    });
    let before = fixture.file_hashes();

    let failure = fixture.manager().run_sync(REMOTE_NAME).expect_err("sync should fail");

    assert!(matches!(failure, SyncFailure::Unexpected(_)));
    assert_eq!(
        failure.to_string(),
        "An unexpected error occurred - no data has been changed."
    );
    assert!(!fixture.databases_swapped());
    assert_eq!(fixture.file_hashes(), before);
    assert_eq!(count_rows(&fixture.local, "Player"), 1);
}

/// Another client pushes between this sync's fetch and its push.
struct InterferingStore {
    inner: DirectoryRemoteStore,
}

impl RemoteDatabaseStore for InterferingStore {
    fn database_exists(&self, remote_name: &str) -> Result<bool, RemoteStoreError> {
        self.inner.database_exists(remote_name)
    }

    fn fetch_database(
        &self,
        remote_name: &str,
        staging: &Path,
    ) -> Result<FetchDatabaseResult, RemoteStoreError> {
        let fetched = self.inner.fetch_database(remote_name, staging)?;
        self.inner
            .push_database(remote_name, &fetched.database, Some(fetched.last_modified))?;
        Ok(fetched)
    }

    fn push_database(
        &self,
        remote_name: &str,
        database: &Database,
        expected_last_modified: Option<DateTime<Utc>>,
    ) -> Result<(), RemoteStoreError> {
        self.inner
            .push_database(remote_name, database, expected_last_modified)
    }
}

#[test]
fn test_concurrent_remote_change_discards_results() {
    let fixture = Fixture::new();
    GameEntity::factory_and_save(&fixture.local, GameType::X01, "501").unwrap();
    fixture.seed_remote(|_| {});
    let before = fixture.file_hashes();

    let store = InterferingStore {
        inner: DirectoryRemoteStore::new(fixture.store.root()),
    };
    let failure = fixture
        .manager_with(store)
        .run_sync(REMOTE_NAME)
        .expect_err("sync should fail");

    assert!(matches!(failure, SyncFailure::ConcurrentModification));
    assert_eq!(
        failure.to_string(),
        "Another sync has been performed since this one started. \n\nResults have been discarded."
    );
    assert!(!fixture.databases_swapped());
    assert_eq!(fixture.file_hashes(), before);
    assert_eq!(count_rows(&fixture.fetch_remote(), "Game"), 0);
}

struct UnreachableStore;

impl RemoteDatabaseStore for UnreachableStore {
    fn database_exists(&self, _: &str) -> Result<bool, RemoteStoreError> {
        Err(RemoteStoreError::Network("Failed to connect.".to_string()))
    }

    fn fetch_database(&self, _: &str, _: &Path) -> Result<FetchDatabaseResult, RemoteStoreError> {
        Err(RemoteStoreError::Network("Failed to connect.".to_string()))
    }

    fn push_database(
        &self,
        _: &str,
        _: &Database,
        _: Option<DateTime<Utc>>,
    ) -> Result<(), RemoteStoreError> {
        Err(RemoteStoreError::Network("Failed to connect.".to_string()))
    }
}

#[test]
fn test_network_error_is_reported() {
    let fixture = Fixture::new();

    let failure = fixture
        .manager_with(UnreachableStore)
        .do_sync(REMOTE_NAME)
        .join()
        .unwrap()
        .expect_err("sync should fail");

    assert_eq!(
        failure.to_string(),
        "A connection error occurred. Check your internet connection and try again."
    );

    let unmounted = DirectoryRemoteStore::new(fixture.dir.path().join("Unmounted"));
    let failure = fixture
        .manager_with(unmounted)
        .run_sync(REMOTE_NAME)
        .expect_err("sync should fail");
    assert!(matches!(failure, SyncFailure::Network(_)));
}

/// Hands back a staged directory that does not hold a database.
struct GarbageStore;

impl RemoteDatabaseStore for GarbageStore {
    fn database_exists(&self, _: &str) -> Result<bool, RemoteStoreError> {
        Ok(true)
    }

    fn fetch_database(&self, _: &str, staging: &Path) -> Result<FetchDatabaseResult, RemoteStoreError> {
        std::fs::create_dir_all(staging)?;
        std::fs::write(staging.join("Darts.db"), b"this is not an sqlite database file")?;
        Ok(FetchDatabaseResult {
            database: Database::new(staging, DatabaseConfig::default()),
            last_modified: Utc::now(),
        })
    }

    fn push_database(
        &self,
        _: &str,
        _: &Database,
        _: Option<DateTime<Utc>>,
    ) -> Result<(), RemoteStoreError> {
        Ok(())
    }
}

#[test]
fn test_invalid_remote_is_rejected() {
    let fixture = Fixture::new();
    GameEntity::factory_and_save(&fixture.local, GameType::X01, "501").unwrap();

    let failure = fixture
        .manager_with(GarbageStore)
        .run_sync(REMOTE_NAME)
        .expect_err("sync should fail");

    assert!(matches!(failure, SyncFailure::InvalidRemote));
    assert_eq!(
        failure.to_string(),
        "An error occurred connecting to the remote database."
    );
    assert_eq!(count_rows(&fixture.local, "Game"), 1);
}

#[test]
fn test_staging_is_cleaned_up() {
    let fixture = Fixture::new();
    fixture.seed_remote(|_| {});

    fixture.manager().run_sync(REMOTE_NAME).expect("sync should succeed");
    fixture.manager_with(UnreachableStore).run_sync(REMOTE_NAME).unwrap_err();

    let staging_root = fixture.local.directory().parent().unwrap().join("SyncStaging");
    let leftovers = std::fs::read_dir(&staging_root).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[test]
fn test_rows_changed_since_last_sync_are_pushed_again() {
    let fixture = Fixture::new();
    fixture.seed_remote(|_| {});
    fixture.manager().run_sync(REMOTE_NAME).expect("first sync should succeed");

    let mut player = PlayerEntity::factory_and_save(&fixture.local, "Alice", "").unwrap();
    fixture.manager().run_sync(REMOTE_NAME).expect("second sync should succeed");

    player = PlayerEntity::retrieve_for_id(&fixture.local, player.row_id()).unwrap();
    player.name = "Alicia".to_string();
    assert!(player.save_to_database_at(&fixture.local, now() + Duration::seconds(1)));
    let summary = fixture.manager().run_sync(REMOTE_NAME).expect("third sync should succeed");

    assert_eq!(summary.rows_pushed, 1);
    let remote = fixture.fetch_remote();
    let remote_player = PlayerEntity::retrieve_for_id(&remote, player.row_id()).unwrap();
    assert_eq!(remote_player.name, "Alicia");
}

#[test]
fn test_remote_deletions_win_over_local_rows() {
    let fixture = Fixture::new();
    let untouched = GameEntity::factory_and_save(&fixture.local, GameType::X01, "501").unwrap();
    let edited = GameEntity::factory_and_save(&fixture.local, GameType::Golf, "9").unwrap();
    fixture.manager().run_sync(REMOTE_NAME).expect("first sync should succeed");

    // Another client deletes both games and pushes.
    let staging = fixture.dir.path().join("OtherClient");
    let other = fixture.store.fetch_database(REMOTE_NAME, &staging).unwrap();
    other.database.initialise_connection_pool().unwrap();
    for id in [untouched.row_id(), edited.row_id()] {
        let game = GameEntity::retrieve_for_id(&other.database, id).unwrap();
        assert!(game.delete_with_audit(&other.database));
    }
    fixture
        .store
        .push_database(REMOTE_NAME, &other.database, Some(other.last_modified))
        .unwrap();
    other.database.shutdown();

    let mut game = GameEntity::retrieve_for_id(&fixture.local, edited.row_id()).unwrap();
    game.game_params = "18".to_string();
    assert!(game.save_to_database_at(&fixture.local, now() + Duration::seconds(1)));

    let summary = fixture.manager().run_sync(REMOTE_NAME).expect("sync should succeed");

    assert_eq!(
        summary,
        SyncSummary {
            rows_pushed: 0,
            rows_pulled: 0
        }
    );
    assert_eq!(count_rows(&fixture.local, "Game"), 0);
    assert_eq!(count_rows(&fixture.local, "DeletionAudit"), 2);
    let remote = fixture.fetch_remote();
    assert_eq!(count_rows(&remote, "Game"), 0);
    assert_eq!(count_rows(&remote, "DeletionAudit"), 2);
}

/// Saves a player into the local database while the merged copy is being
/// pushed, as the app would if a game finished mid-sync.
struct LocalWriteDuringPush {
    inner: DirectoryRemoteStore,
    local: Arc<Database>,
    written: AtomicBool,
}

impl RemoteDatabaseStore for LocalWriteDuringPush {
    fn database_exists(&self, remote_name: &str) -> Result<bool, RemoteStoreError> {
        self.inner.database_exists(remote_name)
    }

    fn fetch_database(
        &self,
        remote_name: &str,
        staging: &Path,
    ) -> Result<FetchDatabaseResult, RemoteStoreError> {
        self.inner.fetch_database(remote_name, staging)
    }

    fn push_database(
        &self,
        remote_name: &str,
        database: &Database,
        expected_last_modified: Option<DateTime<Utc>>,
    ) -> Result<(), RemoteStoreError> {
        if !self.written.swap(true, Ordering::SeqCst) {
            PlayerEntity::factory_and_save(&self.local, "DuringSync", "").unwrap();
        }
        self.inner
            .push_database(remote_name, database, expected_last_modified)
    }
}

#[test]
fn test_local_change_during_sync_is_kept() {
    let fixture = Fixture::new();
    fixture.seed_remote(|remote| {
        GameEntity::factory_and_save(remote, GameType::Golf, "18").unwrap();
    });

    let store = LocalWriteDuringPush {
        inner: DirectoryRemoteStore::new(fixture.store.root()),
        local: fixture.local.clone(),
        written: AtomicBool::new(false),
    };
    let failure = fixture
        .manager_with(store)
        .run_sync(REMOTE_NAME)
        .expect_err("swap should be refused");

    assert!(matches!(failure, SyncFailure::LocalSwap(_)));
    assert!(!fixture.databases_swapped());
    assert!(fixture.local.is_open());
    let players = PlayerEntity::retrieve_entities(&fixture.local, "");
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].name, "DuringSync");

    let summary = fixture.manager().run_sync(REMOTE_NAME).expect("next sync should succeed");

    assert_eq!(
        summary,
        SyncSummary {
            rows_pushed: 1,
            rows_pulled: 1
        }
    );
    assert_eq!(count_rows(&fixture.local, "Player"), 1);
    assert_eq!(count_rows(&fixture.local, "Game"), 1);
    let remote = fixture.fetch_remote();
    assert_eq!(count_rows(&remote, "Player"), 1);
    assert_eq!(count_rows(&remote, "Game"), 1);
}
