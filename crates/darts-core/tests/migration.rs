mod common;

use std::collections::BTreeMap;

use darts_core::entity::achievement::AchievementEntity;
use darts_core::entity::dart::DartEntity;
use darts_core::entity::game::GameEntity;
use darts_core::entity::participant::ParticipantEntity;
use darts_core::entity::player::PlayerEntity;
use darts_core::migration::{
    initialise_database, Conversion, DatabaseMigrator, MigrationResult, DATABASE_VERSION,
};
use darts_core::{Database, DatabaseConfig, Entity};
use tempfile::tempdir;

fn open_raw(parent: &std::path::Path) -> Database {
    Database::open(parent.join("Darts"), DatabaseConfig::default()).expect("open should succeed")
}

fn succeed(_: &Database) -> bool {
    true
}

fn fail(_: &Database) -> bool {
    false
}

/// Schema as it was at version 1: no audit tables, no AchievementDetail.
fn create_version_one_schema(db: &Database) {
    PlayerEntity::create_table(db);
    GameEntity::create_table(db);
    ParticipantEntity::create_table(db);
    DartEntity::create_table(db);
    assert!(db.create_table_if_not_exists(
        "Achievement",
        "RowId VARCHAR(36) PRIMARY KEY, DtCreation TIMESTAMP NOT NULL, DtLastUpdate TIMESTAMP NOT NULL, \
         PlayerId VARCHAR(36) NOT NULL, AchievementRef INTEGER NOT NULL, GameIdEarned VARCHAR(36) NOT NULL, \
         AchievementCounter INTEGER NOT NULL"
    ));
    assert!(db.execute_update(
        "INSERT INTO Achievement VALUES ('a1', '2019-01-01T00:00:00.000Z', '2019-01-01T00:00:00.000Z', 'p1', 5, '', 3)",
        &[]
    ));
    assert!(db.update_database_version(1));
}

#[test]
fn test_fresh_database_is_initialised_at_current_version() {
    let dir = tempdir().unwrap();
    let db = open_raw(dir.path());
    assert_eq!(db.get_database_version(), None);

    initialise_database(&db).expect("initialise should succeed");

    assert_eq!(db.get_database_version(), Some(DATABASE_VERSION));
    for table in ["Player", "Game", "Participant", "Dart", "Achievement", "DeletionAudit", "SyncAudit", "Version"] {
        assert!(db.table_exists(table), "{} should exist", table);
    }
}

#[test]
fn test_upgrade_from_version_one() {
    let dir = tempdir().unwrap();
    let db = open_raw(dir.path());
    create_version_one_schema(&db);

    let result = DatabaseMigrator::default().migrate_to_latest(&db, "Test");

    assert_eq!(result, MigrationResult::Success);
    assert_eq!(db.get_database_version(), Some(DATABASE_VERSION));
    assert!(db.table_exists("DeletionAudit"));
    assert!(db.table_exists("SyncAudit"));

    let achievements = AchievementEntity::retrieve_entities(&db, "");
    assert_eq!(achievements.len(), 1);
    assert_eq!(achievements[0].achievement_detail, "");
    assert_eq!(achievements[0].achievement_counter, 3);
}

#[test]
fn test_too_old_database_is_rejected_untouched() {
    let dir = tempdir().unwrap();
    let db = open_raw(dir.path());
    PlayerEntity::create_table(&db);
    assert!(db.update_database_version(0));

    let result = DatabaseMigrator::default().migrate_to_latest(&db, "Test");
    assert_eq!(result, MigrationResult::TooOld);
    assert_eq!(db.get_database_version(), Some(0));
    assert!(!db.table_exists("SyncAudit"));

    assert!(initialise_database(&db).is_err());
}

#[test]
fn test_gap_in_conversions_is_too_old() {
    let dir = tempdir().unwrap();
    let db = open_raw(dir.path());
    assert!(db.update_database_version(1));

    let mut conversions: BTreeMap<i32, Vec<Conversion>> = BTreeMap::new();
    conversions.insert(1, vec![succeed as Conversion]);

    let result = DatabaseMigrator::new(conversions).migrate_to_latest(&db, "Test");
    assert_eq!(result, MigrationResult::TooOld);
    assert_eq!(db.get_database_version(), Some(1));
}

#[test]
fn test_newer_database_is_rejected() {
    let dir = tempdir().unwrap();
    let db = open_raw(dir.path());
    assert!(db.update_database_version(DATABASE_VERSION + 1));

    let result = DatabaseMigrator::default().migrate_to_latest(&db, "Test");
    assert_eq!(result, MigrationResult::TooNew);
    assert!(initialise_database(&db).is_err());
}

#[test]
fn test_failed_conversion_stops_at_that_version() {
    let dir = tempdir().unwrap();
    let db = open_raw(dir.path());
    assert!(db.update_database_version(1));

    let mut conversions: BTreeMap<i32, Vec<Conversion>> = BTreeMap::new();
    conversions.insert(1, vec![succeed as Conversion]);
    conversions.insert(2, vec![fail as Conversion]);

    let result = DatabaseMigrator::new(conversions).migrate_to_latest(&db, "Test");
    assert_eq!(result, MigrationResult::Failed { version: 2 });
    assert_eq!(db.get_database_version(), Some(2));
}
