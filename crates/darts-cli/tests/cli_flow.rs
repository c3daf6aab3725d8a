use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use darts_core::entity::participant::ParticipantEntity;
use darts_core::entity::player::PlayerEntity;
use darts_core::migration::initialise_database;
use darts_core::{Database, DatabaseConfig, Entity};
use tempfile::{tempdir, TempDir};

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_darts"))
}

/// A scratch home with its own XDG config and data directories.
struct Home {
    dir: TempDir,
}

impl Home {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("config")).expect("create config dir");
        std::fs::create_dir_all(dir.path().join("data")).expect("create data dir");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config_file(&self) -> PathBuf {
        self.path().join("config").join("darts").join("config.toml")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(bin());
        cmd.env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env("HOME", self.path())
            .env("NO_COLOR", "1")
            .env_remove("DARTS_CONFIG")
            .env_remove("DARTS_DATABASE")
            .env_remove("DARTS_REMOTE_DIRECTORY")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run darts")
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed: stdout={}, stderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn open_database(directory: &Path) -> Database {
    let db = Database::open(directory, DatabaseConfig::default()).expect("open database");
    initialise_database(&db).expect("initialise database");
    db
}

fn player_names(directory: &Path) -> Vec<String> {
    let db = open_database(directory);
    let mut names: Vec<String> = PlayerEntity::retrieve_entities(&db, "")
        .into_iter()
        .map(|player| player.name)
        .collect();
    db.shutdown();
    names.sort();
    names
}

fn seed_player(directory: &Path, name: &str) {
    let db = open_database(directory);
    PlayerEntity::factory_and_save(&db, name, "").expect("save player");
    db.shutdown();
}

#[test]
fn test_cli_init_writes_config_and_database() {
    let home = Home::new();
    let database = home.path().join("Databases").join("Darts");

    let output = home.run(&[
        "init",
        database.to_str().unwrap(),
        "--remote-directory",
        "/mnt/share",
        "--remote-name",
        "Pub",
    ]);
    assert_success(&output);
    assert!(stdout(&output).contains("Initialized darts database"));

    assert!(database.join("Darts.db").exists());
    let config = std::fs::read_to_string(home.config_file()).expect("read config");
    assert!(config.contains(&database.display().to_string()));
    assert!(config.contains("remote_name = \"Pub\""));
}

#[test]
fn test_cli_init_refuses_to_overwrite_config() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));

    let again = home.run(&["init", database.to_str().unwrap()]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("Config already exists"));

    assert_success(&home.run(&["init", database.to_str().unwrap(), "--force"]));
}

#[test]
fn test_cli_init_quiet_suppresses_output() {
    let home = Home::new();
    let database = home.path().join("Darts");
    let output = home.run(&["init", database.to_str().unwrap(), "--quiet"]);
    assert_success(&output);
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_cli_missing_database_message() {
    let home = Home::new();
    let missing = home.path().join("Nowhere");
    let output = home.run(&["check", "--database", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("No database found at"));
    assert!(err.contains("darts init"));
    assert!(!missing.join("Darts.db").exists());
}

#[test]
fn test_cli_check_clean_database() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));

    let output = home.run(&["check"]);
    assert_success(&output);
    assert!(stdout(&output).contains("Sanity check: OK"));
}

#[test]
fn test_cli_check_json_then_fix() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));

    let db = open_database(&database);
    let player = PlayerEntity::factory_and_save(&db, "Alice", "").expect("save player");
    ParticipantEntity::factory_and_save(&db, "no-such-game", player.row_id(), 0)
        .expect("save participant");
    db.shutdown();

    let report = home.run(&["check", "--json"]);
    assert!(!report.status.success());
    let results: serde_json::Value =
        serde_json::from_slice(&report.stdout).expect("check --json should print JSON");
    let hanging = results
        .as_array()
        .expect("array of results")
        .iter()
        .find(|r| r["description"] == "Participant rows where GameId points to a non-existent Game")
        .expect("hanging participant reported");
    assert_eq!(hanging["count"], 1);
    assert_eq!(hanging["auto_fix"], true);

    let fix = home.run(&["check", "--fix"]);
    assert_success(&fix);
    assert!(stdout(&fix).contains("Fixed: Participant rows where GameId"));

    assert_success(&home.run(&["check"]));
}

#[test]
fn test_cli_check_refuses_database_too_old_to_upgrade() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));

    let db = open_database(&database);
    assert!(db.update_database_version(0));
    db.shutdown();

    let output = home.run(&["check"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Database is too old to be upgraded by this version"));
    assert!(!stdout(&output).contains("Sanity check"));

    let db = Database::open(&database, DatabaseConfig::default()).expect("open database");
    assert_eq!(db.get_database_version(), Some(0));
    db.shutdown();
}

#[test]
fn test_cli_doctor_reports_schema_and_sync() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&[
        "init",
        database.to_str().unwrap(),
        "--remote-name",
        "Pub",
    ]));

    let output = home.run(&["doctor"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("Doctor: OK"));
    assert!(out.contains("- schema version: 3"));
    assert!(out.contains("- sanity check: OK"));
    assert!(out.contains("- last sync with Pub: never"));
}

#[test]
fn test_cli_doctor_without_config() {
    let home = Home::new();
    let output = home.run(&["doctor"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No config found at"));
}

#[test]
fn test_cli_backup_then_restore() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));
    seed_player(&database, "Alice");

    let destination = home.path().join("Backups");
    let backup = home.run(&["backup", destination.to_str().unwrap()]);
    assert_success(&backup);
    let backup_dir = destination.join("Databases");
    assert!(backup_dir.join("Darts.db").exists());

    seed_player(&database, "Bob");
    assert_eq!(player_names(&database), vec!["Alice", "Bob"]);

    let restore = home.run(&["restore", backup_dir.to_str().unwrap(), "--no-input"]);
    assert_success(&restore);
    assert!(stdout(&restore).contains("Restored database from"));
    assert_eq!(player_names(&database), vec!["Alice"]);
}

#[test]
fn test_cli_backup_refuses_existing_destination() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));

    let destination = home.path().join("Backups");
    std::fs::create_dir_all(destination.join("Databases")).expect("create existing backup");
    let output = home.run(&["backup", destination.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("already exists"));
}

#[test]
fn test_cli_restore_requires_confirmation_without_tty() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));
    seed_player(&database, "Alice");

    let other = home.path().join("Other");
    seed_player(&other, "Zed");

    let output = home.run(&["restore", other.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--no-input"));
    assert_eq!(player_names(&database), vec!["Alice"]);
}

#[test]
fn test_cli_restore_rejects_invalid_source() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));

    let empty = home.path().join("Empty");
    std::fs::create_dir_all(&empty).expect("create empty dir");
    let output = home.run(&["restore", empty.to_str().unwrap(), "--no-input"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("does not contain a valid database"));
}

#[test]
fn test_cli_sync_two_databases() {
    let home = Home::new();
    let remotes = home.path().join("Remotes");
    std::fs::create_dir_all(&remotes).expect("create remotes dir");

    let first = home.path().join("First").join("Darts");
    let second = home.path().join("Second").join("Darts");
    seed_player(&first, "Alice");
    seed_player(&second, "Bob");

    let sync = |database: &Path| {
        home.run(&[
            "sync",
            "Pub",
            "--database",
            database.to_str().unwrap(),
            "--remote-directory",
            remotes.to_str().unwrap(),
        ])
    };

    let created = sync(&first);
    assert_success(&created);
    let out = stdout(&created);
    assert!(out.contains("Sync completed successfully!"));
    assert!(out.contains("rows_pushed=1"));
    assert!(out.contains("rows_pulled=0"));
    assert!(remotes.join("Pub").join("Darts").join("Darts.db").exists());

    let merged = sync(&second);
    assert_success(&merged);
    let out = stdout(&merged);
    assert!(out.contains("rows_pushed=1"));
    assert!(out.contains("rows_pulled=1"));
    assert_eq!(player_names(&second), vec!["Alice", "Bob"]);
}

#[test]
fn test_cli_sync_without_remote_directory() {
    let home = Home::new();
    let database = home.path().join("Darts");
    assert_success(&home.run(&["init", database.to_str().unwrap()]));

    let output = home.run(&["sync", "Pub"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No sync directory configured"));
}

#[test]
fn test_cli_completions() {
    let home = Home::new();
    let output = home.run(&["completions", "bash"]);
    assert_success(&output);
    assert!(stdout(&output).contains("darts"));
}

#[test]
fn test_cli_no_command_prints_version() {
    let home = Home::new();
    let output = home.run(&[]);
    assert_success(&output);
    assert!(stdout(&output).contains(&format!("Darts v{}", darts_core::VERSION)));
}
