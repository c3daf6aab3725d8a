#![allow(dead_code)]

use std::path::Path;

use darts_core::migration::initialise_database;
use darts_core::{Database, DatabaseConfig};

/// Open a database directory under `parent` with the current schema.
pub fn open_database(parent: &Path, name: &str) -> Database {
    let db = Database::open(parent.join(name), DatabaseConfig::default())
        .expect("open should succeed");
    initialise_database(&db).expect("initialise should succeed");
    db
}

pub fn count_rows(db: &Database, table: &str) -> i64 {
    db.execute_query_aggregate(&format!("SELECT COUNT(*) FROM {}", table), &[])
        .expect("count should succeed")
}
