//! Versioned schema upgrades.
//!
//! Conversions are keyed by the version they upgrade *from*. Upgrading from
//! version `v` runs every conversion registered for `v`, then records `v + 1`,
//! until [`DATABASE_VERSION`] is reached.

use std::collections::BTreeMap;

use crate::db::Database;
use crate::entity::achievement::AchievementEntity;
use crate::entity::deletion_audit::DeletionAuditEntity;
use crate::entity::registry::create_all_tables;
use crate::entity::sync_audit::SyncAuditEntity;
use crate::entity::Entity;
use crate::error::{DartsError, Result};

/// Schema version this build reads and writes.
pub const DATABASE_VERSION: i32 = 3;

/// One step of an upgrade. Returns false on failure.
pub type Conversion = fn(&Database) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationResult {
    Success,
    /// No conversion path exists from the database's version.
    TooOld,
    /// Written by a newer build.
    TooNew,
    /// A conversion from `version` failed; the database stays at `version`.
    Failed { version: i32 },
}

pub struct DatabaseMigrator {
    conversions: BTreeMap<i32, Vec<Conversion>>,
}

impl Default for DatabaseMigrator {
    fn default() -> Self {
        Self::new(default_conversions())
    }
}

impl DatabaseMigrator {
    pub fn new(conversions: BTreeMap<i32, Vec<Conversion>>) -> Self {
        Self { conversions }
    }

    /// Bring `db` up to [`DATABASE_VERSION`]. `label` names the database in
    /// log messages, e.g. "Your" or "Remote".
    pub fn migrate_to_latest(&self, db: &Database, label: &str) -> MigrationResult {
        let version = match db.get_database_version() {
            Some(version) => version,
            None => return initialise_fresh(db),
        };

        if version == DATABASE_VERSION {
            return MigrationResult::Success;
        }

        if version > DATABASE_VERSION {
            log::error!(
                "{} database is version {}, newer than the supported version {}. Please upgrade.",
                label,
                version,
                DATABASE_VERSION
            );
            return MigrationResult::TooNew;
        }

        if let Some(missing) = (version..DATABASE_VERSION).find(|v| !self.conversions.contains_key(v)) {
            log::error!(
                "{} database is too out-of-date to be upgraded (version {}, no conversion from {}). \
                 Please downgrade to an earlier version so that the data can be converted.",
                label,
                version,
                missing
            );
            return MigrationResult::TooOld;
        }

        for from in version..DATABASE_VERSION {
            log::info!("Upgrading {} database from version {} to {}", label, from, from + 1);

            let steps = self.conversions.get(&from).map(Vec::as_slice).unwrap_or_default();
            if !steps.iter().all(|conversion| conversion(db)) {
                log::error!("Conversion of {} database from version {} failed", label, from);
                return MigrationResult::Failed { version: from };
            }

            if !db.update_database_version(from + 1) {
                return MigrationResult::Failed { version: from };
            }
        }

        log::info!("{} database upgraded to version {}", label, DATABASE_VERSION);
        MigrationResult::Success
    }
}

fn initialise_fresh(db: &Database) -> MigrationResult {
    log::info!("Initialising empty database at {}", db.directory().display());
    create_all_tables(db);
    if db.update_database_version(DATABASE_VERSION) {
        MigrationResult::Success
    } else {
        MigrationResult::Failed { version: 0 }
    }
}

/// The conversions shipped with this build.
pub fn default_conversions() -> BTreeMap<i32, Vec<Conversion>> {
    let mut conversions: BTreeMap<i32, Vec<Conversion>> = BTreeMap::new();
    conversions.insert(1, vec![add_achievement_detail as Conversion]);
    conversions.insert(
        2,
        vec![create_deletion_audit as Conversion, create_sync_audit],
    );
    conversions
}

fn add_achievement_detail(db: &Database) -> bool {
    AchievementEntity::add_string_column(db, "AchievementDetail", 255)
}

fn create_deletion_audit(db: &Database) -> bool {
    DeletionAuditEntity::create_table(db)
}

fn create_sync_audit(db: &Database) -> bool {
    SyncAuditEntity::create_table(db)
}

/// Open-time migration of the main database. Anything but success is an
/// error the caller should treat as fatal.
pub fn initialise_database(db: &Database) -> Result<()> {
    match DatabaseMigrator::default().migrate_to_latest(db, "Your") {
        MigrationResult::Success => Ok(()),
        MigrationResult::TooOld => Err(DartsError::Migration(
            "Database is too old to be upgraded by this version".to_string(),
        )),
        MigrationResult::TooNew => Err(DartsError::Migration(format!(
            "Database was written by a newer version (supported version is {})",
            DATABASE_VERSION
        ))),
        MigrationResult::Failed { version } => Err(DartsError::Migration(format!(
            "Upgrade from version {} failed, see the log for details",
            version
        ))),
    }
}
