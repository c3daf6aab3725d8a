//! Read-only consistency checks over the main database.
//!
//! Each check reports zero or more [`SanityCheckResult`]s. Nothing is changed
//! until the caller asks a result to apply its [`AutoFix`].

mod checks;

use crate::db::value::SqlValue;
use crate::db::Database;
use crate::entity::deletion_audit::DeletionAuditEntity;
use crate::entity::registry::all_schemas;
use crate::entity::EntityName;

pub use self::checks::{
    ColumnsThatAllowDefaults, DuplicateDarts, FinishedParticipantsNoScore,
    UnexpectedTables, UnfinishedGamesNoActiveParticipants, UnsetOrHangingFields,
};

const DELETE_BATCH_SIZE: usize = 50;

pub trait SanityCheck {
    fn run_check(&self, db: &Database) -> Vec<SanityCheckResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoFix {
    None,
    /// Delete the listed rows from the entity's table, auditing each deletion.
    DeleteRows(EntityName),
    DropColumnDefault { table: String, column: String },
    /// Drop every table named in the result.
    DropTables,
}

#[derive(Debug, Clone)]
pub struct SanityCheckResult {
    pub description: String,
    /// Row ids, or table names for table-level results.
    pub rows: Vec<String>,
    pub auto_fix: AutoFix,
}

impl SanityCheckResult {
    pub fn new(description: impl Into<String>, rows: Vec<String>, auto_fix: AutoFix) -> Self {
        Self {
            description: description.into(),
            rows,
            auto_fix,
        }
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn can_auto_fix(&self) -> bool {
        self.auto_fix != AutoFix::None
    }

    /// Apply the fix. Returns false if there is none or any statement failed.
    pub fn apply_auto_fix(&self, db: &Database) -> bool {
        match &self.auto_fix {
            AutoFix::None => {
                log::warn!("No auto-fix available for: {}", self.description);
                false
            }
            AutoFix::DeleteRows(entity) => delete_rows_with_audit(db, *entity, &self.rows),
            AutoFix::DropColumnDefault { table, column } => db.drop_column_default(table, column),
            AutoFix::DropTables => self
                .rows
                .iter()
                .fold(true, |ok, table| db.drop_table(table) && ok),
        }
    }
}

fn delete_rows_with_audit(db: &Database, entity: EntityName, row_ids: &[String]) -> bool {
    let table = entity.table_name();
    for batch in row_ids.chunks(DELETE_BATCH_SIZE) {
        let placeholders = vec!["?"; batch.len()].join(", ");
        let sql = format!("DELETE FROM {} WHERE RowId IN ({})", table, placeholders);
        let params: Vec<SqlValue> = batch.iter().map(|id| SqlValue::from(id.as_str())).collect();
        if !db.execute_update(&sql, &params) {
            return false;
        }

        for row_id in batch {
            if DeletionAuditEntity::factory_and_save(db, entity, row_id).is_none() {
                return false;
            }
        }
    }

    log::info!("Deleted {} rows from {}", row_ids.len(), table);
    true
}

/// Every check, with the per-table checks for each entity and the unexpected
/// tables check last.
pub fn all_sanity_checks() -> Vec<Box<dyn SanityCheck>> {
    let mut checks: Vec<Box<dyn SanityCheck>> = vec![
        Box::new(FinishedParticipantsNoScore),
        Box::new(DuplicateDarts),
        Box::new(ColumnsThatAllowDefaults),
        Box::new(UnfinishedGamesNoActiveParticipants),
    ];
    for schema in all_schemas() {
        checks.push(Box::new(UnsetOrHangingFields::new(schema)));
    }
    checks.push(Box::new(UnexpectedTables));
    checks
}

pub fn run_sanity_check(db: &Database) -> Vec<SanityCheckResult> {
    log::info!("Running sanity check on {}", db.directory().display());
    let results: Vec<SanityCheckResult> = all_sanity_checks()
        .iter()
        .flat_map(|check| check.run_check(db))
        .filter(|result| result.count() > 0)
        .collect();
    log::info!("Sanity check found {} issue(s)", results.len());
    results
}
