use crate::db::value::{end_of_time, SqlValue};
use crate::db::Database;
use crate::entity::registry::all_schemas;
use crate::entity::{EntityName, TableSchema};

use super::{AutoFix, SanityCheck, SanityCheckResult};

fn query_ids(db: &Database, sql: &str, params: &[SqlValue]) -> Vec<String> {
    db.query_rows(sql, params, |row| row.get::<_, String>(0))
        .unwrap_or_default()
}

fn single_result(description: String, rows: Vec<String>, auto_fix: AutoFix) -> Vec<SanityCheckResult> {
    if rows.is_empty() {
        Vec::new()
    } else {
        vec![SanityCheckResult::new(description, rows, auto_fix)]
    }
}

/// Id columns that are empty when they must not be, or that point at a row
/// which does not exist.
pub struct UnsetOrHangingFields {
    schema: &'static dyn TableSchema,
}

impl UnsetOrHangingFields {
    pub fn new(schema: &'static dyn TableSchema) -> Self {
        Self { schema }
    }

    /// Columns such as `PlayerId` or `GameIdEarned`, paired with the table they reference.
    fn id_columns(&self) -> Vec<(&'static str, EntityName)> {
        self.schema
            .column_names()
            .into_iter()
            .filter_map(|column| {
                EntityName::ALL
                    .iter()
                    .find(|name| column.starts_with(&format!("{}Id", name.table_name())))
                    .map(|name| (column, *name))
            })
            .collect()
    }
}

impl SanityCheck for UnsetOrHangingFields {
    fn run_check(&self, db: &Database) -> Vec<SanityCheckResult> {
        let table = self.schema.table_name();
        let entity = self.schema.entity_name();
        let mut results = Vec::new();

        for (column, referenced) in self.id_columns() {
            if !self.schema.column_can_be_unset(column) {
                let sql = format!("SELECT RowId FROM {} WHERE {} = ''", table, column);
                results.extend(single_result(
                    format!("{} rows where {} is unset", table, column),
                    query_ids(db, &sql, &[]),
                    AutoFix::DeleteRows(entity),
                ));
            }

            let sql = format!(
                "SELECT t.RowId FROM {} t WHERE t.{} <> '' AND NOT EXISTS \
                 (SELECT 1 FROM {} r WHERE r.RowId = t.{})",
                table,
                column,
                referenced.table_name(),
                column
            );
            results.extend(single_result(
                format!(
                    "{} rows where {} points to a non-existent {}",
                    table,
                    column,
                    referenced.table_name()
                ),
                query_ids(db, &sql, &[]),
                AutoFix::DeleteRows(entity),
            ));
        }
        results
    }
}

/// Two or more darts recorded at the same position of the same round.
pub struct DuplicateDarts;

impl SanityCheck for DuplicateDarts {
    fn run_check(&self, db: &Database) -> Vec<SanityCheckResult> {
        let sql = "SELECT d.RowId FROM Dart d WHERE EXISTS (SELECT 1 FROM Dart d2 \
                   WHERE d2.ParticipantId = d.ParticipantId \
                   AND d2.RoundNumber = d.RoundNumber \
                   AND d2.Ordinal = d.Ordinal \
                   AND d2.RowId <> d.RowId)";
        single_result(
            "Duplicate darts".to_string(),
            query_ids(db, sql, &[]),
            AutoFix::None,
        )
    }
}

/// Columns left with a DEFAULT clause, usually by an interrupted column addition.
pub struct ColumnsThatAllowDefaults;

impl SanityCheck for ColumnsThatAllowDefaults {
    fn run_check(&self, db: &Database) -> Vec<SanityCheckResult> {
        let mut results = Vec::new();
        for table in db.table_names() {
            let columns = query_ids(
                db,
                "SELECT name FROM pragma_table_info(?) WHERE dflt_value IS NOT NULL",
                &[SqlValue::from(table.as_str())],
            );
            for column in columns {
                results.push(SanityCheckResult::new(
                    format!("{}.{} allows a default value", table, column),
                    vec![format!("{}.{}", table, column)],
                    AutoFix::DropColumnDefault {
                        table: table.clone(),
                        column,
                    },
                ));
            }
        }
        results
    }
}

/// Unfinished games in which every participant has finished.
pub struct UnfinishedGamesNoActiveParticipants;

impl SanityCheck for UnfinishedGamesNoActiveParticipants {
    fn run_check(&self, db: &Database) -> Vec<SanityCheckResult> {
        let sql = "SELECT g.RowId FROM Game g WHERE g.DtFinish = ? AND NOT EXISTS \
                   (SELECT 1 FROM Participant p WHERE p.GameId = g.RowId AND p.DtFinished = ?)";
        let eot = SqlValue::from(end_of_time());
        single_result(
            "Unfinished games without active participants".to_string(),
            query_ids(db, sql, &[eot.clone(), eot]),
            AutoFix::None,
        )
    }
}

pub struct FinishedParticipantsNoScore;

impl SanityCheck for FinishedParticipantsNoScore {
    fn run_check(&self, db: &Database) -> Vec<SanityCheckResult> {
        let sql = "SELECT RowId FROM Participant WHERE DtFinished <> ? AND FinalScore = -1";
        single_result(
            "Finished participants with no final score".to_string(),
            query_ids(db, sql, &[SqlValue::from(end_of_time())]),
            AutoFix::None,
        )
    }
}

/// Tables that no entity owns, such as scratch tables left by an interrupted operation.
pub struct UnexpectedTables;

impl SanityCheck for UnexpectedTables {
    fn run_check(&self, db: &Database) -> Vec<SanityCheckResult> {
        let mut expected: Vec<&str> = all_schemas().iter().map(|s| s.table_name()).collect();
        expected.push(EntityName::Version.table_name());

        let unexpected: Vec<String> = db
            .table_names()
            .into_iter()
            .filter(|table| !expected.iter().any(|e| e.eq_ignore_ascii_case(table)))
            .collect();
        single_result(
            "Unexpected tables".to_string(),
            unexpected,
            AutoFix::DropTables,
        )
    }
}
