//! Merging a local database into a fetched remote copy.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::db::value::{format_timestamp, SqlValue};
use crate::db::Database;
use crate::entity::registry::sync_schemas;
use crate::entity::sync_audit::SyncAuditEntity;
use crate::entity::{EntityName, TableSchema};
use crate::error::{DartsError, Result};

/// `RowId -> DtLastUpdate` for every synced table, as text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RowSnapshot {
    tables: HashMap<EntityName, HashMap<String, String>>,
}

impl RowSnapshot {
    pub fn take(db: &Database) -> Result<Self> {
        let mut tables = HashMap::new();
        for schema in sync_schemas() {
            tables.insert(schema.entity_name(), row_versions(db, schema.table_name())?);
        }
        Ok(Self { tables })
    }

    pub fn ids(&self, entity: EntityName) -> impl Iterator<Item = &String> {
        self.tables.get(&entity).into_iter().flat_map(|rows| rows.keys())
    }

    fn version_of(&self, entity: EntityName, row_id: &str) -> Option<&String> {
        self.tables.get(&entity).and_then(|rows| rows.get(row_id))
    }

    /// Rows across all tables except the deletion audit.
    pub fn data_row_count(&self) -> usize {
        self.tables
            .iter()
            .filter(|(entity, _)| **entity != EntityName::DeletionAudit)
            .map(|(_, rows)| rows.len())
            .sum()
    }
}

fn row_versions(db: &Database, table: &str) -> Result<HashMap<String, String>> {
    let rows = db.query_rows(
        &format!("SELECT RowId, DtLastUpdate FROM {}", table),
        &[],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;
    Ok(rows.into_iter().collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub rows_pushed: usize,
    pub rows_pulled: usize,
}

/// Merges `local` into `remote`, where `remote` is a staged copy that may be
/// modified freely.
pub struct DatabaseMerger<'a> {
    local: &'a Database,
    remote: &'a Database,
    remote_name: &'a str,
}

impl<'a> DatabaseMerger<'a> {
    pub fn new(local: &'a Database, remote: &'a Database, remote_name: &'a str) -> Self {
        Self {
            local,
            remote,
            remote_name,
        }
    }

    /// Copy local changes across, apply every deletion audit, and stamp the
    /// result with a sync audit. Stops at the first failing statement.
    pub fn perform_merge(&self, local_snapshot: &RowSnapshot) -> Result<MergeCounts> {
        let last_sync = self.last_local_sync();
        match last_sync {
            Some(at) => log::info!(
                "Merging rows changed since last sync with {} at {}",
                self.remote_name,
                format_timestamp(&at)
            ),
            None => log::info!("First merge with {}, copying all rows", self.remote_name),
        }

        let mut copied = HashMap::new();
        for schema in sync_schemas() {
            let ids = self.copy_changed_rows(schema, last_sync)?;
            if schema.entity_name() != EntityName::DeletionAudit {
                copied.insert(schema.entity_name(), ids);
            }
        }

        self.apply_deletions()?;

        if SyncAuditEntity::insert_sync_audit(self.remote, self.remote_name).is_none() {
            return Err(DartsError::Database("Failed to insert sync audit".to_string()));
        }

        let (rows_pushed, rows_pulled) = self.count_rows(local_snapshot, &copied)?;
        Ok(MergeCounts {
            rows_pushed,
            rows_pulled,
        })
    }

    fn last_local_sync(&self) -> Option<DateTime<Utc>> {
        SyncAuditEntity::last_sync_for(self.local, self.remote_name)
    }

    fn copy_changed_rows(
        &self,
        schema: &dyn TableSchema,
        since: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>> {
        let table = schema.table_name();
        let columns = schema.column_defs();
        let mut select = format!("SELECT {} FROM {}", schema.select_list(""), table);
        let mut params = Vec::new();
        if let Some(since) = since {
            select.push_str(" WHERE DtLastUpdate >= ?");
            params.push(SqlValue::from(since));
        }

        let local_rows = self.local.query_rows(&select, &params, |row| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let raw: rusqlite::types::Value = row.get(index)?;
                    let data_type = raw.data_type();
                    SqlValue::from_column(column.column_type, raw).map_err(|err| {
                        rusqlite::Error::FromSqlConversionFailure(index, data_type, Box::new(err))
                    })
                })
                .collect::<rusqlite::Result<Vec<SqlValue>>>()
        })?;

        let remote_versions = row_versions(self.remote, table)?;
        let insert = format!("INSERT OR REPLACE{}", &schema.insert_sql()["INSERT".len()..]);

        let mut copied = HashSet::new();
        for values in local_rows {
            let (row_id, last_update) = match (&values[0], &values[2]) {
                (SqlValue::Text(id), SqlValue::Timestamp(dt)) => (id.clone(), format_timestamp(dt)),
                _ => {
                    return Err(DartsError::Type(format!(
                        "Unreadable RowId or DtLastUpdate in {}",
                        table
                    )))
                }
            };

            let newer = match remote_versions.get(&row_id) {
                None => true,
                Some(remote_update) => last_update > *remote_update,
            };
            if newer {
                self.remote.try_execute_update(&insert, &values)?;
                copied.insert(row_id);
            }
        }

        log::debug!("Copied {} row(s) into remote {}", copied.len(), table);
        Ok(copied)
    }

    fn apply_deletions(&self) -> Result<()> {
        for (entity, row_id) in deleted_rows(self.remote)? {
            if !entity.is_synced() || entity == EntityName::DeletionAudit {
                continue;
            }
            self.remote.try_execute_update(
                &format!("DELETE FROM {} WHERE RowId = ?", entity.table_name()),
                &[SqlValue::from(row_id)],
            )?;
        }
        Ok(())
    }

    /// `(pushed, pulled)` over the rows left in the merged result. A copied
    /// row counts as pushed only if no deletion audit removed it afterwards.
    /// Any other row that is absent from the local snapshot or newer than it
    /// counts as pulled.
    fn count_rows(
        &self,
        local_snapshot: &RowSnapshot,
        copied: &HashMap<EntityName, HashSet<String>>,
    ) -> Result<(usize, usize)> {
        let no_rows = HashSet::new();
        let mut pushed = 0;
        let mut pulled = 0;
        for schema in sync_schemas() {
            let entity = schema.entity_name();
            if entity == EntityName::DeletionAudit {
                continue;
            }
            let copied = copied.get(&entity).unwrap_or(&no_rows);
            for (row_id, remote_update) in row_versions(self.remote, schema.table_name())? {
                if copied.contains(&row_id) {
                    pushed += 1;
                    continue;
                }
                match local_snapshot.version_of(entity, &row_id) {
                    Some(local_update) if *local_update >= remote_update => {}
                    _ => pulled += 1,
                }
            }
        }
        Ok((pushed, pulled))
    }
}

/// `(EntityName, EntityId)` for every deletion audit row in `db`.
pub fn deleted_rows(db: &Database) -> Result<Vec<(EntityName, String)>> {
    let rows = db.query_rows(
        "SELECT EntityName, EntityId FROM DeletionAudit",
        &[],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;

    Ok(rows
        .into_iter()
        .filter_map(|(name, id)| match name.parse::<EntityName>() {
            Ok(entity) => Some((entity, id)),
            Err(err) => {
                log::warn!("Skipping deletion audit for {}: {}", id, err);
                None
            }
        })
        .collect())
}

/// Local rows that should have survived the merge but are absent from `merged`.
pub fn find_missing_rows(
    local_snapshot: &RowSnapshot,
    merged: &Database,
) -> Result<Vec<(EntityName, Vec<String>)>> {
    let deleted: HashSet<(EntityName, String)> = deleted_rows(merged)?.into_iter().collect();

    let mut missing = Vec::new();
    for schema in sync_schemas() {
        let entity = schema.entity_name();
        let present: HashSet<String> = row_versions(merged, schema.table_name())?
            .into_keys()
            .collect();

        let mut lost: Vec<String> = local_snapshot
            .ids(entity)
            .filter(|id| !present.contains(*id) && !deleted.contains(&(entity, (*id).clone())))
            .cloned()
            .collect();
        if !lost.is_empty() {
            lost.sort();
            missing.push((entity, lost));
        }
    }
    Ok(missing)
}
