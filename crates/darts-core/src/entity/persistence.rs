//! Statement generation and row hydration behind the [`Entity`] default methods.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;

use crate::db::value::{render_statement, SqlValue};
use crate::db::Database;
use crate::entity::deletion_audit::DeletionAuditEntity;
use crate::entity::descriptor::TableSchema;
use crate::entity::Entity;

pub(super) fn retrieve_entities<E: Entity>(
    db: &Database,
    where_sql: &str,
    alias: &str,
    params: &[SqlValue],
) -> Vec<E> {
    let descriptor = E::descriptor();
    let mut query = format!(
        "SELECT {} FROM {}",
        descriptor.select_list(alias),
        descriptor.table_name()
    );
    if !alias.is_empty() {
        query.push(' ');
        query.push_str(alias);
    }
    if !where_sql.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(where_sql);
    }

    db.query_rows(&query, params, hydrate::<E>).unwrap_or_default()
}

fn hydrate<E: Entity>(row: &Row<'_>) -> rusqlite::Result<E> {
    let mut entity = E::default();
    for (index, field) in E::descriptor().fields().iter().enumerate() {
        let raw: Value = row.get(index)?;
        let data_type = raw.data_type();
        SqlValue::from_column(field.column().column_type, raw)
            .and_then(|value| field.set(&mut entity, value))
            .map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(index, data_type, Box::new(err))
            })?;
    }
    entity.row_mut().retrieved_from_db = true;
    Ok(entity)
}

pub(super) fn retrieve_entity<E: Entity>(
    db: &Database,
    where_sql: &str,
    params: &[SqlValue],
) -> Option<E> {
    let entities: Vec<E> = retrieve_entities(db, where_sql, "", params);
    if entities.len() > 1 {
        log::error!(
            "Retrieved {} rows from {}. Expected 1. WhereSQL [{}]",
            entities.len(),
            E::table_name(),
            render_statement(where_sql, params)
        );
    }
    entities.into_iter().next()
}

pub(super) fn retrieve_for_id<E: Entity>(db: &Database, row_id: &str) -> Option<E> {
    let entity = retrieve_entity(db, "RowId = ?", &[SqlValue::from(row_id)]);
    if entity.is_none() {
        log::warn!("Failed to find {} for ID [{}]", E::table_name(), row_id);
    }
    entity
}

pub(super) fn save<E: Entity>(entity: &mut E, db: &Database, timestamp: DateTime<Utc>) -> bool {
    entity.row_mut().dt_last_update = timestamp;
    if entity.row().retrieved_from_db {
        update(entity, db)
    } else {
        insert(entity, db)
    }
}

fn insert<E: Entity>(entity: &mut E, db: &Database) -> bool {
    entity.assign_row_id();

    let descriptor = E::descriptor();
    let params: Vec<SqlValue> = descriptor.fields().iter().map(|f| f.get(entity)).collect();
    match db.try_execute_update(&descriptor.insert_sql(), &params) {
        Ok(_) => {
            entity.row_mut().retrieved_from_db = true;
            true
        }
        Err(_) => false,
    }
}

fn update<E: Entity>(entity: &E, db: &Database) -> bool {
    let descriptor = E::descriptor();
    let sql = descriptor.update_sql();
    let mut params: Vec<SqlValue> = descriptor
        .fields()
        .iter()
        .skip(1)
        .map(|f| f.get(entity))
        .collect();
    params.push(SqlValue::from(entity.row_id()));

    match db.try_execute_update(&sql, &params) {
        Ok(0) => {
            log::error!(
                "0 rows updated for statement: {}",
                render_statement(&sql, &params)
            );
            false
        }
        Ok(_) => true,
        Err(_) => false,
    }
}

pub(super) fn delete<E: Entity>(entity: &E, db: &Database) -> bool {
    let sql = format!("DELETE FROM {} WHERE RowId = ?", E::table_name());
    match db.try_execute_update(&sql, &[SqlValue::from(entity.row_id())]) {
        Ok(1) => true,
        Ok(count) => {
            log::error!(
                "Deleted {} rows from {} for ID [{}]. Expected 1.",
                count,
                E::table_name(),
                entity.row_id()
            );
            false
        }
        Err(_) => false,
    }
}

pub(super) fn delete_with_audit<E: Entity>(entity: &E, db: &Database) -> bool {
    delete(entity, db)
        && DeletionAuditEntity::factory_and_save(db, E::entity_name(), entity.row_id()).is_some()
}

pub(super) fn create_table(schema: &dyn TableSchema, db: &Database) -> bool {
    let created =
        db.create_table_if_not_exists(schema.table_name(), &schema.create_table_columns_sql());
    if created {
        create_indexes(schema, db);
    }
    created
}

fn create_indexes(schema: &dyn TableSchema, db: &Database) {
    for columns in schema.indexes() {
        let index_name = columns.join("_");
        let sql = format!(
            "CREATE INDEX {} ON {}({})",
            index_name,
            schema.table_name(),
            columns.join(", ")
        );
        if !db.execute_update(&sql, &[]) {
            log::warn!("Failed to create index {} on {}", index_name, schema.table_name());
        }
    }
}

pub(super) fn add_column(
    schema: &dyn TableSchema,
    db: &Database,
    column: &str,
    column_type_sql: &str,
    default: &str,
) -> bool {
    let table = schema.table_name();
    if db.column_exists(table, column) {
        log::info!("Not adding column {} to {} as it already exists", column, table);
        return false;
    }

    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {} NOT NULL DEFAULT {}",
        table, column, column_type_sql, default
    );
    db.execute_update(&sql, &[]) && db.drop_column_default(table, column)
}
