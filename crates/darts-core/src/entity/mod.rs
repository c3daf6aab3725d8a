//! Entities: typed records, each owning one table.
//!
//! A concrete entity supplies a static [`EntityDescriptor`] and access to its
//! [`RowMeta`]; everything else (retrieval, saving, deletion, table creation
//! and column evolution) comes from the default methods on [`Entity`].

pub mod achievement;
pub mod dart;
pub mod deletion_audit;
pub mod descriptor;
pub mod game;
pub mod name;
pub mod participant;
mod persistence;
pub mod player;
pub mod registry;
pub mod sync_audit;
pub mod version;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::value::{end_of_time, now, ColumnType, SqlValue};
use crate::db::Database;
use crate::error::{DartsError, Result};

pub use self::descriptor::{ColumnDef, EntityDescriptor, Field, TableSchema};
pub use self::name::EntityName;

/// The universal columns every entity carries, plus whether the record came
/// from (or has been written to) the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMeta {
    pub row_id: String,
    pub dt_creation: DateTime<Utc>,
    pub dt_last_update: DateTime<Utc>,
    retrieved_from_db: bool,
}

impl Default for RowMeta {
    fn default() -> Self {
        Self {
            row_id: String::new(),
            dt_creation: now(),
            dt_last_update: end_of_time(),
            retrieved_from_db: false,
        }
    }
}

impl RowMeta {
    /// Whether the next save is an UPDATE rather than an INSERT.
    pub fn is_persisted(&self) -> bool {
        self.retrieved_from_db
    }
}

pub trait Entity: Default + Sized + Send + 'static {
    fn descriptor() -> &'static EntityDescriptor<Self>;

    fn row(&self) -> &RowMeta;

    fn row_mut(&mut self) -> &mut RowMeta;

    fn entity_name() -> EntityName {
        Self::descriptor().entity_name()
    }

    fn table_name() -> &'static str {
        Self::descriptor().table_name()
    }

    /// Column names in table order: the universal columns, then the type's own.
    fn columns() -> Vec<&'static str> {
        Self::descriptor().column_names()
    }

    fn row_id(&self) -> &str {
        &self.row().row_id
    }

    /// Give the record a fresh UUID. Has no effect once an id is set.
    fn assign_row_id(&mut self) -> &str {
        if self.row().row_id.is_empty() {
            self.row_mut().row_id = Uuid::new_v4().to_string();
        }
        &self.row().row_id
    }

    fn retrieve_entities(db: &Database, where_sql: &str) -> Vec<Self> {
        persistence::retrieve_entities(db, where_sql, "", &[])
    }

    /// As [`Entity::retrieve_entities`], binding `params` to placeholders in the clause.
    fn retrieve_entities_with(db: &Database, where_sql: &str, params: &[SqlValue]) -> Vec<Self> {
        persistence::retrieve_entities(db, where_sql, "", params)
    }

    /// Select with the table aliased, so the clause can join other tables.
    fn retrieve_entities_aliased(db: &Database, where_sql: &str, alias: &str) -> Vec<Self> {
        persistence::retrieve_entities(db, where_sql, alias, &[])
    }

    fn retrieve_entity(db: &Database, where_sql: &str) -> Option<Self> {
        persistence::retrieve_entity(db, where_sql, &[])
    }

    fn retrieve_for_id(db: &Database, row_id: &str) -> Option<Self> {
        persistence::retrieve_for_id(db, row_id)
    }

    fn save_to_database(&mut self, db: &Database) -> bool {
        self.save_to_database_at(db, now())
    }

    /// Save with `DtLastUpdate` set to `timestamp`.
    fn save_to_database_at(&mut self, db: &Database, timestamp: DateTime<Utc>) -> bool {
        persistence::save(self, db, timestamp)
    }

    fn delete_from_database(&self, db: &Database) -> bool {
        persistence::delete(self, db)
    }

    /// Delete the row and record a deletion audit, so a later sync does not
    /// bring it back.
    fn delete_with_audit(&self, db: &Database) -> bool {
        persistence::delete_with_audit(self, db)
    }

    fn create_table(db: &Database) -> bool {
        persistence::create_table(Self::descriptor(), db)
    }

    /// Add an integer column holding -1 in existing rows.
    fn add_int_column(db: &Database, column: &str) -> bool {
        persistence::add_column(Self::descriptor(), db, column, &ColumnType::Int.sql(), "-1")
    }

    /// Add a string column holding '' in existing rows.
    fn add_string_column(db: &Database, column: &str, length: u32) -> bool {
        persistence::add_column(
            Self::descriptor(),
            db,
            column,
            &ColumnType::Varchar(length).sql(),
            "''",
        )
    }

    fn get_field(&self, name: &str) -> Option<SqlValue> {
        Self::descriptor().field(name).map(|field| field.get(self))
    }

    fn set_field(&mut self, name: &str, value: SqlValue) -> Result<()> {
        let field = Self::descriptor().field(name).ok_or_else(|| {
            DartsError::InvalidInput(format!("{} has no field {}", Self::table_name(), name))
        })?;
        field.set(self, value)
    }

    fn field_type(name: &str) -> Option<ColumnType> {
        Self::descriptor().column_type(name)
    }
}

/// Implement the accessor half of [`Entity`] for a struct with a `row: RowMeta` field.
macro_rules! row_accessors {
    () => {
        fn row(&self) -> &$crate::entity::RowMeta {
            &self.row
        }

        fn row_mut(&mut self) -> &mut $crate::entity::RowMeta {
            &mut self.row
        }
    };
}

pub(crate) use row_accessors;
