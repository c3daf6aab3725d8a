//! Per-type schema descriptors.
//!
//! A descriptor lists every column of an entity table together with the
//! getter and setter that move that column's value in and out of the record.
//! It is built once per type and is the single source of truth for the table:
//! DDL, SELECT lists, INSERT and UPDATE statements are all generated from it,
//! so their column order always matches.

use crate::db::value::{ColumnType, SqlValue};
use crate::entity::name::EntityName;
use crate::entity::Entity;
use crate::error::Result;

/// Reads one column's value from a record.
pub type Getter<E> = fn(&E) -> SqlValue;

/// Writes one column's value into a record.
pub type Setter<E> = fn(&mut E, SqlValue) -> Result<()>;

/// Declaration of a single table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            not_null: true,
            primary_key: false,
        }
    }

    /// Column definition as it appears inside `CREATE TABLE (...)`.
    pub fn ddl(&self) -> String {
        let mut ddl = format!("{} {}", self.name, self.column_type.sql());
        if self.primary_key {
            ddl.push_str(" PRIMARY KEY");
        } else if self.not_null {
            ddl.push_str(" NOT NULL");
        }
        ddl
    }
}

/// A column plus the accessors binding it to `E`.
pub struct Field<E> {
    column: ColumnDef,
    get: Getter<E>,
    set: Setter<E>,
}

impl<E> Field<E> {
    pub fn new(column: ColumnDef, get: Getter<E>, set: Setter<E>) -> Self {
        Self { column, get, set }
    }

    pub fn varchar(name: &'static str, length: u32, get: Getter<E>, set: Setter<E>) -> Self {
        Self::new(ColumnDef::new(name, ColumnType::Varchar(length)), get, set)
    }

    pub fn int(name: &'static str, get: Getter<E>, set: Setter<E>) -> Self {
        Self::new(ColumnDef::new(name, ColumnType::Int), get, set)
    }

    pub fn timestamp(name: &'static str, get: Getter<E>, set: Setter<E>) -> Self {
        Self::new(ColumnDef::new(name, ColumnType::Timestamp), get, set)
    }

    pub fn column(&self) -> &ColumnDef {
        &self.column
    }

    pub fn name(&self) -> &'static str {
        self.column.name
    }

    pub fn get(&self, entity: &E) -> SqlValue {
        (self.get)(entity)
    }

    pub fn set(&self, entity: &mut E, value: SqlValue) -> Result<()> {
        (self.set)(entity, value)
    }
}

/// Type-erased view of a table's schema.
///
/// The merge and sanity layers walk every table through this trait without
/// knowing the concrete record type.
pub trait TableSchema: Send + Sync {
    fn entity_name(&self) -> EntityName;

    fn column_defs(&self) -> &[ColumnDef];

    /// Secondary indexes, each an ordered group of column names.
    fn indexes(&self) -> &[Vec<&'static str>];

    fn columns_allowed_to_be_unset(&self) -> &[&'static str];

    fn table_name(&self) -> &'static str {
        self.entity_name().table_name()
    }

    fn column_names(&self) -> Vec<&'static str> {
        self.column_defs().iter().map(|c| c.name).collect()
    }

    fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_defs()
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.column_type)
    }

    fn column_can_be_unset(&self, name: &str) -> bool {
        self.columns_allowed_to_be_unset().contains(&name)
    }

    fn create_table_columns_sql(&self) -> String {
        self.column_defs()
            .iter()
            .map(ColumnDef::ddl)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_list(&self, alias: &str) -> String {
        self.column_names()
            .iter()
            .map(|name| {
                if alias.is_empty() {
                    name.to_string()
                } else {
                    format!("{}.{}", alias, name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn insert_sql(&self) -> String {
        let names = self.column_names();
        let placeholders = vec!["?"; names.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name(),
            names.join(", "),
            placeholders
        )
    }

    /// `UPDATE` of every column after `RowId`, keyed by `RowId` as the last parameter.
    fn update_sql(&self) -> String {
        let assignments = self
            .column_names()
            .iter()
            .skip(1)
            .map(|name| format!("{} = ?", name))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE RowId = ?",
            self.table_name(),
            assignments
        )
    }
}

/// Descriptor for entity type `E`: the universal columns followed by `E`'s own.
pub struct EntityDescriptor<E> {
    name: EntityName,
    fields: Vec<Field<E>>,
    columns: Vec<ColumnDef>,
    indexes: Vec<Vec<&'static str>>,
    unset_allowed: Vec<&'static str>,
}

impl<E: Entity> EntityDescriptor<E> {
    pub fn new(name: EntityName, specific: Vec<Field<E>>) -> Self {
        let mut fields = universal_fields::<E>();
        fields.extend(specific);
        let columns = fields.iter().map(|f| f.column.clone()).collect();
        Self {
            name,
            fields,
            columns,
            indexes: Vec::new(),
            unset_allowed: Vec::new(),
        }
    }

    pub fn with_index(mut self, columns: &[&'static str]) -> Self {
        self.indexes.push(columns.to_vec());
        self
    }

    /// Mark an id column that may legitimately hold an empty string.
    pub fn allow_unset(mut self, column: &'static str) -> Self {
        self.unset_allowed.push(column);
        self
    }

    pub fn fields(&self) -> &[Field<E>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field<E>> {
        self.fields
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }
}

impl<E: Entity> TableSchema for EntityDescriptor<E> {
    fn entity_name(&self) -> EntityName {
        self.name
    }

    fn column_defs(&self) -> &[ColumnDef] {
        &self.columns
    }

    fn indexes(&self) -> &[Vec<&'static str>] {
        &self.indexes
    }

    fn columns_allowed_to_be_unset(&self) -> &[&'static str] {
        &self.unset_allowed
    }
}

fn universal_fields<E: Entity>() -> Vec<Field<E>> {
    let mut row_id = ColumnDef::new("RowId", ColumnType::Varchar(36));
    row_id.primary_key = true;

    vec![
        Field::new(
            row_id,
            |e: &E| SqlValue::Text(e.row().row_id.clone()),
            |e: &mut E, v| {
                e.row_mut().row_id = v.into_text()?;
                Ok(())
            },
        ),
        Field::timestamp(
            "DtCreation",
            |e: &E| SqlValue::Timestamp(e.row().dt_creation),
            |e: &mut E, v| {
                e.row_mut().dt_creation = v.as_timestamp()?;
                Ok(())
            },
        ),
        Field::timestamp(
            "DtLastUpdate",
            |e: &E| SqlValue::Timestamp(e.row().dt_last_update),
            |e: &mut E, v| {
                e.row_mut().dt_last_update = v.as_timestamp()?;
                Ok(())
            },
        ),
    ]
}
