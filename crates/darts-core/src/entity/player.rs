use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::db::value::{end_of_time, is_end_of_time, now, SqlValue};
use crate::db::Database;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntity {
    pub row: RowMeta,
    pub name: String,
    /// Serialized AI strategy; empty for a human player.
    pub strategy: String,
    pub dt_deleted: DateTime<Utc>,
}

impl Default for PlayerEntity {
    fn default() -> Self {
        Self {
            row: RowMeta::default(),
            name: String::new(),
            strategy: String::new(),
            dt_deleted: end_of_time(),
        }
    }
}

impl PlayerEntity {
    pub fn factory_and_save(db: &Database, name: &str, strategy: &str) -> Option<Self> {
        let mut player = Self {
            name: name.to_string(),
            strategy: strategy.to_string(),
            ..Self::default()
        };
        player.save_to_database(db).then_some(player)
    }

    pub fn is_human(&self) -> bool {
        self.strategy.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        !is_end_of_time(&self.dt_deleted)
    }

    /// Soft delete: the row stays so historic games keep their player.
    pub fn mark_deleted(&mut self, db: &Database) -> bool {
        self.dt_deleted = now();
        self.save_to_database(db)
    }
}

impl Entity for PlayerEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<PlayerEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::Player,
                vec![
                    Field::varchar(
                        "Name",
                        25,
                        |e: &PlayerEntity| SqlValue::from(e.name.as_str()),
                        |e, v| {
                            e.name = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "Strategy",
                        1000,
                        |e: &PlayerEntity| SqlValue::from(e.strategy.as_str()),
                        |e, v| {
                            e.strategy = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::timestamp(
                        "DtDeleted",
                        |e: &PlayerEntity| SqlValue::from(e.dt_deleted),
                        |e, v| {
                            e.dt_deleted = v.as_timestamp()?;
                            Ok(())
                        },
                    ),
                ],
            )
            .with_index(&["Strategy", "DtDeleted"])
        })
    }
}
