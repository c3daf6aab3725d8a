use std::sync::OnceLock;

use crate::db::value::SqlValue;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};

/// Single-row table holding the schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionEntity {
    pub row: RowMeta,
    pub version: i32,
}

impl Default for VersionEntity {
    fn default() -> Self {
        Self {
            row: RowMeta::default(),
            version: -1,
        }
    }
}

impl Entity for VersionEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<VersionEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::Version,
                vec![Field::int(
                    "Version",
                    |e: &VersionEntity| SqlValue::from(e.version),
                    |e, v| {
                        e.version = v.as_i32()?;
                        Ok(())
                    },
                )],
            )
        })
    }
}
