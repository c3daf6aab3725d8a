use std::sync::OnceLock;

use crate::db::value::SqlValue;
use crate::db::Database;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};

/// Record of a deleted row, kept so a later sync does not resurrect it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionAuditEntity {
    pub row: RowMeta,
    pub entity_name: Option<EntityName>,
    pub entity_id: String,
}

impl DeletionAuditEntity {
    pub fn factory_and_save(db: &Database, entity_name: EntityName, entity_id: &str) -> Option<Self> {
        let mut audit = Self {
            entity_name: Some(entity_name),
            entity_id: entity_id.to_string(),
            ..Self::default()
        };
        audit.save_to_database(db).then_some(audit)
    }
}

impl Entity for DeletionAuditEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<DeletionAuditEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::DeletionAudit,
                vec![
                    Field::varchar(
                        "EntityName",
                        255,
                        |e: &DeletionAuditEntity| {
                            SqlValue::from(e.entity_name.map(|n| n.table_name()).unwrap_or_default())
                        },
                        |e, v| {
                            let text = v.into_text()?;
                            e.entity_name = if text.is_empty() { None } else { Some(text.parse()?) };
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "EntityId",
                        36,
                        |e: &DeletionAuditEntity| SqlValue::from(e.entity_id.as_str()),
                        |e, v| {
                            e.entity_id = v.into_text()?;
                            Ok(())
                        },
                    ),
                ],
            )
        })
    }
}
