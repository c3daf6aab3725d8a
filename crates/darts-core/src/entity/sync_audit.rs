use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::db::value::{parse_timestamp, SqlValue};
use crate::db::Database;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};

/// One successful sync against a named remote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncAuditEntity {
    pub row: RowMeta,
    pub remote_name: String,
}

impl SyncAuditEntity {
    pub fn insert_sync_audit(db: &Database, remote_name: &str) -> Option<Self> {
        let mut audit = Self {
            remote_name: remote_name.to_string(),
            ..Self::default()
        };
        audit.save_to_database(db).then_some(audit)
    }

    /// Creation time of the most recent sync with `remote_name`.
    pub fn last_sync_for(db: &Database, remote_name: &str) -> Option<DateTime<Utc>> {
        let latest = db
            .query_rows(
                "SELECT MAX(DtCreation) FROM SyncAudit WHERE RemoteName = ?",
                &[SqlValue::from(remote_name)],
                |row| row.get::<_, Option<String>>(0),
            )
            .ok()?
            .into_iter()
            .next()
            .flatten()?;

        match parse_timestamp(&latest) {
            Ok(timestamp) => Some(timestamp),
            Err(err) => {
                log::error!("Unreadable sync audit timestamp [{}]: {}", latest, err);
                None
            }
        }
    }
}

impl Entity for SyncAuditEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<SyncAuditEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::SyncAudit,
                vec![Field::varchar(
                    "RemoteName",
                    255,
                    |e: &SyncAuditEntity| SqlValue::from(e.remote_name.as_str()),
                    |e, v| {
                        e.remote_name = v.into_text()?;
                        Ok(())
                    },
                )],
            )
        })
    }
}
