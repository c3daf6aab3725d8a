//! The full set of entity tables, reachable without knowing their record types.

use crate::db::Database;
use crate::entity::achievement::AchievementEntity;
use crate::entity::dart::DartEntity;
use crate::entity::deletion_audit::DeletionAuditEntity;
use crate::entity::game::GameEntity;
use crate::entity::participant::ParticipantEntity;
use crate::entity::player::PlayerEntity;
use crate::entity::sync_audit::SyncAuditEntity;
use crate::entity::version::VersionEntity;
use crate::entity::{Entity, EntityName, TableSchema};

pub fn schema_for(name: EntityName) -> &'static dyn TableSchema {
    match name {
        EntityName::Player => PlayerEntity::descriptor(),
        EntityName::Game => GameEntity::descriptor(),
        EntityName::Participant => ParticipantEntity::descriptor(),
        EntityName::Dart => DartEntity::descriptor(),
        EntityName::Achievement => AchievementEntity::descriptor(),
        EntityName::DeletionAudit => DeletionAuditEntity::descriptor(),
        EntityName::SyncAudit => SyncAuditEntity::descriptor(),
        EntityName::Version => VersionEntity::descriptor(),
    }
}

/// Every entity table except `Version`.
pub fn all_schemas() -> Vec<&'static dyn TableSchema> {
    EntityName::ALL
        .iter()
        .filter(|name| **name != EntityName::Version)
        .map(|name| schema_for(*name))
        .collect()
}

/// Tables whose rows are merged between databases.
pub fn sync_schemas() -> Vec<&'static dyn TableSchema> {
    EntityName::ALL
        .iter()
        .filter(|name| name.is_synced())
        .map(|name| schema_for(*name))
        .collect()
}

/// Create every entity table (including `Version`) that does not exist yet.
pub fn create_all_tables(db: &Database) {
    for name in EntityName::ALL {
        let schema = schema_for(name);
        super::persistence::create_table(schema, db);
    }
}
