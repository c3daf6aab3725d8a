use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DartsError;

/// Every entity type, named as its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityName {
    Player,
    Game,
    Participant,
    Dart,
    Achievement,
    DeletionAudit,
    SyncAudit,
    Version,
}

impl EntityName {
    pub const ALL: [EntityName; 8] = [
        EntityName::Player,
        EntityName::Game,
        EntityName::Participant,
        EntityName::Dart,
        EntityName::Achievement,
        EntityName::DeletionAudit,
        EntityName::SyncAudit,
        EntityName::Version,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            EntityName::Player => "Player",
            EntityName::Game => "Game",
            EntityName::Participant => "Participant",
            EntityName::Dart => "Dart",
            EntityName::Achievement => "Achievement",
            EntityName::DeletionAudit => "DeletionAudit",
            EntityName::SyncAudit => "SyncAudit",
            EntityName::Version => "Version",
        }
    }

    /// Whether rows of this table travel between databases during a sync.
    pub fn is_synced(&self) -> bool {
        !matches!(self, EntityName::SyncAudit | EntityName::Version)
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityName {
    type Err = DartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityName::ALL
            .iter()
            .copied()
            .find(|name| name.table_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DartsError::InvalidInput(format!("Unknown entity name: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("deletionaudit".parse::<EntityName>().unwrap(), EntityName::DeletionAudit);
        assert!("Scoreboard".parse::<EntityName>().is_err());
    }

    #[test]
    fn test_audit_tables_are_not_synced() {
        assert!(EntityName::Dart.is_synced());
        assert!(EntityName::DeletionAudit.is_synced());
        assert!(!EntityName::SyncAudit.is_synced());
        assert!(!EntityName::Version.is_synced());
    }
}
