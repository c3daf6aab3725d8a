use std::sync::OnceLock;

use crate::db::value::SqlValue;
use crate::db::Database;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};

#[derive(Debug, Clone, PartialEq)]
pub struct AchievementEntity {
    pub row: RowMeta,
    pub player_id: String,
    pub achievement_ref: i32,
    /// Empty for achievements not tied to one game.
    pub game_id_earned: String,
    pub achievement_counter: i32,
    pub achievement_detail: String,
}

impl Default for AchievementEntity {
    fn default() -> Self {
        Self {
            row: RowMeta::default(),
            player_id: String::new(),
            achievement_ref: -1,
            game_id_earned: String::new(),
            achievement_counter: -1,
            achievement_detail: String::new(),
        }
    }
}

impl AchievementEntity {
    pub fn factory_and_save(
        db: &Database,
        player_id: &str,
        achievement_ref: i32,
        game_id_earned: &str,
        achievement_counter: i32,
    ) -> Option<Self> {
        let mut achievement = Self {
            player_id: player_id.to_string(),
            achievement_ref,
            game_id_earned: game_id_earned.to_string(),
            achievement_counter,
            ..Self::default()
        };
        achievement.save_to_database(db).then_some(achievement)
    }
}

impl Entity for AchievementEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<AchievementEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::Achievement,
                vec![
                    Field::varchar(
                        "PlayerId",
                        36,
                        |e: &AchievementEntity| SqlValue::from(e.player_id.as_str()),
                        |e, v| {
                            e.player_id = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "AchievementRef",
                        |e: &AchievementEntity| SqlValue::from(e.achievement_ref),
                        |e, v| {
                            e.achievement_ref = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "GameIdEarned",
                        36,
                        |e: &AchievementEntity| SqlValue::from(e.game_id_earned.as_str()),
                        |e, v| {
                            e.game_id_earned = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "AchievementCounter",
                        |e: &AchievementEntity| SqlValue::from(e.achievement_counter),
                        |e, v| {
                            e.achievement_counter = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "AchievementDetail",
                        255,
                        |e: &AchievementEntity| SqlValue::from(e.achievement_detail.as_str()),
                        |e, v| {
                            e.achievement_detail = v.into_text()?;
                            Ok(())
                        },
                    ),
                ],
            )
            .with_index(&["PlayerId", "AchievementRef"])
            .allow_unset("GameIdEarned")
        })
    }
}
