use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::db::value::{end_of_time, is_end_of_time, SqlValue};
use crate::db::Database;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};

/// A player's seat in one game.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantEntity {
    pub row: RowMeta,
    pub game_id: String,
    pub player_id: String,
    pub ordinal: i32,
    pub finishing_position: i32,
    pub final_score: i32,
    pub dt_finished: DateTime<Utc>,
}

impl Default for ParticipantEntity {
    fn default() -> Self {
        Self {
            row: RowMeta::default(),
            game_id: String::new(),
            player_id: String::new(),
            ordinal: -1,
            finishing_position: -1,
            final_score: -1,
            dt_finished: end_of_time(),
        }
    }
}

impl ParticipantEntity {
    pub fn factory_and_save(
        db: &Database,
        game_id: &str,
        player_id: &str,
        ordinal: i32,
    ) -> Option<Self> {
        let mut participant = Self {
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            ordinal,
            ..Self::default()
        };
        participant.save_to_database(db).then_some(participant)
    }

    pub fn is_active(&self) -> bool {
        is_end_of_time(&self.dt_finished)
    }
}

impl Entity for ParticipantEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<ParticipantEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::Participant,
                vec![
                    Field::varchar(
                        "GameId",
                        36,
                        |e: &ParticipantEntity| SqlValue::from(e.game_id.as_str()),
                        |e, v| {
                            e.game_id = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "PlayerId",
                        36,
                        |e: &ParticipantEntity| SqlValue::from(e.player_id.as_str()),
                        |e, v| {
                            e.player_id = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "Ordinal",
                        |e: &ParticipantEntity| SqlValue::from(e.ordinal),
                        |e, v| {
                            e.ordinal = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "FinishingPosition",
                        |e: &ParticipantEntity| SqlValue::from(e.finishing_position),
                        |e, v| {
                            e.finishing_position = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "FinalScore",
                        |e: &ParticipantEntity| SqlValue::from(e.final_score),
                        |e, v| {
                            e.final_score = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::timestamp(
                        "DtFinished",
                        |e: &ParticipantEntity| SqlValue::from(e.dt_finished),
                        |e, v| {
                            e.dt_finished = v.as_timestamp()?;
                            Ok(())
                        },
                    ),
                ],
            )
            .with_index(&["PlayerId", "GameId"])
        })
    }
}
