use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::db::value::SqlValue;
use crate::db::Database;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};
use crate::error::DartsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentType {
    Double,
    Treble,
    OuterSingle,
    InnerSingle,
    #[default]
    Miss,
    MissedBoard,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Double => "DOUBLE",
            SegmentType::Treble => "TREBLE",
            SegmentType::OuterSingle => "OUTER_SINGLE",
            SegmentType::InnerSingle => "INNER_SINGLE",
            SegmentType::Miss => "MISS",
            SegmentType::MissedBoard => "MISSED_BOARD",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentType {
    type Err = DartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOUBLE" => Ok(SegmentType::Double),
            "TREBLE" => Ok(SegmentType::Treble),
            "OUTER_SINGLE" => Ok(SegmentType::OuterSingle),
            "INNER_SINGLE" => Ok(SegmentType::InnerSingle),
            "MISS" => Ok(SegmentType::Miss),
            "MISSED_BOARD" => Ok(SegmentType::MissedBoard),
            other => Err(DartsError::Type(format!("Unknown segment type: {}", other))),
        }
    }
}

/// A single thrown dart.
#[derive(Debug, Clone, PartialEq)]
pub struct DartEntity {
    pub row: RowMeta,
    pub player_id: String,
    pub participant_id: String,
    pub round_number: i32,
    pub ordinal: i32,
    pub score: i32,
    pub multiplier: i32,
    pub starting_score: i32,
    pub pos_x: i32,
    pub pos_y: i32,
    pub segment_type: SegmentType,
}

impl Default for DartEntity {
    fn default() -> Self {
        Self {
            row: RowMeta::default(),
            player_id: String::new(),
            participant_id: String::new(),
            round_number: -1,
            ordinal: -1,
            score: -1,
            multiplier: -1,
            starting_score: -1,
            pos_x: -1,
            pos_y: -1,
            segment_type: SegmentType::default(),
        }
    }
}

impl DartEntity {
    #[allow(clippy::too_many_arguments)]
    pub fn factory_and_save(
        db: &Database,
        player_id: &str,
        participant_id: &str,
        round_number: i32,
        ordinal: i32,
        score: i32,
        multiplier: i32,
        segment_type: SegmentType,
    ) -> Option<Self> {
        let mut dart = Self {
            player_id: player_id.to_string(),
            participant_id: participant_id.to_string(),
            round_number,
            ordinal,
            score,
            multiplier,
            segment_type,
            ..Self::default()
        };
        dart.save_to_database(db).then_some(dart)
    }
}

impl Entity for DartEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<DartEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::Dart,
                vec![
                    Field::varchar(
                        "PlayerId",
                        36,
                        |e: &DartEntity| SqlValue::from(e.player_id.as_str()),
                        |e, v| {
                            e.player_id = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "ParticipantId",
                        36,
                        |e: &DartEntity| SqlValue::from(e.participant_id.as_str()),
                        |e, v| {
                            e.participant_id = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "RoundNumber",
                        |e: &DartEntity| SqlValue::from(e.round_number),
                        |e, v| {
                            e.round_number = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "Ordinal",
                        |e: &DartEntity| SqlValue::from(e.ordinal),
                        |e, v| {
                            e.ordinal = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "Score",
                        |e: &DartEntity| SqlValue::from(e.score),
                        |e, v| {
                            e.score = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "Multiplier",
                        |e: &DartEntity| SqlValue::from(e.multiplier),
                        |e, v| {
                            e.multiplier = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "StartingScore",
                        |e: &DartEntity| SqlValue::from(e.starting_score),
                        |e, v| {
                            e.starting_score = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "PosX",
                        |e: &DartEntity| SqlValue::from(e.pos_x),
                        |e, v| {
                            e.pos_x = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::int(
                        "PosY",
                        |e: &DartEntity| SqlValue::from(e.pos_y),
                        |e, v| {
                            e.pos_y = v.as_i32()?;
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "SegmentType",
                        255,
                        |e: &DartEntity| SqlValue::from(e.segment_type.as_str()),
                        |e, v| {
                            e.segment_type = v.into_text()?.parse()?;
                            Ok(())
                        },
                    ),
                ],
            )
            .with_index(&["PlayerId", "ParticipantId", "RoundNumber", "Ordinal"])
        })
    }
}
