use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::db::value::{end_of_time, is_end_of_time, SqlValue};
use crate::db::Database;
use crate::entity::{row_accessors, Entity, EntityDescriptor, EntityName, Field, RowMeta};
use crate::error::DartsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameType {
    #[default]
    X01,
    Golf,
    RoundTheClock,
    Dartzee,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::X01 => "X01",
            GameType::Golf => "GOLF",
            GameType::RoundTheClock => "ROUND_THE_CLOCK",
            GameType::Dartzee => "DARTZEE",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = DartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X01" => Ok(GameType::X01),
            "GOLF" => Ok(GameType::Golf),
            "ROUND_THE_CLOCK" => Ok(GameType::RoundTheClock),
            "DARTZEE" => Ok(GameType::Dartzee),
            other => Err(DartsError::Type(format!("Unknown game type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameEntity {
    pub row: RowMeta,
    pub game_type: GameType,
    pub game_params: String,
    pub dt_finish: DateTime<Utc>,
}

impl Default for GameEntity {
    fn default() -> Self {
        Self {
            row: RowMeta::default(),
            game_type: GameType::default(),
            game_params: String::new(),
            dt_finish: end_of_time(),
        }
    }
}

impl GameEntity {
    pub fn factory_and_save(db: &Database, game_type: GameType, game_params: &str) -> Option<Self> {
        let mut game = Self {
            game_type,
            game_params: game_params.to_string(),
            ..Self::default()
        };
        game.save_to_database(db).then_some(game)
    }

    pub fn is_finished(&self) -> bool {
        !is_end_of_time(&self.dt_finish)
    }
}

impl Entity for GameEntity {
    row_accessors!();

    fn descriptor() -> &'static EntityDescriptor<Self> {
        static DESCRIPTOR: OnceLock<EntityDescriptor<GameEntity>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            EntityDescriptor::new(
                EntityName::Game,
                vec![
                    Field::varchar(
                        "GameType",
                        255,
                        |e: &GameEntity| SqlValue::from(e.game_type.as_str()),
                        |e, v| {
                            e.game_type = v.into_text()?.parse()?;
                            Ok(())
                        },
                    ),
                    Field::varchar(
                        "GameParams",
                        255,
                        |e: &GameEntity| SqlValue::from(e.game_params.as_str()),
                        |e, v| {
                            e.game_params = v.into_text()?;
                            Ok(())
                        },
                    ),
                    Field::timestamp(
                        "DtFinish",
                        |e: &GameEntity| SqlValue::from(e.dt_finish),
                        |e, v| {
                            e.dt_finish = v.as_timestamp()?;
                            Ok(())
                        },
                    ),
                ],
            )
        })
    }
}
