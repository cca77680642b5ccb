//! Saved-game format.
//!
//! A record stores how a game was set up and which moves were played, not
//! the resulting board. `Game::replay` rebuilds the board by running the
//! moves again, so a record can only describe a game reachable by legal
//! play.

use serde::{Deserialize, Serialize};

use crate::clock::TimeControlSettings;
use crate::error::{ChessError, Result};
use crate::game::{GameId, GameState};
use crate::player::Player;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: GameId,
    /// Starting position, `None` for the standard one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_fen: Option<String>,
    pub white: Player,
    pub black: Player,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_control: Option<TimeControlSettings>,
    pub started: bool,
    /// Coordinate notation, e.g. `e2e4`, `e7e8q`.
    pub moves: Vec<String>,
    /// Results that the moves alone do not produce: forfeits, timeouts,
    /// agreed draws and abandonment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GameState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_remaining_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_remaining_ms: Option<u64>,
}

impl GameRecord {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ChessError::InvalidRecord(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ChessError::InvalidRecord(e.to_string()))
    }

    pub fn from_json(source: &str) -> Result<GameRecord> {
        serde_json::from_str(source).map_err(|e| ChessError::InvalidRecord(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{Difficulty, PlayerId};

    fn sample() -> GameRecord {
        GameRecord {
            id: GameId::new_v4(),
            start_fen: None,
            white: Player::human(PlayerId::new_v4()),
            black: Player::computer(Difficulty::new(3).unwrap()),
            time_control: Some(TimeControlSettings::from_minutes(5, 3)),
            started: true,
            moves: vec!["e2e4".into(), "e7e5".into()],
            outcome: None,
            white_remaining_ms: Some(290_000),
            black_remaining_ms: Some(300_000),
        }
    }

    #[test]
    fn json_round_trip() {
        let record = sample();
        let json = record.to_json().unwrap();
        assert!(!json.contains("start_fen"));
        assert_eq!(GameRecord::from_json(&json).unwrap(), record);
        assert_eq!(GameRecord::from_json(&record.to_json_pretty().unwrap()).unwrap(), record);
    }

    #[test]
    fn malformed_json_is_an_invalid_record() {
        let err = GameRecord::from_json("{\"moves\": 3}").unwrap_err();
        assert_eq!(err.code(), "invalid_record");
    }
}
