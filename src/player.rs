use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChessError, Result};

/// Opaque handle for a human participant, issued by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new_v4() -> PlayerId {
        PlayerId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> PlayerId {
        PlayerId(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computer strength, 1 (weakest) to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: Difficulty = Difficulty(1);
    pub const MAX: Difficulty = Difficulty(10);

    pub fn new(level: u8) -> Result<Difficulty> {
        if (1..=10).contains(&level) {
            Ok(Difficulty(level))
        } else {
            Err(ChessError::Config(format!("difficulty must be between 1 and 10, got {}", level)))
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Iterative deepening stops after this many plies.
    pub fn search_depth(self) -> u32 {
        match self.0 {
            1..=2 => 1,
            3..=4 => 2,
            5..=6 => 3,
            7..=8 => 4,
            9 => 5,
            _ => 6,
        }
    }

    /// Root moves scoring within this many centipawns of the best are
    /// picked at random.
    pub fn noise_margin(self) -> i32 {
        (10 - self.0 as i32) * 15
    }

    /// Share of the configured think time this level may spend, in tenths.
    pub fn time_share(self) -> u32 {
        self.0 as u32
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty(5)
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = ChessError;

    fn try_from(level: u8) -> Result<Difficulty> {
        Difficulty::new(level)
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> u8 {
        difficulty.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Player {
    Human { id: PlayerId },
    Computer { difficulty: Difficulty },
}

impl Player {
    pub fn human(id: PlayerId) -> Player {
        Player::Human { id }
    }

    pub fn computer(difficulty: Difficulty) -> Player {
        Player::Computer { difficulty }
    }

    pub fn is_computer(&self) -> bool {
        matches!(self, Player::Computer { .. })
    }

    /// The human's id, `None` for the computer.
    pub fn id(&self) -> Option<PlayerId> {
        match self {
            Player::Human { id } => Some(*id),
            Player::Computer { .. } => None,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Human { id } => write!(f, "{}", id),
            Player::Computer { difficulty } => write!(f, "computer ({})", difficulty),
        }
    }
}
