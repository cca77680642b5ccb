//! Chess match engine.
//!
//! Board representation, legal move generation and a searching computer
//! opponent, plus the match layer around them: games with clocks,
//! challenges between players and a registry of named boards.

pub mod utils;
pub mod piece;
pub mod square;
pub mod error;
pub mod chess_move;
pub mod zobrist;
pub mod movegen_tables;
pub mod rayattacks;
pub mod position;
pub mod movegeneration;
pub mod perft;
pub mod evaluation;
pub mod moveorder;
pub mod transposition;
pub mod search;
pub mod clock;
pub mod player;
pub mod record;
pub mod game;
pub mod challenge;
pub mod config;
pub mod manager;

pub use chess_move::{Move, MoveRequest};
pub use clock::{ChessClock, ManualTimeSource, SystemTimeSource, TimeControlSettings, TimeSource};
pub use config::{EngineConfig, SearchConfig};
pub use error::{ChessError, Result};
pub use game::{DrawReason, Game, GameId, GameSnapshot, GameState};
pub use manager::{ChessService, MatchEvent};
pub use piece::{Color, Piece, PieceType};
pub use player::{Difficulty, Player, PlayerId};
pub use position::Position;
pub use record::GameRecord;
pub use square::Square;
