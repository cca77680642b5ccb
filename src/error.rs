//! Error taxonomy for the engine boundary.
//!
//! Every variant is recoverable: the operation that produced it left the
//! game, challenge book and board registry untouched.

use thiserror::Error;

use crate::piece::{Color, PieceType};
use crate::player::PlayerId;

pub type Result<T> = std::result::Result<T, ChessError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChessError {
    #[error("invalid move: {0}")]
    InvalidMove(String),
    #[error("not {0}'s move")]
    NotSideToMove(Color),
    #[error("not your piece on {0}")]
    NotYourPiece(String),
    #[error("player {0} is not in an active game")]
    NotInGame(PlayerId),
    #[error("player {0} is not a player in this game")]
    NotInThisGame(PlayerId),
    #[error("player {0} is already in an active game")]
    AlreadyInGame(PlayerId),
    #[error("opponent {0} is already in an active game")]
    OpponentAlreadyInGame(PlayerId),
    #[error("game is already over")]
    GameAlreadyTerminal,
    #[error("game has not started")]
    GameNotStarted,
    #[error("game has already started")]
    GameAlreadyStarted,
    #[error("no draw offer from the opponent")]
    NoDrawOffer,
    #[error("no pending challenge")]
    NoSuchChallenge,
    #[error("a player cannot challenge themselves")]
    SelfChallenge,
    #[error("a challenge to {0} is already pending")]
    ChallengeAlreadyPending(PlayerId),
    #[error("invalid time control '{0}', expected '<minutes>[:<increment>]'")]
    InvalidTimeControlFormat(String),
    #[error("board '{0}' is occupied")]
    BoardOccupied(String),
    #[error("no board named '{0}'")]
    NoSuchBoard(String),
    #[error("board '{0}' already exists")]
    BoardAlreadyExists(String),
    #[error("invalid square '{0}'")]
    InvalidSquare(String),
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("cannot promote to {0:?}")]
    InvalidPromotionPiece(PieceType),
    #[error("invalid game record: {0}")]
    InvalidRecord(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChessError {
    /// Stable failure code for the presentation layer to key messages on.
    pub fn code(&self) -> &'static str {
        match self {
            ChessError::InvalidMove(_) => "invalid_move",
            ChessError::NotSideToMove(_) => "not_your_move",
            ChessError::NotYourPiece(_) => "not_your_piece",
            ChessError::NotInGame(_) => "must_be_in_match",
            ChessError::NotInThisGame(_) => "not_in_this_game",
            ChessError::AlreadyInGame(_) => "already_in_game",
            ChessError::OpponentAlreadyInGame(_) => "opponent_already_in_game",
            ChessError::GameAlreadyTerminal => "game_already_terminal",
            ChessError::GameNotStarted => "game_not_started",
            ChessError::GameAlreadyStarted => "game_already_started",
            ChessError::NoDrawOffer => "no_draw_offer",
            ChessError::NoSuchChallenge => "no_pending_challenge",
            ChessError::SelfChallenge => "self_challenge",
            ChessError::ChallengeAlreadyPending(_) => "challenge_already_pending",
            ChessError::InvalidTimeControlFormat(_) => "invalid_time_control",
            ChessError::BoardOccupied(_) => "board_occupied",
            ChessError::NoSuchBoard(_) => "no_such_board",
            ChessError::BoardAlreadyExists(_) => "board_already_exists",
            ChessError::InvalidSquare(_) => "invalid_square",
            ChessError::InvalidFen(_) => "invalid_fen",
            ChessError::InvalidPromotionPiece(_) => "invalid_promotion_piece",
            ChessError::InvalidRecord(_) => "invalid_record",
            ChessError::Config(_) => "config",
        }
    }
}
