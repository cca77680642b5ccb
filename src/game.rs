//! A single match: board, players, clocks and the state machine around them.
//!
//! Every mutating operation validates first, so a call that returns an
//! error leaves the game exactly as it was. The one exception is a move
//! attempted after the mover's flag has fallen: the timeout is recorded and
//! the move is then rejected.

use std::fmt;
use std::time::{Duration, Instant};

use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chess_move::{Move, MoveRequest};
use crate::clock::{format_duration, ChessClock, TimeControlSettings};
use crate::error::{ChessError, Result};
use crate::movegeneration::{
    find_move, has_legal_move, is_in_check, is_legal, is_promotion_square, legal_moves_from,
};
use crate::piece::{Color, PieceType};
use crate::player::{Player, PlayerId};
use crate::position::Position;
use crate::record::GameRecord;
use crate::square::Square;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(Uuid);

impl GameId {
    pub fn new_v4() -> GameId {
        GameId(Uuid::new_v4())
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    FiftyMove,
    Repetition,
    InsufficientMaterial,
    Agreement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    AwaitingStart,
    InProgress,
    Checkmate { winner: Color },
    Stalemate,
    Draw(DrawReason),
    Timeout { loser: Color },
    Forfeit { loser: Color },
    Abandoned,
}

impl GameState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameState::AwaitingStart | GameState::InProgress)
    }

    pub fn winner(&self) -> Option<Color> {
        match *self {
            GameState::Checkmate { winner } => Some(winner),
            GameState::Timeout { loser } | GameState::Forfeit { loser } => Some(loser.opposite()),
            _ => None,
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::AwaitingStart => write!(f, "awaiting start"),
            GameState::InProgress => write!(f, "in progress"),
            GameState::Checkmate { winner } => write!(f, "checkmate, {} wins", winner),
            GameState::Stalemate => write!(f, "stalemate"),
            GameState::Draw(DrawReason::FiftyMove) => write!(f, "draw by the fifty-move rule"),
            GameState::Draw(DrawReason::Repetition) => write!(f, "draw by threefold repetition"),
            GameState::Draw(DrawReason::InsufficientMaterial) => {
                write!(f, "draw by insufficient material")
            }
            GameState::Draw(DrawReason::Agreement) => write!(f, "draw by agreement"),
            GameState::Timeout { loser } => write!(f, "{} ran out of time", loser),
            GameState::Forfeit { loser } => write!(f, "{} forfeited", loser),
            GameState::Abandoned => write!(f, "abandoned"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub mv: Move,
    pub color: Color,
    /// Hash of the board after the move.
    pub hash: u64,
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub id: GameId,
    pub fen: String,
    pub side_to_move: Color,
    pub state: GameState,
    pub in_check: bool,
    pub white: Player,
    pub black: Player,
    pub moves: Vec<String>,
    pub white_time: Option<String>,
    pub black_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Game {
    id: GameId,
    start: Position,
    board: Position,
    players: [Player; 2],
    clock: Option<ChessClock>,
    history: Vec<HistoryEntry>,
    state: GameState,
    promotion_choice: [PieceType; 2],
    draw_offer: Option<Color>,
    generation: u64,
}

impl Game {
    pub fn new(white: Player, black: Player, time_control: Option<TimeControlSettings>) -> Game {
        Game::from_position(Position::new(), white, black, time_control)
    }

    pub fn from_position(
        start: Position,
        white: Player,
        black: Player,
        time_control: Option<TimeControlSettings>,
    ) -> Game {
        Game {
            id: GameId::new_v4(),
            board: start.clone(),
            start,
            players: [white, black],
            clock: time_control.map(ChessClock::new),
            history: Vec::new(),
            state: GameState::AwaitingStart,
            promotion_choice: [PieceType::Queen; 2],
            draw_offer: None,
            generation: 0,
        }
    }

    pub fn start(&mut self, now: Instant) -> Result<()> {
        match self.state {
            GameState::AwaitingStart => {}
            GameState::InProgress => return Err(ChessError::GameAlreadyStarted),
            _ => return Err(ChessError::GameAlreadyTerminal),
        }
        self.state = GameState::InProgress;
        let side_to_move = self.board.active_color();
        if let Some(clock) = self.clock.as_mut() {
            clock.start(side_to_move, now);
        }
        self.generation += 1;
        info!(
            "game {} started: {} (white) vs {} (black)",
            self.id, self.players[0], self.players[1]
        );
        Ok(())
    }

    /// Checks that `color` may move now. Applies a fallen flag on the way.
    fn check_turn(&mut self, color: Color, now: Instant) -> Result<()> {
        match self.state {
            GameState::InProgress => {}
            GameState::AwaitingStart => return Err(ChessError::GameNotStarted),
            _ => return Err(ChessError::GameAlreadyTerminal),
        }
        if self.board.active_color() != color {
            return Err(ChessError::NotSideToMove(color));
        }
        let flagged = self.clock.as_ref().map_or(false, |clock| clock.is_flagged(color, now));
        if flagged {
            self.apply_timeout(color, now);
            return Err(ChessError::GameAlreadyTerminal);
        }
        Ok(())
    }

    /// Plays a move given in coordinates. A promotion without a piece uses
    /// the mover's pending promotion choice.
    pub fn make_move(
        &mut self,
        color: Color,
        from: Square,
        to: Square,
        promotion: Option<PieceType>,
        now: Instant,
    ) -> Result<Move> {
        self.check_turn(color, now)?;

        let request = MoveRequest { from, to, promotion };
        match self.board.piece_at(from) {
            Some(piece) if piece.color != color => {
                return Err(ChessError::NotYourPiece(from.to_string()))
            }
            Some(_) => {}
            None => return Err(ChessError::InvalidMove(request.to_string())),
        }

        let uses_choice = promotion.is_none() && is_promotion_square(&self.board, from, to);
        let promotion = if uses_choice {
            Some(self.promotion_choice[color.index()])
        } else {
            promotion
        };

        let mov = find_move(&self.board, from, to, promotion)
            .ok_or_else(|| ChessError::InvalidMove(request.to_string()))?;
        self.apply(color, mov, now);
        if uses_choice {
            self.promotion_choice[color.index()] = PieceType::Queen;
        }
        Ok(mov)
    }

    /// Plays a move produced by the move generator, e.g. by the search.
    pub fn play(&mut self, color: Color, mov: Move, now: Instant) -> Result<Move> {
        self.check_turn(color, now)?;
        if !is_legal(&self.board, &mov) {
            return Err(ChessError::InvalidMove(mov.to_string()));
        }
        self.apply(color, mov, now);
        Ok(mov)
    }

    fn apply(&mut self, color: Color, mov: Move, now: Instant) {
        self.board.make_move(mov);
        self.history.push(HistoryEntry {
            mv: mov,
            color,
            hash: self.board.hash(),
        });
        self.draw_offer = None;
        self.generation += 1;
        if let Some(clock) = self.clock.as_mut() {
            clock.complete_move(color, now);
        }

        if let Some(terminal) = self.terminal_after_move(color) {
            self.finish(terminal, now);
        }
    }

    fn terminal_after_move(&self, mover: Color) -> Option<GameState> {
        if !has_legal_move(&self.board) {
            return Some(if is_in_check(&self.board, self.board.active_color()) {
                GameState::Checkmate { winner: mover }
            } else {
                GameState::Stalemate
            });
        }
        if self.board.halfmove_clock() >= 100 {
            return Some(GameState::Draw(DrawReason::FiftyMove));
        }
        if self.repetitions(self.board.hash()) >= 3 {
            return Some(GameState::Draw(DrawReason::Repetition));
        }
        if self.board.is_insufficient_material() {
            return Some(GameState::Draw(DrawReason::InsufficientMaterial));
        }
        None
    }

    fn repetitions(&self, hash: u64) -> usize {
        self.history_hashes().into_iter().filter(|seen| *seen == hash).count()
    }

    fn finish(&mut self, state: GameState, now: Instant) {
        self.state = state;
        self.draw_offer = None;
        self.generation += 1;
        if let Some(clock) = self.clock.as_mut() {
            clock.stop(now);
        }
        info!("game {} ended after {} plies: {}", self.id, self.history.len(), state);
    }

    fn apply_timeout(&mut self, loser: Color, now: Instant) {
        if let Some(clock) = self.clock.as_mut() {
            clock.check_expired(now);
        }
        let state = if self.board.has_mating_material(loser.opposite()) {
            GameState::Timeout { loser }
        } else {
            GameState::Draw(DrawReason::InsufficientMaterial)
        };
        self.finish(state, now);
    }

    fn require_in_progress(&self) -> Result<()> {
        match self.state {
            GameState::InProgress => Ok(()),
            GameState::AwaitingStart => Err(ChessError::GameNotStarted),
            _ => Err(ChessError::GameAlreadyTerminal),
        }
    }

    pub fn forfeit(&mut self, color: Color, now: Instant) -> Result<()> {
        self.require_in_progress()?;
        self.finish(GameState::Forfeit { loser: color }, now);
        Ok(())
    }

    pub fn abandon(&mut self, now: Instant) -> Result<()> {
        if self.state.is_terminal() {
            return Err(ChessError::GameAlreadyTerminal);
        }
        self.finish(GameState::Abandoned, now);
        Ok(())
    }

    pub fn offer_draw(&mut self, color: Color) -> Result<()> {
        self.require_in_progress()?;
        self.draw_offer = Some(color);
        Ok(())
    }

    pub fn accept_draw(&mut self, color: Color, now: Instant) -> Result<()> {
        self.require_in_progress()?;
        if self.draw_offer != Some(color.opposite()) {
            return Err(ChessError::NoDrawOffer);
        }
        self.finish(GameState::Draw(DrawReason::Agreement), now);
        Ok(())
    }

    /// Detects flag-fall. Returns the terminal state if this call ended the game.
    pub fn tick(&mut self, now: Instant) -> Option<GameState> {
        if self.state != GameState::InProgress {
            return None;
        }
        let loser = self.clock.as_mut()?.check_expired(now)?;
        self.apply_timeout(loser, now);
        Some(self.state)
    }

    pub fn set_promotion_choice(&mut self, color: Color, piece: PieceType) -> Result<()> {
        if !piece.is_promotion_target() {
            return Err(ChessError::InvalidPromotionPiece(piece));
        }
        if self.state.is_terminal() {
            return Err(ChessError::GameAlreadyTerminal);
        }
        self.promotion_choice[color.index()] = piece;
        Ok(())
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn board(&self) -> &Position {
        &self.board
    }

    pub fn start_position(&self) -> &Position {
        &self.start
    }

    pub fn side_to_move(&self) -> Color {
        self.board.active_color()
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn winner(&self) -> Option<Color> {
        self.state.winner()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Hashes of every position reached, the starting one included.
    pub fn history_hashes(&self) -> Vec<u64> {
        std::iter::once(self.start.hash())
            .chain(self.history.iter().map(|entry| entry.hash))
            .collect()
    }

    /// Bumped on every state change; lets background work detect that the
    /// game moved on without it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn white(&self) -> Player {
        self.players[Color::White.index()]
    }

    pub fn black(&self) -> Player {
        self.players[Color::Black.index()]
    }

    pub fn player(&self, color: Color) -> Player {
        self.players[color.index()]
    }

    pub fn color_of(&self, id: PlayerId) -> Option<Color> {
        Color::ALL.into_iter().find(|color| self.players[color.index()].id() == Some(id))
    }

    pub fn time_control(&self) -> Option<TimeControlSettings> {
        self.clock.as_ref().map(ChessClock::settings)
    }

    pub fn remaining(&self, color: Color, now: Instant) -> Option<Duration> {
        self.clock.as_ref().map(|clock| clock.remaining(color, now))
    }

    pub fn time_left(&self, color: Color, now: Instant) -> Option<String> {
        self.remaining(color, now).map(format_duration)
    }

    pub fn promotion_choice(&self, color: Color) -> PieceType {
        self.promotion_choice[color.index()]
    }

    pub fn draw_offer(&self) -> Option<Color> {
        self.draw_offer
    }

    pub fn legal_moves_from(&self, square: Square) -> Vec<Move> {
        if self.state != GameState::InProgress {
            return Vec::new();
        }
        legal_moves_from(&self.board, square)
    }

    pub fn snapshot(&self, now: Instant) -> GameSnapshot {
        GameSnapshot {
            id: self.id,
            fen: self.board.to_fen(),
            side_to_move: self.side_to_move(),
            state: self.state,
            in_check: is_in_check(&self.board, self.side_to_move()),
            white: self.white(),
            black: self.black(),
            moves: self.history.iter().map(|entry| entry.mv.to_string()).collect(),
            white_time: self.time_left(Color::White, now),
            black_time: self.time_left(Color::Black, now),
        }
    }

    pub fn to_record(&self, now: Instant) -> GameRecord {
        let default_start = self.start == Position::new();
        // Outcomes the moves reproduce on their own are left out
        let outcome = match self.state {
            GameState::Timeout { .. }
            | GameState::Forfeit { .. }
            | GameState::Abandoned
            | GameState::Draw(DrawReason::Agreement) => Some(self.state),
            GameState::Draw(DrawReason::InsufficientMaterial)
                if !self.board.is_insufficient_material() =>
            {
                Some(self.state)
            }
            _ => None,
        };
        let millis = |color| self.remaining(color, now).map(|d| d.as_millis() as u64);
        GameRecord {
            id: self.id,
            start_fen: if default_start { None } else { Some(self.start.to_fen()) },
            white: self.white(),
            black: self.black(),
            time_control: self.time_control(),
            started: self.state != GameState::AwaitingStart,
            moves: self.history.iter().map(|entry| entry.mv.to_string()).collect(),
            outcome,
            white_remaining_ms: millis(Color::White),
            black_remaining_ms: millis(Color::Black),
        }
    }

    /// Rebuilds a game from a record by replaying its moves.
    pub fn replay(record: &GameRecord, now: Instant) -> Result<Game> {
        let start = match &record.start_fen {
            Some(fen) => Position::from_fen(fen)?,
            None => Position::new(),
        };
        let mut game = Game::from_position(start, record.white, record.black, None);
        game.id = record.id;

        if !record.started {
            if !record.moves.is_empty() || record.outcome.is_some() {
                return Err(ChessError::InvalidRecord(
                    "moves recorded for a game that never started".into(),
                ));
            }
            game.clock = record.time_control.map(ChessClock::new);
            return Ok(game);
        }

        game.state = GameState::InProgress;
        for (ply, text) in record.moves.iter().enumerate() {
            let invalid =
                || ChessError::InvalidRecord(format!("move {} '{}' is not legal", ply + 1, text));
            if game.state.is_terminal() {
                return Err(invalid());
            }
            let request = MoveRequest::parse(text).map_err(|_| invalid())?;
            let mov = find_move(&game.board, request.from, request.to, request.promotion)
                .ok_or_else(invalid)?;
            let color = game.side_to_move();
            game.apply(color, mov, now);
        }

        if let Some(outcome) = record.outcome {
            if game.state.is_terminal() || !outcome.is_terminal() {
                return Err(ChessError::InvalidRecord(format!(
                    "outcome '{}' conflicts with the moves",
                    outcome
                )));
            }
            game.state = outcome;
        }

        if let Some(settings) = record.time_control {
            let mut clock = ChessClock::new(settings);
            let white = record.white_remaining_ms.map_or(settings.initial, Duration::from_millis);
            let black = record.black_remaining_ms.map_or(settings.initial, Duration::from_millis);
            clock.restore(white, black);
            if game.state.is_terminal() {
                clock.stop(now);
            } else {
                clock.start(game.side_to_move(), now);
            }
            game.clock = Some(clock);
        }

        game.generation = 0;
        Ok(game)
    }
}
