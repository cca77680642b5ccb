//! Board registry and match orchestration.
//!
//! `ChessService` maps board names to at most one game each. Every game
//! sits behind its own mutex, so games never contend with each other.
//! Lock order is challenge book, then registry, then game; nothing takes an
//! earlier lock while holding a later one. Computer moves are searched on a background thread
//! against a copy of the board and applied only if the game has not changed
//! in the meantime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{info, warn};

use crate::challenge::ChallengeBook;
use crate::chess_move::{Move, MoveRequest};
use crate::clock::{TimeControlSettings, TimeSource};
use crate::config::EngineConfig;
use crate::error::{ChessError, Result};
use crate::game::{Game, GameId, GameSnapshot, GameState};
use crate::piece::{Color, PieceType};
use crate::player::{Difficulty, Player, PlayerId};
use crate::record::GameRecord;
use crate::search::{Search, SearchLimits};
use crate::square::Square;

pub type GameHandle = Arc<Mutex<Game>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Things the host should tell players about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    GameStarted {
        board: String,
        game: GameId,
    },
    MovePlayed {
        board: String,
        game: GameId,
        color: Color,
        mv: String,
    },
    GameEnded {
        board: String,
        game: GameId,
        state: GameState,
        record: GameRecord,
    },
    ChallengeExpired {
        challenger: PlayerId,
        challengee: PlayerId,
        board: String,
    },
    ComputerThinking {
        board: String,
        game: GameId,
    },
    ComputerMoveDiscarded {
        board: String,
        game: GameId,
    },
}

fn ended_event(board: &str, game: &Game, now: Instant) -> MatchEvent {
    MatchEvent::GameEnded {
        board: board.to_string(),
        game: game.id(),
        state: game.state(),
        record: game.to_record(now),
    }
}

/// Moves `color` may make from `square` right now.
fn movable_from(game: &Game, color: Color, square: Square) -> Vec<Move> {
    if game.side_to_move() != color {
        return Vec::new();
    }
    game.legal_moves_from(square)
}

/// What a computer worker needs from the service.
#[derive(Clone)]
struct ComputerContext {
    config: EngineConfig,
    time: Arc<dyn TimeSource>,
    events: Arc<Mutex<Vec<MatchEvent>>>,
}

impl ComputerContext {
    fn seed_for(&self, generation: u64) -> u64 {
        match self.config.seed {
            Some(seed) => seed.wrapping_add(generation),
            None => rand::random(),
        }
    }

    fn emit(&self, event: MatchEvent) {
        lock(&self.events).push(event);
    }

    /// Plays computer moves for as long as the computer is to move.
    /// Returns the last move it applied.
    fn run(&self, board: &str, handle: &GameHandle) -> Option<Move> {
        let mut last = None;
        let mut announced = true;
        loop {
            let (id, position, history, generation, color, difficulty, clock) = {
                let game = lock(handle);
                if game.state() != GameState::InProgress {
                    break;
                }
                let color = game.side_to_move();
                let difficulty = match game.player(color) {
                    Player::Computer { difficulty } => difficulty,
                    Player::Human { .. } => break,
                };
                let clock = game.time_control().zip(game.remaining(color, self.time.now()));
                (
                    game.id(),
                    game.board().clone(),
                    game.history_hashes(),
                    game.generation(),
                    color,
                    difficulty,
                    clock,
                )
            };

            // The first turn was announced when the worker was scheduled
            if !announced {
                self.emit(MatchEvent::ComputerThinking {
                    board: board.to_string(),
                    game: id,
                });
            }
            announced = false;

            let thinking_since = Instant::now();
            let mut limits = SearchLimits::for_difficulty(difficulty, &self.config.search);
            if let Some((settings, remaining)) = clock {
                limits = limits.within_clock(remaining, settings.increment);
            }
            let seed = self.seed_for(generation);
            let mut search = Search::new(limits, self.config.search.tt_size_mb, seed);
            let best = search.find_best_move(&position, &history);

            let min_think = self.config.search.min_think_time().min(limits.max_time);
            let elapsed = thinking_since.elapsed();
            if elapsed < min_think {
                thread::sleep(min_think - elapsed);
            }

            let Some(mov) = best else { break };
            let mut game = lock(handle);
            if game.generation() != generation || game.state() != GameState::InProgress {
                warn!("discarding stale computer move {} on board '{}'", mov, board);
                self.emit(MatchEvent::ComputerMoveDiscarded {
                    board: board.to_string(),
                    game: game.id(),
                });
                break;
            }

            let now = self.time.now();
            match game.play(color, mov, now) {
                Ok(mov) => {
                    self.emit(MatchEvent::MovePlayed {
                        board: board.to_string(),
                        game: game.id(),
                        color,
                        mv: mov.to_string(),
                    });
                    last = Some(mov);
                }
                Err(err) => warn!("computer move {} rejected on board '{}': {}", mov, board, err),
            }
            if game.state().is_terminal() {
                self.emit(ended_event(board, &game, now));
                break;
            }
        }
        last
    }
}

pub struct ChessService {
    config: EngineConfig,
    time: Arc<dyn TimeSource>,
    boards: Mutex<HashMap<String, Option<GameHandle>>>,
    challenges: Mutex<ChallengeBook>,
    events: Arc<Mutex<Vec<MatchEvent>>>,
    computer_jobs: Mutex<HashMap<String, JoinHandle<Option<Move>>>>,
}

impl ChessService {
    pub fn new(config: EngineConfig, time: Arc<dyn TimeSource>) -> Self {
        let challenges = ChallengeBook::new(config.challenge_timeout());
        ChessService {
            config,
            time,
            boards: Mutex::new(HashMap::new()),
            challenges: Mutex::new(challenges),
            events: Arc::new(Mutex::new(Vec::new())),
            computer_jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn emit(&self, event: MatchEvent) {
        lock(&self.events).push(event);
    }

    pub fn drain_events(&self) -> Vec<MatchEvent> {
        std::mem::take(&mut *lock(&self.events))
    }

    pub fn create_board(&self, name: &str) -> Result<()> {
        let mut boards = lock(&self.boards);
        if boards.contains_key(name) {
            return Err(ChessError::BoardAlreadyExists(name.to_string()));
        }
        boards.insert(name.to_string(), None);
        info!("created board '{}'", name);
        Ok(())
    }

    /// Removes the board, abandoning any game still running on it.
    pub fn delete_board(&self, name: &str) -> Result<()> {
        let slot = lock(&self.boards)
            .remove(name)
            .ok_or_else(|| ChessError::NoSuchBoard(name.to_string()))?;
        lock(&self.challenges).remove_for_board(name);
        if let Some(handle) = slot {
            self.abandon_handle(name, &handle);
        }
        info!("deleted board '{}'", name);
        Ok(())
    }

    /// Clears the board, abandoning any game still running on it.
    pub fn reset_board(&self, name: &str) -> Result<()> {
        let slot = {
            let mut boards = lock(&self.boards);
            let slot = boards
                .get_mut(name)
                .ok_or_else(|| ChessError::NoSuchBoard(name.to_string()))?;
            slot.take()
        };
        if let Some(handle) = slot {
            self.abandon_handle(name, &handle);
        }
        info!("reset board '{}'", name);
        Ok(())
    }

    fn abandon_handle(&self, board: &str, handle: &GameHandle) {
        let mut game = lock(handle);
        let now = self.time.now();
        if game.abandon(now).is_ok() {
            self.emit(ended_event(board, &game, now));
        }
    }

    pub fn boards(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.boards).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn game(&self, board: &str) -> Option<GameHandle> {
        lock(&self.boards).get(board).cloned().flatten()
    }

    pub fn snapshot(&self, board: &str) -> Result<Option<GameSnapshot>> {
        let handle = {
            let boards = lock(&self.boards);
            boards
                .get(board)
                .ok_or_else(|| ChessError::NoSuchBoard(board.to_string()))?
                .clone()
        };
        Ok(handle.map(|handle| lock(&handle).snapshot(self.time.now())))
    }

    fn game_handles(&self) -> Vec<(String, GameHandle)> {
        lock(&self.boards)
            .iter()
            .filter_map(|(name, slot)| slot.clone().map(|handle| (name.clone(), handle)))
            .collect()
    }

    /// The board and game `player` is currently playing on.
    fn find_player_game(&self, player: PlayerId) -> Option<(String, GameHandle, Color)> {
        self.game_handles().into_iter().find_map(|(name, handle)| {
            let color = {
                let game = lock(&handle);
                if game.state().is_terminal() {
                    None
                } else {
                    game.color_of(player)
                }
            };
            color.map(|color| (name, handle, color))
        })
    }

    fn player_game(&self, player: PlayerId) -> Result<(String, GameHandle, Color)> {
        self.find_player_game(player).ok_or(ChessError::NotInGame(player))
    }

    pub fn is_in_game(&self, player: PlayerId) -> bool {
        self.find_player_game(player).is_some()
    }

    fn check_board_free(boards: &HashMap<String, Option<GameHandle>>, board: &str) -> Result<()> {
        match boards.get(board) {
            None => Err(ChessError::NoSuchBoard(board.to_string())),
            Some(Some(handle)) if !lock(handle).state().is_terminal() => {
                Err(ChessError::BoardOccupied(board.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Puts a started game on the board after checking, under the registry
    /// lock, that the board and both humans are free. A busy `caller` gets
    /// `AlreadyInGame`, a busy opponent `OpponentAlreadyInGame`.
    fn install(&self, board: &str, game: Game, caller: Option<PlayerId>) -> Result<GameHandle> {
        let mut boards = lock(&self.boards);
        Self::check_board_free(&boards, board)?;

        for color in Color::ALL {
            let Some(id) = game.player(color).id() else { continue };
            let busy = boards.values().flatten().any(|handle| {
                let other = lock(handle);
                !other.state().is_terminal() && other.color_of(id).is_some()
            });
            if busy {
                return Err(if caller.map_or(true, |caller| caller == id) {
                    ChessError::AlreadyInGame(id)
                } else {
                    ChessError::OpponentAlreadyInGame(id)
                });
            }
        }

        let id = game.id();
        let handle = Arc::new(Mutex::new(game));
        boards.insert(board.to_string(), Some(Arc::clone(&handle)));
        drop(boards);

        info!("game {} is now on board '{}'", id, board);
        self.emit(MatchEvent::GameStarted {
            board: board.to_string(),
            game: id,
        });
        Ok(handle)
    }

    pub fn challenge(
        &self,
        challenger: PlayerId,
        challengee: PlayerId,
        board: &str,
        challenger_color: Color,
        time_control: Option<TimeControlSettings>,
    ) -> Result<()> {
        Self::check_board_free(&lock(&self.boards), board)?;
        if self.is_in_game(challenger) {
            return Err(ChessError::AlreadyInGame(challenger));
        }
        if self.is_in_game(challengee) {
            return Err(ChessError::OpponentAlreadyInGame(challengee));
        }
        lock(&self.challenges).create(
            challenger,
            challengee,
            challenger_color,
            time_control,
            board,
            self.time.now(),
        )?;
        Ok(())
    }

    pub fn accept(&self, challengee: PlayerId, challenger: PlayerId) -> Result<GameId> {
        let now = self.time.now();
        // The book stays locked until the game is on the board, and the
        // challenge only leaves it once that succeeded
        let mut book = lock(&self.challenges);
        let challenge = book
            .get(challenger, challengee)
            .filter(|challenge| !challenge.is_expired(book.timeout(), now))
            .cloned()
            .ok_or(ChessError::NoSuchChallenge)?;
        let board = challenge.board.clone();
        let game = challenge.into_game(now)?;
        let id = game.id();
        self.install(&board, game, Some(challengee))?;
        book.accept(challenger, challengee, now)?;
        Ok(id)
    }

    pub fn deny(&self, challengee: PlayerId, challenger: PlayerId) -> Result<()> {
        lock(&self.challenges).deny(challenger, challengee, self.time.now())?;
        Ok(())
    }

    /// Starts a game against the computer right away, without a handshake.
    pub fn challenge_cpu(
        &self,
        player: PlayerId,
        board: &str,
        player_color: Color,
        difficulty: Difficulty,
        time_control: Option<TimeControlSettings>,
    ) -> Result<GameId> {
        let human = Player::human(player);
        let computer = Player::computer(difficulty);
        let (white, black) = match player_color {
            Color::White => (human, computer),
            Color::Black => (computer, human),
        };
        self.start_game(board, Game::new(white, black, time_control), Some(player))
    }

    /// Starts a computer-vs-computer game.
    pub fn start_cpu_match(
        &self,
        board: &str,
        white: Difficulty,
        black: Difficulty,
        time_control: Option<TimeControlSettings>,
    ) -> Result<GameId> {
        let game = Game::new(Player::computer(white), Player::computer(black), time_control);
        self.start_game(board, game, None)
    }

    fn start_game(&self, board: &str, mut game: Game, starter: Option<PlayerId>) -> Result<GameId> {
        game.start(self.time.now())?;
        let id = game.id();
        let handle = self.install(board, game, starter)?;
        self.schedule_computer(board, &handle);
        Ok(id)
    }

    /// Spawns a worker if the computer is to move.
    fn schedule_computer(&self, board: &str, handle: &GameHandle) {
        let computer_game = {
            let game = lock(handle);
            let computer_to_move = game.player(game.side_to_move()).is_computer();
            (game.state() == GameState::InProgress && computer_to_move).then(|| game.id())
        };
        let Some(id) = computer_game else { return };
        self.emit(MatchEvent::ComputerThinking {
            board: board.to_string(),
            game: id,
        });

        let context = ComputerContext {
            config: self.config.clone(),
            time: Arc::clone(&self.time),
            events: Arc::clone(&self.events),
        };
        let name = board.to_string();
        let handle = Arc::clone(handle);
        let job = thread::spawn(move || context.run(&name, &handle));
        lock(&self.computer_jobs).insert(board.to_string(), job);
    }

    /// Blocks until the computer worker on `board`, if any, is done.
    pub fn wait_for_computer(&self, board: &str) -> Option<Move> {
        let job = lock(&self.computer_jobs).remove(board)?;
        job.join().ok().flatten()
    }

    /// The game on `board`, which `player` must be playing in.
    fn board_game(&self, board: &str, player: PlayerId) -> Result<(GameHandle, Color)> {
        let handle = lock(&self.boards)
            .get(board)
            .ok_or_else(|| ChessError::NoSuchBoard(board.to_string()))?
            .clone()
            .ok_or(ChessError::NotInThisGame(player))?;
        let color = lock(&handle).color_of(player).ok_or(ChessError::NotInThisGame(player))?;
        Ok((handle, color))
    }

    /// Runs `action` on a game as `player` and reports the outcome.
    fn with_game<T>(
        &self,
        board: &str,
        handle: &GameHandle,
        color: Color,
        player: PlayerId,
        action: impl FnOnce(&mut Game, Color, Instant) -> Result<T>,
    ) -> Result<T> {
        let now = self.time.now();
        let result = {
            let mut game = lock(handle);
            let was_terminal = game.state().is_terminal();
            let result = action(&mut game, color, now);
            if !was_terminal && game.state().is_terminal() {
                self.emit(ended_event(board, &game, now));
            }
            result
        };
        if let Err(err) = &result {
            warn!("rejected request from {} on board '{}': {}", player, board, err);
        }
        result
    }

    fn with_player_game<T>(
        &self,
        player: PlayerId,
        action: impl FnOnce(&mut Game, Color, Instant) -> Result<T>,
    ) -> Result<T> {
        let (board, handle, color) = self.player_game(player)?;
        self.with_game(&board, &handle, color, player, action)
    }

    fn play_request(
        &self,
        board: &str,
        handle: &GameHandle,
        color: Color,
        player: PlayerId,
        request: MoveRequest,
    ) -> Result<Move> {
        let mov = self.with_game(board, handle, color, player, |game, color, now| {
            let mov = game.make_move(color, request.from, request.to, request.promotion, now)?;
            self.emit(MatchEvent::MovePlayed {
                board: board.to_string(),
                game: game.id(),
                color,
                mv: mov.to_string(),
            });
            Ok(mov)
        })?;
        self.schedule_computer(board, handle);
        Ok(mov)
    }

    /// Plays a move given as `e2e4` or `e7e8q`.
    pub fn make_move(&self, player: PlayerId, coordinates: &str) -> Result<Move> {
        let request = MoveRequest::parse(coordinates)?;
        let (board, handle, color) = self.player_game(player)?;
        self.play_request(&board, &handle, color, player, request)
    }

    /// Plays a move on a named board. Players outside that board's game get
    /// `NotInThisGame`.
    pub fn make_move_on(&self, board: &str, player: PlayerId, coordinates: &str) -> Result<Move> {
        let request = MoveRequest::parse(coordinates)?;
        let (handle, color) = self.board_game(board, player)?;
        self.play_request(board, &handle, color, player, request)
    }

    pub fn set_promotion_choice(&self, player: PlayerId, piece: PieceType) -> Result<()> {
        self.with_player_game(player, |game, color, _| game.set_promotion_choice(color, piece))
    }

    pub fn forfeit(&self, player: PlayerId) -> Result<()> {
        self.with_player_game(player, |game, color, now| game.forfeit(color, now))
    }

    pub fn offer_draw(&self, player: PlayerId) -> Result<()> {
        self.with_player_game(player, |game, color, _| game.offer_draw(color))
    }

    pub fn accept_draw(&self, player: PlayerId) -> Result<()> {
        self.with_player_game(player, |game, color, now| game.accept_draw(color, now))
    }

    /// Legal destinations for the player's piece on `square`, e.g. `"e2"`.
    pub fn legal_moves(&self, player: PlayerId, square: &str) -> Result<Vec<Move>> {
        let square: Square = square.parse()?;
        self.with_player_game(player, |game, color, _| Ok(movable_from(game, color, square)))
    }

    /// Like `legal_moves`, addressed to a named board.
    pub fn legal_moves_on(&self, board: &str, player: PlayerId, square: &str) -> Result<Vec<Move>> {
        let square: Square = square.parse()?;
        let (handle, color) = self.board_game(board, player)?;
        self.with_game(board, &handle, color, player, |game, color, _| {
            Ok(movable_from(game, color, square))
        })
    }

    /// The player left: abandon their game and drop their challenges.
    pub fn abandon_player(&self, player: PlayerId) {
        lock(&self.challenges).remove_involving(player);
        if let Some((board, handle, _)) = self.find_player_game(player) {
            info!("{} left, abandoning the game on board '{}'", player, board);
            self.abandon_handle(&board, &handle);
        }
    }

    /// Flag-fall and challenge expiry. Called by the host scheduler.
    pub fn tick(&self) {
        let now = self.time.now();
        for (board, handle) in self.game_handles() {
            let mut game = lock(&handle);
            if game.tick(now).is_some() {
                self.emit(ended_event(&board, &game, now));
            }
        }

        let expired = lock(&self.challenges).expire_due(now);
        for challenge in expired {
            info!("challenge from {} to {} expired", challenge.challenger, challenge.challengee);
            self.emit(MatchEvent::ChallengeExpired {
                challenger: challenge.challenger,
                challengee: challenge.challengee,
                board: challenge.board,
            });
        }
    }
}
