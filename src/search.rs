//! Computer opponent: iterative-deepening negamax with alpha-beta pruning,
//! a quiescence search over captures and a transposition table.
//!
//! A `Search` is built per request and dropped afterwards; nothing carries
//! over between calls. Given the same position, history, limits and seed it
//! returns the same move, so long as the time limit does not cut it short.

use std::time::{Duration, Instant};

use log::debug;
use rand::prelude::*;

use crate::chess_move::Move;
use crate::config::SearchConfig;
use crate::evaluation::evaluate_relative;
use crate::movegeneration::{is_in_check, legal_moves};
use crate::moveorder::MoveOrderer;
use crate::player::Difficulty;
use crate::position::Position;
use crate::transposition::{NodeType, TranspositionTable};

const INFINITY: i32 = 100_000;
pub const MATE_SCORE: i32 = 99_000;
const MAX_PLY: i32 = 64;
const MAX_QUIESCENCE_DEPTH: i32 = 8;
const TIME_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: u32,
    pub max_time: Duration,
    /// Root moves within this many centipawns of the best are candidates.
    pub noise_margin: i32,
}

impl SearchLimits {
    pub fn for_difficulty(difficulty: Difficulty, config: &SearchConfig) -> SearchLimits {
        SearchLimits {
            max_depth: difficulty.search_depth().min(config.max_depth).max(1),
            max_time: config.think_time() * difficulty.time_share() / 10,
            noise_margin: difficulty.noise_margin(),
        }
    }

    /// Caps the thinking time at the share of the mover's clock one move
    /// may spend.
    pub fn within_clock(self, remaining: Duration, increment: Duration) -> SearchLimits {
        SearchLimits {
            max_time: self.max_time.min(clock_budget(remaining, increment)),
            ..self
        }
    }
}

/// Time one move may take with `remaining` on the clock. Never more than
/// half of what is left.
pub fn clock_budget(remaining: Duration, increment: Duration) -> Duration {
    (remaining / 30 + increment / 2).min(remaining / 2)
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_depth: 4,
            max_time: Duration::from_secs(5),
            noise_margin: 0,
        }
    }
}

pub struct Search {
    limits: SearchLimits,
    tt: TranspositionTable,
    move_orderer: MoveOrderer,
    rng: StdRng,
    nodes_searched: u64,
    start_time: Instant,
    stopped: bool,
    // Hashes of the game so far followed by the current search path
    path: Vec<u64>,
}

impl Search {
    pub fn new(limits: SearchLimits, tt_size_mb: usize, seed: u64) -> Self {
        Self {
            limits,
            tt: TranspositionTable::new(tt_size_mb),
            move_orderer: MoveOrderer::new(),
            rng: StdRng::seed_from_u64(seed),
            nodes_searched: 0,
            start_time: Instant::now(),
            stopped: false,
            path: Vec::new(),
        }
    }

    pub fn nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    /// Find the best move in the current position.
    ///
    /// `history` holds the hashes of the positions already reached in the
    /// game, oldest first; a move back into one of them scores as a draw.
    /// Returns `None` only when there is no legal move.
    pub fn find_best_move(&mut self, position: &Position, history: &[u64]) -> Option<Move> {
        self.nodes_searched = 0;
        self.start_time = Instant::now();
        self.stopped = false;
        self.tt.new_search();

        let root_hash = position.hash();
        self.path.clear();
        self.path.extend_from_slice(history);
        if self.path.last() != Some(&root_hash) {
            self.path.push(root_hash);
        }

        let moves = legal_moves(position);
        let mut best_move = *moves.first()?;
        if moves.len() == 1 {
            return Some(best_move);
        }

        let margin = self.limits.noise_margin.max(0);
        let mut root_scores: Vec<(Move, i32)> = Vec::new();

        for depth in 1..=self.limits.max_depth as i32 {
            let ordered = self.move_orderer.order_moves(position, &moves, Some(best_move));
            let mut iteration: Vec<(Move, i32)> = Vec::with_capacity(ordered.len());
            let mut alpha = -INFINITY;

            for mov in ordered {
                // Widened window so near-best moves get exact scores for the noise pick
                let window = if alpha == -INFINITY { -INFINITY } else { alpha - margin - 1 };
                let child = position.apply_move(mov);
                let score = -self.negamax(&child, depth - 1, -INFINITY, -window, 1);
                if self.stopped {
                    break;
                }
                iteration.push((mov, score));
                alpha = alpha.max(score);
            }

            if self.stopped {
                debug!(
                    "depth {} cut off by time after {} nodes, discarded",
                    depth, self.nodes_searched
                );
                break;
            }

            // Stable sort keeps the ordering among equal scores
            iteration.sort_by(|a, b| b.1.cmp(&a.1));
            best_move = iteration[0].0;
            let best_score = iteration[0].1;
            root_scores = iteration;

            debug!(
                "depth {} best {} score {} nodes {} elapsed {:?}",
                depth,
                best_move,
                best_score,
                self.nodes_searched,
                self.start_time.elapsed()
            );

            if best_score.abs() >= MATE_SCORE - MAX_PLY {
                break;
            }
        }

        if margin > 0 && !root_scores.is_empty() {
            let best_score = root_scores[0].1;
            let candidates: Vec<Move> = root_scores
                .iter()
                .filter(|(_, score)| *score >= best_score - margin)
                .map(|(mov, _)| *mov)
                .collect();
            if let Some(choice) = candidates.choose(&mut self.rng) {
                best_move = *choice;
            }
        }

        Some(best_move)
    }

    fn out_of_time(&mut self) -> bool {
        if !self.stopped
            && self.nodes_searched % TIME_CHECK_INTERVAL == 0
            && self.start_time.elapsed() >= self.limits.max_time
        {
            self.stopped = true;
        }
        self.stopped
    }

    fn is_repetition(&self, hash: u64) -> bool {
        self.path.iter().rev().skip(1).any(|seen| *seen == hash)
    }

    /// Alpha-beta search implementation
    fn negamax(&mut self, position: &Position, depth: i32, alpha: i32, beta: i32, ply: i32) -> i32 {
        self.nodes_searched += 1;
        if self.out_of_time() {
            return 0;
        }

        let hash = position.hash();
        self.path.push(hash);
        let score = self.negamax_inner(position, hash, depth, alpha, beta, ply);
        self.path.pop();
        score
    }

    fn negamax_inner(
        &mut self,
        position: &Position,
        hash: u64,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        ply: i32,
    ) -> i32 {
        if position.halfmove_clock() >= 100
            || self.is_repetition(hash)
            || position.is_insufficient_material()
        {
            return 0;
        }

        if ply >= MAX_PLY {
            return evaluate_relative(position);
        }

        if depth <= 0 {
            return self.quiescence(position, alpha, beta, ply, 0);
        }

        let mut hash_move = None;
        if let Some(entry) = self.tt.probe(hash) {
            hash_move = entry.best_move;
            if entry.depth >= depth {
                let value = score_from_tt(entry.value, ply);
                match entry.flag {
                    NodeType::Exact => return value,
                    NodeType::Alpha if value <= alpha => return value,
                    NodeType::Beta if value >= beta => return value,
                    _ => {}
                }
            }
        }

        let moves = legal_moves(position);
        if moves.is_empty() {
            if is_in_check(position, position.active_color()) {
                return -(MATE_SCORE - ply); // Prefer faster mate
            }
            return 0; // Stalemate
        }

        let original_alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;
        let ordered = self.move_orderer.order_moves(position, &moves, hash_move);

        for mov in ordered {
            let child = position.apply_move(mov);
            let score = -self.negamax(&child, depth - 1, -beta, -alpha, ply + 1);
            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                best_move = Some(mov);
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                break;
            }
        }

        let flag = if best_score <= original_alpha {
            NodeType::Alpha
        } else if best_score >= beta {
            NodeType::Beta
        } else {
            NodeType::Exact
        };
        self.tt.store(hash, depth, flag, score_to_tt(best_score, ply), best_move);

        best_score
    }

    /// Quiescence search to handle tactical sequences
    fn quiescence(
        &mut self,
        position: &Position,
        mut alpha: i32,
        beta: i32,
        ply: i32,
        depth: i32,
    ) -> i32 {
        self.nodes_searched += 1;
        if self.out_of_time() {
            return 0;
        }

        let moves = legal_moves(position);
        if moves.is_empty() {
            if is_in_check(position, position.active_color()) {
                return -(MATE_SCORE - ply);
            }
            return 0;
        }

        let stand_pat = evaluate_relative(position);
        if depth >= MAX_QUIESCENCE_DEPTH || ply >= MAX_PLY || stand_pat >= beta {
            return stand_pat;
        }
        alpha = alpha.max(stand_pat);

        let tactical: Vec<Move> = moves
            .into_iter()
            .filter(|mov| mov.is_capture() || mov.is_promotion())
            .collect();
        let ordered = self.move_orderer.order_moves(position, &tactical, None);

        let mut best_score = stand_pat;
        for mov in ordered {
            let child = position.apply_move(mov);
            let score = -self.quiescence(&child, -beta, -alpha, ply + 1, depth + 1);
            if self.stopped {
                return 0;
            }
            if score > best_score {
                best_score = score;
            }
            if score >= beta {
                return score;
            }
            alpha = alpha.max(score);
        }

        best_score
    }
}

// Mate scores are stored relative to the node, not the root
fn score_to_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_SCORE - MAX_PLY {
        score + ply
    } else if score <= -(MATE_SCORE - MAX_PLY) {
        score - ply
    } else {
        score
    }
}

fn score_from_tt(score: i32, ply: i32) -> i32 {
    if score >= MATE_SCORE - MAX_PLY {
        score - ply
    } else if score <= -(MATE_SCORE - MAX_PLY) {
        score + ply
    } else {
        score
    }
}
