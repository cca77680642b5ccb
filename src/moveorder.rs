use crate::chess_move::Move;
use crate::evaluation::PIECE_VALUES;
use crate::piece::PieceType;
use crate::position::Position;

// Move scoring constants
const HASH_MOVE_SCORE: i32 = 1_000_000;
const PROMOTION_SCORE_BASE: i32 = 100_000;
const CAPTURE_SCORE_BASE: i32 = 10_000;

#[derive(Clone, Debug, Default)]
pub struct MoveOrderer {
    move_scores: Vec<(Move, i32)>,
}

impl MoveOrderer {
    pub fn new() -> Self {
        MoveOrderer { move_scores: Vec::new() }
    }

    /// Score and sort moves: hash move first, then promotions, then captures
    /// by MVV-LVA, then quiet moves in generation order.
    pub fn order_moves(
        &mut self,
        position: &Position,
        moves: &[Move],
        hash_move: Option<Move>,
    ) -> Vec<Move> {
        self.move_scores.clear();

        for &mov in moves {
            let score = if Some(mov) == hash_move {
                HASH_MOVE_SCORE
            } else {
                score_move(position, mov)
            };
            self.move_scores.push((mov, score));
        }

        // Stable, so equal scores keep generation order
        self.move_scores.sort_by(|a, b| b.1.cmp(&a.1));

        self.move_scores.iter().map(|(mov, _)| *mov).collect()
    }
}

pub fn score_move(position: &Position, mov: Move) -> i32 {
    let mut score = 0;

    if let Some(promotion) = mov.promotion {
        score += PROMOTION_SCORE_BASE + PIECE_VALUES[promotion.index()];
    }

    if mov.is_capture() {
        // MVV-LVA scoring: Most Valuable Victim - Least Valuable Attacker
        let victim = position
            .piece_at(mov.to)
            .map(|piece| piece.piece_type)
            .unwrap_or(PieceType::Pawn);
        let attacker = position
            .piece_at(mov.from)
            .map(|piece| piece.piece_type)
            .unwrap_or(PieceType::Pawn);
        score += CAPTURE_SCORE_BASE + PIECE_VALUES[victim.index()] * 10
            - PIECE_VALUES[attacker.index()] / 10;
    }

    score
}
