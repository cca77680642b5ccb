//! Static evaluation.
//!
//! Scores are centipawns from White's perspective unless a function says
//! otherwise. Every term is color-symmetric, so a position and its mirror
//! image (ranks flipped, colors swapped) score as exact negatives.

use crate::movegen_tables::TABLES;
use crate::movegeneration::{is_square_attacked, piece_attacks};
use crate::piece::{Color, PieceType};
use crate::position::Position;
use crate::square::Square;
use crate::utils::{extract_bits, Bitboard, FILE_A};

// Material values in centipawns (1 pawn = 100), indexed by piece type
pub const PIECE_VALUES: [i32; 6] = [
    100, // Pawn
    320, // Knight
    330, // Bishop
    500, // Rook
    900, // Queen
    0,   // King
];

// Piece-square tables for positional bonuses.
// Laid out as seen from White's side of the board: the first row is rank 8.
#[rustfmt::skip]
const PAWN_TABLE: [i32; 64] = [
    0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
    5,  5, 10, 25, 25, 10,  5,  5,
    0,  0,  0, 20, 20,  0,  0,  0,
    5, -5,-10,  0,  0,-10, -5,  5,
    5, 10, 10,-20,-20, 10, 10,  5,
    0,  0,  0,  0,  0,  0,  0,  0
];

#[rustfmt::skip]
const KNIGHT_TABLE: [i32; 64] = [
    -50,-40,-30,-30,-30,-30,-40,-50,
    -40,-20,  0,  0,  0,  0,-20,-40,
    -30,  0, 10, 15, 15, 10,  0,-30,
    -30,  5, 15, 20, 20, 15,  5,-30,
    -30,  0, 15, 20, 20, 15,  0,-30,
    -30,  5, 10, 15, 15, 10,  5,-30,
    -40,-20,  0,  5,  5,  0,-20,-40,
    -50,-40,-30,-30,-30,-30,-40,-50
];

#[rustfmt::skip]
const BISHOP_TABLE: [i32; 64] = [
    -20,-10,-10,-10,-10,-10,-10,-20,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -10,  0,  5, 10, 10,  5,  0,-10,
    -10,  5,  5, 10, 10,  5,  5,-10,
    -10,  0, 10, 10, 10, 10,  0,-10,
    -10, 10, 10, 10, 10, 10, 10,-10,
    -10,  5,  0,  0,  0,  0,  5,-10,
    -20,-10,-10,-10,-10,-10,-10,-20
];

#[rustfmt::skip]
const ROOK_TABLE: [i32; 64] = [
    0,  0,  0,  0,  0,  0,  0,  0,
    5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    0,  0,  0,  5,  5,  0,  0,  0
];

#[rustfmt::skip]
const QUEEN_TABLE: [i32; 64] = [
    -20,-10,-10, -5, -5,-10,-10,-20,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -10,  0,  5,  5,  5,  5,  0,-10,
    -5,  0,  5,  5,  5,  5,  0, -5,
    0,  0,  5,  5,  5,  5,  0, -5,
    -10,  5,  5,  5,  5,  5,  0,-10,
    -10,  0,  5,  0,  0,  0,  0,-10,
    -20,-10,-10, -5, -5,-10,-10,-20
];

#[rustfmt::skip]
const KING_MIDDLEGAME_TABLE: [i32; 64] = [
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -20,-30,-30,-40,-40,-30,-30,-20,
    -10,-20,-20,-20,-20,-20,-20,-10,
    20, 20,  0,  0,  0,  0, 20, 20,
    20, 30, 10,  0,  0, 10, 30, 20
];

// Pawn structure bonuses/penalties
const CENTRAL_PAWN_BONUS: i32 = 20; // d4, e4, d5, e5
const DOUBLED_PAWN_PENALTY: i32 = -20;
const ISOLATED_PAWN_PENALTY: i32 = -10;

const CENTRAL_SQUARES: Bitboard = 0x0000_0018_1800_0000;

// Bonus per reachable square, indexed by piece type
const MOBILITY_WEIGHTS: [i32; 6] = [0, 4, 4, 2, 1, 0];

// King safety
const PAWN_SHIELD_BONUS: i32 = 10;
const KING_ZONE_ATTACK_PENALTY: i32 = -8;

pub struct Evaluation<'a> {
    position: &'a Position,
}

impl<'a> Evaluation<'a> {
    pub fn new(position: &'a Position) -> Self {
        Evaluation { position }
    }

    /// Evaluates a chess position from White's perspective.
    /// Returns a score in centipawns, positive for White advantage, negative for Black advantage.
    pub fn evaluate_position(&self) -> i32 {
        self.side_score(Color::White) - self.side_score(Color::Black)
    }

    fn side_score(&self, color: Color) -> i32 {
        self.evaluate_material(color)
            + self.evaluate_piece_positions(color)
            + self.evaluate_pawn_structure(color)
            + self.evaluate_mobility(color)
            + self.evaluate_king_safety(color)
    }

    fn evaluate_material(&self, color: Color) -> i32 {
        PieceType::ALL
            .iter()
            .map(|pt| {
                self.position.pieces(*pt, color).count_ones() as i32 * PIECE_VALUES[pt.index()]
            })
            .sum()
    }

    /// Evaluates piece positions using piece-square tables
    fn evaluate_piece_positions(&self, color: Color) -> i32 {
        let mut score = 0;
        for piece_type in PieceType::ALL {
            let table = match piece_type {
                PieceType::Pawn => &PAWN_TABLE,
                PieceType::Knight => &KNIGHT_TABLE,
                PieceType::Bishop => &BISHOP_TABLE,
                PieceType::Rook => &ROOK_TABLE,
                PieceType::Queen => &QUEEN_TABLE,
                PieceType::King => &KING_MIDDLEGAME_TABLE,
            };
            for square in extract_bits(self.position.pieces(piece_type, color)) {
                score += table[table_index(square, color)];
            }
        }
        score
    }

    fn evaluate_pawn_structure(&self, color: Color) -> i32 {
        let pawns = self.position.pieces(PieceType::Pawn, color);
        let mut score = (pawns & CENTRAL_SQUARES).count_ones() as i32 * CENTRAL_PAWN_BONUS;

        for file in 0..8 {
            let file_mask = FILE_A << file;
            let on_file = (pawns & file_mask).count_ones() as i32;
            if on_file == 0 {
                continue;
            }
            if on_file > 1 {
                score += DOUBLED_PAWN_PENALTY * (on_file - 1);
            }

            let mut adjacent = 0;
            if file > 0 {
                adjacent |= FILE_A << (file - 1);
            }
            if file < 7 {
                adjacent |= FILE_A << (file + 1);
            }
            if pawns & adjacent == 0 {
                score += ISOLATED_PAWN_PENALTY;
            }
        }

        score
    }

    fn evaluate_mobility(&self, color: Color) -> i32 {
        let own = self.position.color_occupancy(color);
        let occupancy = self.position.occupancy();
        let mut score = 0;
        let sliders_and_knights =
            [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen];
        for piece_type in sliders_and_knights {
            for square in extract_bits(self.position.pieces(piece_type, color)) {
                let reach = piece_attacks(piece_type, square, occupancy) & !own;
                score += reach.count_ones() as i32 * MOBILITY_WEIGHTS[piece_type.index()];
            }
        }
        score
    }

    /// Pawn shield in front of the king, minus enemy pressure on the squares around it.
    fn evaluate_king_safety(&self, color: Color) -> i32 {
        let king = match self.position.king_square(color) {
            Some(king) => king,
            None => return 0,
        };
        let forward = match color {
            Color::White => 1,
            Color::Black => -1,
        };

        let pawns = self.position.pieces(PieceType::Pawn, color);
        let shield = (-1..=1)
            .filter_map(|df| king.offset(df, forward))
            .filter(|square| pawns & square.bit() != 0)
            .count() as i32;

        let enemy = color.opposite();
        let attacked = extract_bits(TABLES.king_attacks[king.index()])
            .filter(|square| is_square_attacked(self.position, Square::from_index(*square), enemy))
            .count() as i32;

        shield * PAWN_SHIELD_BONUS + attacked * KING_ZONE_ATTACK_PENALTY
    }
}

fn table_index(square: usize, color: Color) -> usize {
    match color {
        Color::White => square ^ 56,
        Color::Black => square,
    }
}

/// White-perspective score of `position`.
pub fn evaluate(position: &Position) -> i32 {
    Evaluation::new(position).evaluate_position()
}

/// Score from the side to move's perspective, as negamax wants it.
pub fn evaluate_relative(position: &Position) -> i32 {
    let score = evaluate(position);
    match position.active_color() {
        Color::White => score,
        Color::Black => -score,
    }
}
