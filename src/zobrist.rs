use once_cell::sync::Lazy;
use rand::prelude::*;

use crate::piece::{Color, PieceType};
use crate::position::Position;
use crate::utils::extract_bits;

pub static ZOBRIST: Lazy<Zobrist> = Lazy::new(Zobrist::new);

#[derive(Clone, Debug)]
pub struct Zobrist {
    piece_square: [[u64; 64]; 12], // 6 pieces * 2 colors * 64 squares
    black_to_move: u64,
    castling_rights: [u64; 16],
    en_passant_file: [u64; 8],
}

impl Zobrist {
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(0xDEADBEEF); // Fixed seed for reproducibility
        let mut z = Zobrist {
            piece_square: [[0; 64]; 12],
            black_to_move: rng.gen(),
            castling_rights: [0; 16],
            en_passant_file: [0; 8],
        };

        for squares in z.piece_square.iter_mut() {
            for key in squares.iter_mut() {
                *key = rng.gen();
            }
        }
        for key in z.castling_rights.iter_mut() {
            *key = rng.gen();
        }
        for key in z.en_passant_file.iter_mut() {
            *key = rng.gen();
        }

        z
    }

    pub fn hash_position(&self, pos: &Position) -> u64 {
        let mut hash = 0;

        for color in Color::ALL {
            for piece_type in PieceType::ALL {
                let index = piece_index(piece_type, color);
                for square in extract_bits(pos.pieces(piece_type, color)) {
                    hash ^= self.piece_square[index][square];
                }
            }
        }

        if pos.active_color() == Color::Black {
            hash ^= self.black_to_move;
        }

        hash ^= self.castling_rights[pos.castling_rights().bits() as usize];

        if let Some(ep_square) = pos.en_passant() {
            hash ^= self.en_passant_file[ep_square.file() as usize];
        }

        hash
    }
}

impl Default for Zobrist {
    fn default() -> Self {
        Self::new()
    }
}

fn piece_index(piece_type: PieceType, color: Color) -> usize {
    piece_type.index() * 2 + color.index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess_move::{Move, MoveFlag};

    #[test]
    fn test_same_position_same_hash() {
        let zobrist = Zobrist::new();
        let start = Position::new();
        assert_eq!(zobrist.hash_position(&start), zobrist.hash_position(&start));
        // Keys are seeded, so separate instances agree
        assert_eq!(zobrist.hash_position(&start), ZOBRIST.hash_position(&start));
    }

    #[test]
    fn test_different_positions_different_hash() {
        let pos1 = Position::new();
        let knight_out = Move::new("g1".parse().unwrap(), "f3".parse().unwrap(), MoveFlag::Normal);
        let pos2 = pos1.apply_move(knight_out);
        assert_ne!(pos1.hash(), pos2.hash());
    }

    #[test]
    fn test_transposed_move_orders_share_hash() {
        let m = |from: &str, to: &str| {
            Move::new(from.parse().unwrap(), to.parse().unwrap(), MoveFlag::Normal)
        };
        let a = Position::new()
            .apply_move(m("g1", "f3"))
            .apply_move(m("g8", "f6"))
            .apply_move(m("b1", "c3"));
        let b = Position::new()
            .apply_move(m("b1", "c3"))
            .apply_move(m("g8", "f6"))
            .apply_move(m("g1", "f3"));
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_color_affects_hash() {
        let white = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        let black = Position::from_fen("8/8/8/4k3/8/8/8/4K3 b - - 0 1").unwrap();
        assert_ne!(white.hash(), black.hash());
    }
}
