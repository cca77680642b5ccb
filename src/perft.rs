//! Performance test: counts leaf nodes of the legal move tree.
//!
//! Used as a regression harness for move generation against the published
//! reference counts.

use crate::movegeneration::legal_moves;
use crate::position::Position;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Perft {
    pub nodes: u64,
    pub captures: u64,
    pub en_passants: u64,
    pub castles: u64,
    pub promotions: u64,
}

impl Perft {
    pub fn new() -> Self {
        Perft::default()
    }

    /// Walks the tree to `depth` plies and returns the leaf count. The move
    /// kind counters are tallied over the moves that reach the leaves.
    pub fn run(&mut self, position: &Position, depth: u32) -> u64 {
        if depth == 0 {
            self.nodes += 1;
            return 1;
        }

        let mut leaves = 0;
        for mov in legal_moves(position) {
            if depth == 1 {
                if mov.is_capture() {
                    self.captures += 1;
                }
                if mov.flag == crate::chess_move::MoveFlag::EnPassant {
                    self.en_passants += 1;
                }
                if mov.is_castle() {
                    self.castles += 1;
                }
                if mov.is_promotion() {
                    self.promotions += 1;
                }
            }
            leaves += self.run(&position.apply_move(mov), depth - 1);
        }
        leaves
    }
}

/// Leaf count only.
pub fn perft(position: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(position);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .into_iter()
        .map(|mov| perft(&position.apply_move(mov), depth - 1))
        .sum()
}

/// Per-root-move leaf counts, sorted by move text.
pub fn divide(position: &Position, depth: u32) -> Vec<(String, u64)> {
    let mut counts: Vec<(String, u64)> = legal_moves(position)
        .into_iter()
        .map(|mov| (mov.to_string(), perft(&position.apply_move(mov), depth.saturating_sub(1))))
        .collect();
    counts.sort();
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

    fn fen(s: &str) -> Position {
        Position::from_fen(s).unwrap()
    }

    #[test]
    fn test_perft_start_position() {
        let position = Position::new();
        assert_eq!(perft(&position, 1), 20);
        assert_eq!(perft(&position, 2), 400);
        assert_eq!(perft(&position, 3), 8902);
    }

    #[test]
    fn test_perft_start_position_depth_4() {
        let mut counter = Perft::new();
        assert_eq!(counter.run(&Position::new(), 4), 197_281);
        assert_eq!(counter.nodes, 197_281);
        assert_eq!(counter.captures, 1576);
        assert_eq!(counter.en_passants, 0);
        assert_eq!(counter.castles, 0);
    }

    #[test]
    fn test_perft_start_position_captures_depth_3() {
        let mut counter = Perft::new();
        counter.run(&Position::new(), 3);
        assert_eq!(counter.captures, 34);
    }

    #[test]
    fn test_perft_kiwipete() {
        let position = fen(KIWIPETE);

        let mut counter = Perft::new();
        assert_eq!(counter.run(&position, 1), 48);
        assert_eq!(counter.captures, 8);
        assert_eq!(counter.castles, 2);

        let mut counter = Perft::new();
        assert_eq!(counter.run(&position, 2), 2039);
        assert_eq!(counter.captures, 351);
        assert_eq!(counter.en_passants, 1);
        assert_eq!(counter.castles, 91);

        assert_eq!(perft(&position, 3), 97_862);
    }

    #[test]
    fn test_perft_position_3() {
        let position = fen(POSITION_3);
        assert_eq!(perft(&position, 1), 14);
        assert_eq!(perft(&position, 2), 191);
        assert_eq!(perft(&position, 3), 2812);
        assert_eq!(perft(&position, 4), 43_238);
    }

    #[test]
    fn test_perft_position_4() {
        let position = fen(POSITION_4);
        assert_eq!(perft(&position, 1), 6);
        assert_eq!(perft(&position, 2), 264);
        assert_eq!(perft(&position, 3), 9467);
    }

    #[test]
    fn test_perft_position_5() {
        let position = fen(POSITION_5);
        assert_eq!(perft(&position, 1), 44);
        assert_eq!(perft(&position, 2), 1486);
        assert_eq!(perft(&position, 3), 62_379);
    }

    #[test]
    fn test_divide_sums_to_perft() {
        let position = fen(KIWIPETE);
        let split = divide(&position, 2);
        assert_eq!(split.len(), 48);
        assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 2039);
    }
}
