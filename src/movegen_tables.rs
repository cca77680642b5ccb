//! Move generation lookup tables for efficient chess move generation.
//!
//! This module contains pre-computed attack patterns for the non-sliding
//! pieces. The tables are built once on first use and shared read-only by
//! every position, game and search thread.

use once_cell::sync::Lazy;

use crate::piece::Color;
use crate::utils::*;

/// Shared table instance.
pub static TABLES: Lazy<MoveGenTables> = Lazy::new(MoveGenTables::new);

/// A collection of pre-computed lookup tables for chess move generation.
#[derive(Debug, Clone)]
pub struct MoveGenTables {
    /// Pawn capture patterns indexed by [color][square].
    /// The first dimension represents the color (0 = white, 1 = black),
    /// and the second dimension represents the square (0-63).
    pub pawn_attacks: [[Bitboard; 64]; 2],

    /// Knight attack patterns indexed by square (0-63).
    pub knight_attacks: [Bitboard; 64],

    /// King attack patterns indexed by square (0-63).
    pub king_attacks: [Bitboard; 64],
}

impl MoveGenTables {
    /// Creates a new instance of MoveGenTables with all lookup tables initialized.
    ///
    /// # Returns
    ///
    /// * A new `MoveGenTables` instance with all tables initialized
    pub fn new() -> Self {
        let mut tables = Self {
            pawn_attacks: [[0; 64]; 2],
            knight_attacks: [0; 64],
            king_attacks: [0; 64],
        };

        for square in 0..64 {
            tables.king_attacks[square] = generate_king_attacks(square);
            tables.knight_attacks[square] = generate_knight_attacks(square);
            for color in Color::ALL {
                tables.pawn_attacks[color.index()][square] = generate_pawn_attacks(square, color);
            }
        }

        tables
    }
}

impl Default for MoveGenTables {
    fn default() -> Self {
        Self::new()
    }
}

fn jumps(square: usize, deltas: &[(i32, i32)]) -> Bitboard {
    let row = (square / 8) as i32 + 1;
    let col = (square % 8) as i32 + 1;
    deltas
        .iter()
        .fold(0, |attacks, (dr, dc)| attacks | set_bit(row + dr, col + dc))
}

/// Generates a bitboard of all squares a king can attack from a given square.
///
/// # Arguments
///
/// * `square` - The square index (0-63) from which to generate attacks
///
/// # Returns
///
/// * A bitboard representing all squares the king can attack
fn generate_king_attacks(square: usize) -> Bitboard {
    let directions = [
        (1, 0), (1, 1), (0, 1), (-1, 1),
        (-1, 0), (-1, -1), (0, -1), (1, -1),
    ];
    jumps(square, &directions)
}

/// Generates a bitboard of all squares a knight can attack from a given square.
///
/// # Arguments
///
/// * `square` - The square index (0-63) from which to generate attacks
///
/// # Returns
///
/// * A bitboard representing all squares the knight can attack
fn generate_knight_attacks(square: usize) -> Bitboard {
    let moves = [
        (2, 1), (2, -1), (-2, 1), (-2, -1),
        (1, 2), (1, -2), (-1, 2), (-1, -2),
    ];
    jumps(square, &moves)
}

/// Diagonal capture squares of a pawn of `color` standing on `square`.
fn generate_pawn_attacks(square: usize, color: Color) -> Bitboard {
    let forward = match color {
        Color::White => 1,
        Color::Black => -1,
    };
    jumps(square, &[(forward, -1), (forward, 1)])
}
