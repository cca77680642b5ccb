//! Ray attack generation module for sliding pieces.
//!
//! This module pre-computes rays in all eight directions and uses them to
//! calculate slider attacks against a given occupancy. A ray stops at the
//! first occupied square, which is included in the attack set whatever its
//! color; callers mask out their own pieces.

use once_cell::sync::Lazy;

use crate::utils::*;

/// Shared ray tables.
pub static RAYS: Lazy<Rays> = Lazy::new(Rays::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    NorthWest,
    SouthWest,
}

impl Direction {
    const ALL: [Direction; 8] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::NorthWest,
        Direction::SouthWest,
    ];

    fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (1, 0),
            Direction::East => (0, 1),
            Direction::South => (-1, 0),
            Direction::West => (0, -1),
            Direction::NorthEast => (1, 1),
            Direction::SouthEast => (-1, 1),
            Direction::NorthWest => (1, -1),
            Direction::SouthWest => (-1, -1),
        }
    }

    /// Whether square indices grow along the ray, which decides whether the
    /// nearest blocker is the lowest or the highest set bit.
    fn is_positive(self) -> bool {
        matches!(
            self,
            Direction::North | Direction::East | Direction::NorthEast | Direction::NorthWest
        )
    }
}

/// A structure containing pre-computed ray attacks in all eight directions.
///
/// `rays[direction][square]` is the set of squares strictly beyond `square`
/// in `direction`, up to the board edge.
#[derive(Debug, Clone)]
pub struct Rays {
    rays: [[Bitboard; 64]; 8],
}

impl Rays {
    /// Creates a new instance with pre-computed ray attacks for all squares.
    pub fn new() -> Self {
        let mut rays = [[0; 64]; 8];
        for (d, direction) in Direction::ALL.iter().enumerate() {
            for (square, ray_bb) in rays[d].iter_mut().enumerate() {
                let row = (square / 8 + 1) as i64;
                let col = (square % 8 + 1) as i64;
                *ray_bb = ray(row, col, direction.delta());
            }
        }
        Self { rays }
    }

    pub fn ray(&self, direction: Direction, square: usize) -> Bitboard {
        self.rays[direction as usize][square]
    }

    fn ray_attacks(&self, direction: Direction, square: usize, occupancy: Bitboard) -> Bitboard {
        let ray = self.ray(direction, square);
        let blockers = ray & occupancy;
        let nearest = if direction.is_positive() {
            bit_scan(blockers)
        } else {
            bit_scan_backward(blockers)
        };
        match nearest {
            Some(blocker) => ray & !self.ray(direction, blocker),
            None => ray,
        }
    }

    /// Calculates bishop attacks from a given square considering occupied squares.
    ///
    /// # Arguments
    ///
    /// * `square` - The square index (0-63) from which to generate attacks
    /// * `occupancy` - A bitboard representing all occupied squares
    ///
    /// # Returns
    ///
    /// * A bitboard of attacked squares, including the first blocker on each ray
    pub fn get_bishop_attacks(&self, square: usize, occupancy: Bitboard) -> Bitboard {
        self.ray_attacks(Direction::NorthEast, square, occupancy)
            | self.ray_attacks(Direction::NorthWest, square, occupancy)
            | self.ray_attacks(Direction::SouthEast, square, occupancy)
            | self.ray_attacks(Direction::SouthWest, square, occupancy)
    }

    /// Calculates rook attacks from a given square considering occupied squares.
    ///
    /// # Arguments
    ///
    /// * `square` - The square index (0-63) from which to generate attacks
    /// * `occupancy` - A bitboard representing all occupied squares
    ///
    /// # Returns
    ///
    /// * A bitboard of attacked squares, including the first blocker on each ray
    pub fn get_rook_attacks(&self, square: usize, occupancy: Bitboard) -> Bitboard {
        self.ray_attacks(Direction::North, square, occupancy)
            | self.ray_attacks(Direction::East, square, occupancy)
            | self.ray_attacks(Direction::South, square, occupancy)
            | self.ray_attacks(Direction::West, square, occupancy)
    }

    pub fn get_queen_attacks(&self, square: usize, occupancy: Bitboard) -> Bitboard {
        self.get_bishop_attacks(square, occupancy) | self.get_rook_attacks(square, occupancy)
    }
}

impl Default for Rays {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks from (row, col) in steps of `delta` until leaving the board.
/// Rows and columns are 1-based.
fn ray(row: i64, col: i64, delta: (i64, i64)) -> Bitboard {
    let mut bitboard = 0;
    let (mut r, mut c) = (row + delta.0, col + delta.1);
    while (1..=8).contains(&r) && (1..=8).contains(&c) {
        bitboard |= set_bit(r as i32, c as i32);
        r += delta.0;
        c += delta.1;
    }
    bitboard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_lengths_from_corner() {
        let rays = Rays::new();
        assert_eq!(rays.ray(Direction::North, 0).count_ones(), 7);
        assert_eq!(rays.ray(Direction::East, 0).count_ones(), 7);
        assert_eq!(rays.ray(Direction::NorthEast, 0).count_ones(), 7);
        assert_eq!(rays.ray(Direction::South, 0), 0);
        assert_eq!(rays.ray(Direction::West, 0), 0);
        assert_eq!(rays.ray(Direction::NorthWest, 0), 0);
    }

    #[test]
    fn rook_attacks_on_empty_board() {
        let rays = Rays::new();
        // e4
        assert_eq!(rays.get_rook_attacks(28, 0).count_ones(), 14);
        assert_eq!(rays.get_bishop_attacks(28, 0).count_ones(), 13);
        assert_eq!(rays.get_queen_attacks(28, 0).count_ones(), 27);
    }

    #[test]
    fn rook_attacks_stop_at_blockers() {
        let rays = &*RAYS;
        // Rook on a1, blockers on a4 and d1
        let occupancy = (1u64 << 24) | (1u64 << 3);
        let attacks = rays.get_rook_attacks(0, occupancy);
        let expected =
            (1u64 << 8) | (1u64 << 16) | (1u64 << 24) | (1u64 << 1) | (1u64 << 2) | (1u64 << 3);
        assert_eq!(attacks, expected, "\n{}", bitboard_to_string(attacks));
    }

    #[test]
    fn bishop_attacks_stop_at_blockers_in_negative_directions() {
        let rays = &*RAYS;
        // Bishop on h8, blocker on f6
        let occupancy = 1u64 << 45;
        let attacks = rays.get_bishop_attacks(63, occupancy);
        assert_eq!(attacks, (1u64 << 54) | (1u64 << 45));
    }
}
