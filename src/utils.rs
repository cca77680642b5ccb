//! Bitboard helpers shared by the board model, move generation and evaluation.
//!
//! Square indices run from 0 (a1) to 63 (h8), rank-major, so bit `n` of a
//! bitboard is the square `rank * 8 + file`.

/// Type alias for a 64-bit integer representing a chess board
pub type Bitboard = u64;

pub const FILE_A: Bitboard = 0x0101_0101_0101_0101;
pub const FILE_H: Bitboard = 0x8080_8080_8080_8080;
pub const RANK_1: Bitboard = 0x0000_0000_0000_00FF;
pub const RANK_8: Bitboard = 0xFF00_0000_0000_0000;

/// Sets a bit in a bitboard based on chess board coordinates.
///
/// Takes 1-based coordinates (1-8 for both row and column). Coordinates
/// outside the board produce an empty bitboard.
///
/// # Arguments
///
/// * `row` - The row number (1-8)
/// * `col` - The column number (1-8)
///
/// # Returns
///
/// * A bitboard with the specified bit set
pub fn set_bit(row: i32, col: i32) -> Bitboard {
    if !(1..=8).contains(&row) || !(1..=8).contains(&col) {
        return 0;
    }
    let bit_index = (col - 1) + (row - 1) * 8;
    1 << bit_index
}

/// Splits a string on the first occurrence of a delimiter.
///
/// # Arguments
///
/// * `s` - The string to split
/// * `delimiter` - The character to split on
///
/// # Returns
///
/// * A tuple containing the part before the delimiter and the part after,
///   or `None` for the second part when the delimiter is absent
pub fn split_on(s: &str, delimiter: char) -> (&str, Option<&str>) {
    match s.find(delimiter) {
        None => (s, None),
        Some(index) => (&s[..index], Some(&s[index + delimiter.len_utf8()..])),
    }
}

/// Finds the index of the least significant set bit, or `None` if empty.
pub fn bit_scan(bitboard: Bitboard) -> Option<usize> {
    if bitboard == 0 {
        None
    } else {
        Some(bitboard.trailing_zeros() as usize)
    }
}

/// Finds the index of the most significant set bit, or `None` if empty.
pub fn bit_scan_backward(bitboard: Bitboard) -> Option<usize> {
    if bitboard == 0 {
        None
    } else {
        Some(63 - bitboard.leading_zeros() as usize)
    }
}

/// Iterator over the set bits of a bitboard, lowest square first.
#[derive(Debug, Clone, Copy)]
pub struct Bits(Bitboard);

impl Iterator for Bits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let lsb = bit_scan(self.0)?;
        self.0 &= self.0 - 1;
        Some(lsb)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Bits {}

/// Extracts all set bits from a bitboard.
///
/// The indices come out in ascending order, which keeps every caller's
/// iteration order a pure function of the bitboard.
pub fn extract_bits(bitboard: Bitboard) -> Bits {
    Bits(bitboard)
}

/// Renders a bitboard as an 8x8 grid of 1s and 0s, rank 8 on top.
pub fn bitboard_to_string(bitboard: Bitboard) -> String {
    let mut out = String::with_capacity(8 * 17);
    for rank in (0..8).rev() {
        for file in 0..8 {
            let bit = (bitboard >> (rank * 8 + file)) & 1;
            out.push(if bit == 1 { '1' } else { '0' });
            out.push(if file == 7 { '\n' } else { ' ' });
        }
    }
    out
}
