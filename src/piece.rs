//! Piece colors and types.
//!
//! The single-letter abbreviations used by FEN and by coordinate move
//! notation live in static tables; decoding goes through those tables and
//! reports unknown input as `None` instead of failing loudly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChessError;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

static COLOR_ABBREVIATIONS: [(&str, Color); 2] = [("w", Color::White), ("b", Color::Black)];

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    /// Index for array lookups: White=0, Black=1.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn abbreviation(self) -> &'static str {
        COLOR_ABBREVIATIONS[self.index()].0
    }

    /// Decodes `"w"` / `"b"`.
    pub fn decode(s: &str) -> Option<Color> {
        COLOR_ABBREVIATIONS
            .iter()
            .find(|(abbreviation, _)| *abbreviation == s)
            .map(|(_, color)| *color)
    }

    /// The rank (0-based) a pawn of this color promotes on.
    pub const fn promotion_rank(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }
}

impl std::ops::Not for Color {
    type Output = Color;

    fn not(self) -> Color {
        self.opposite()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

impl FromStr for Color {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "white" => Ok(Color::White),
            "black" => Ok(Color::Black),
            other => Color::decode(other)
                .ok_or_else(|| ChessError::Config(format!("unknown color '{}'", s))),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

static PIECE_ABBREVIATIONS: [(char, PieceType); 6] = [
    ('p', PieceType::Pawn),
    ('n', PieceType::Knight),
    ('b', PieceType::Bishop),
    ('r', PieceType::Rook),
    ('q', PieceType::Queen),
    ('k', PieceType::King),
];

impl PieceType {
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    /// Pieces a pawn may promote to, strongest first.
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase letter used by FEN and coordinate notation.
    pub fn abbreviation(self) -> char {
        PIECE_ABBREVIATIONS[self.index()].0
    }

    /// Decodes a FEN letter, ignoring case.
    pub fn decode(c: char) -> Option<PieceType> {
        let c = c.to_ascii_lowercase();
        PIECE_ABBREVIATIONS
            .iter()
            .find(|(abbreviation, _)| *abbreviation == c)
            .map(|(_, piece_type)| *piece_type)
    }

    pub fn is_promotion_target(self) -> bool {
        PieceType::PROMOTIONS.contains(&self)
    }

    pub fn is_minor(self) -> bool {
        matches!(self, PieceType::Knight | PieceType::Bishop)
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceType::Pawn => "PAWN",
            PieceType::Knight => "KNIGHT",
            PieceType::Bishop => "BISHOP",
            PieceType::Rook => "ROOK",
            PieceType::Queen => "QUEEN",
            PieceType::King => "KING",
        };
        f.write_str(name)
    }
}

/// Accepts either the single letter or the full name, in any case.
impl FromStr for PieceType {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(piece_type) = PieceType::decode(c) {
                return Ok(piece_type);
            }
        }
        PieceType::ALL
            .iter()
            .copied()
            .find(|piece_type| piece_type.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ChessError::Config(format!("unknown piece type '{}'", s)))
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Piece {
    pub piece_type: PieceType,
    pub color: Color,
}

impl Piece {
    pub const fn new(piece_type: PieceType, color: Color) -> Piece {
        Piece { piece_type, color }
    }

    /// FEN character: uppercase for white, lowercase for black.
    pub fn to_char(self) -> char {
        let c = self.piece_type.abbreviation();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    pub fn from_char(c: char) -> Option<Piece> {
        let piece_type = PieceType::decode(c)?;
        let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
        Some(Piece { piece_type, color })
    }
}
