use std::fmt;

use crate::error::{ChessError, Result};
use crate::piece::PieceType;
use crate::square::Square;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MoveFlag {
    Normal,
    Capture,
    EnPassant,
    CastleKingside,
    CastleQueenside,
    DoublePawnPush,
}

/// A move as produced by the move generator.
///
/// Only meaningful against the position it was generated from; the flag
/// records what the move does there so `Position::make_move` needs no
/// extra lookups.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
    pub flag: MoveFlag,
}

impl Move {
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Move {
        Move { from, to, promotion: None, flag }
    }

    pub const fn with_promotion(
        from: Square,
        to: Square,
        flag: MoveFlag,
        promotion: PieceType,
    ) -> Move {
        Move { from, to, promotion: Some(promotion), flag }
    }

    pub fn is_capture(&self) -> bool {
        matches!(self.flag, MoveFlag::Capture | MoveFlag::EnPassant)
    }

    pub fn is_castle(&self) -> bool {
        matches!(self.flag, MoveFlag::CastleKingside | MoveFlag::CastleQueenside)
    }

    pub fn is_promotion(&self) -> bool {
        self.promotion.is_some()
    }

    /// Coordinate notation, e.g. `e2e4` or `e7e8q`.
    pub fn to_coordinates(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.abbreviation())?;
        }
        Ok(())
    }
}

/// A move request in coordinate notation, not yet matched against a board.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
}

impl MoveRequest {
    /// Parses `e2e4`, `e7e8q` or `e2 e4`.
    pub fn parse(input: &str) -> Result<MoveRequest> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || ChessError::InvalidMove(input.to_string());
        if !compact.is_ascii() || !(4..=5).contains(&compact.len()) {
            return Err(invalid());
        }
        let from: Square = compact[0..2].parse().map_err(|_| invalid())?;
        let to: Square = compact[2..4].parse().map_err(|_| invalid())?;
        let promotion = match compact[4..].chars().next() {
            None => None,
            Some(c) => match PieceType::decode(c) {
                Some(piece_type) if piece_type.is_promotion_target() => Some(piece_type),
                _ => return Err(invalid()),
            },
        };
        Ok(MoveRequest { from, to, promotion })
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.abbreviation())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_in_coordinate_notation() {
        let e2: Square = "e2".parse().unwrap();
        let e4: Square = "e4".parse().unwrap();
        assert_eq!(Move::new(e2, e4, MoveFlag::DoublePawnPush).to_string(), "e2e4");

        let e7: Square = "e7".parse().unwrap();
        let e8: Square = "e8".parse().unwrap();
        let promo = Move::with_promotion(e7, e8, MoveFlag::Normal, PieceType::Knight);
        assert_eq!(promo.to_coordinates(), "e7e8n");
        assert!(promo.is_promotion());
        assert!(!promo.is_capture());
    }

    #[test]
    fn parses_requests() {
        let request = MoveRequest::parse("e7e8q").unwrap();
        assert_eq!(request.from.to_string(), "e7");
        assert_eq!(request.to.to_string(), "e8");
        assert_eq!(request.promotion, Some(PieceType::Queen));

        let spaced = MoveRequest::parse("g1 f3").unwrap();
        assert_eq!(spaced.to_string(), "g1f3");
    }

    #[test]
    fn rejects_malformed_requests() {
        for bad in ["", "e2", "e2e9", "e7e8k", "e7e8p", "e2e4e5", "z1a1"] {
            let err = MoveRequest::parse(bad).unwrap_err();
            assert_eq!(err.code(), "invalid_move", "{}", bad);
        }
    }
}
