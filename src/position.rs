use std::fmt;

use bitflags::bitflags;

use crate::chess_move::{Move, MoveFlag};
use crate::error::{ChessError, Result};
use crate::piece::{Color, Piece, PieceType};
use crate::square::Square;
use crate::utils::{extract_bits, Bitboard};
use crate::zobrist::ZOBRIST;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

bitflags! {
    pub struct CastlingRights: u8 {
        const NONE = 0;
        const WHITEKINGSIDE = 1 << 0;
        const WHITEQUEENSIDE = 1 << 1;
        const BLACKKINGSIDE = 1 << 2;
        const BLACKQUEENSIDE = 1 << 3;
        const ALL =
            Self::WHITEKINGSIDE.bits
            | Self::WHITEQUEENSIDE.bits
            | Self::BLACKKINGSIDE.bits
            | Self::BLACKQUEENSIDE.bits;
    }
}

impl CastlingRights {
    pub fn kingside(color: Color) -> CastlingRights {
        match color {
            Color::White => CastlingRights::WHITEKINGSIDE,
            Color::Black => CastlingRights::BLACKKINGSIDE,
        }
    }

    pub fn queenside(color: Color) -> CastlingRights {
        match color {
            Color::White => CastlingRights::WHITEQUEENSIDE,
            Color::Black => CastlingRights::BLACKQUEENSIDE,
        }
    }

    /// Rights that disappear once anything moves from or to `square`.
    fn lost_at(square: Square) -> CastlingRights {
        match square {
            Square::A1 => CastlingRights::WHITEQUEENSIDE,
            Square::H1 => CastlingRights::WHITEKINGSIDE,
            Square::E1 => CastlingRights::WHITEKINGSIDE | CastlingRights::WHITEQUEENSIDE,
            Square::A8 => CastlingRights::BLACKQUEENSIDE,
            Square::H8 => CastlingRights::BLACKKINGSIDE,
            Square::E8 => CastlingRights::BLACKKINGSIDE | CastlingRights::BLACKQUEENSIDE,
            _ => CastlingRights::NONE,
        }
    }
}

/// Represents a complete chess position.
///
/// Piece placement is kept twice: a mailbox for square lookups and
/// per-type/per-color bitboards for move generation. Every mutation goes
/// through `put_piece`/`remove_piece`, which keep the two in sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    board: [Option<Piece>; 64],
    piece_bb: [Bitboard; 6],
    color_bb: [Bitboard; 2],
    active_color: Color,
    castling_rights: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

impl Position {
    /// An empty board with white to move and no castling rights.
    pub fn empty() -> Position {
        Position {
            board: [None; 64],
            piece_bb: [0; 6],
            color_bb: [0; 2],
            active_color: Color::White,
            castling_rights: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// The standard starting position.
    pub fn new() -> Position {
        const BACK_RANK: [PieceType; 8] = [
            PieceType::Rook,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Queen,
            PieceType::King,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Rook,
        ];

        let mut position = Position::empty();
        for (file, piece_type) in BACK_RANK.iter().enumerate() {
            let placements = [
                (file, *piece_type, Color::White),
                (8 + file, PieceType::Pawn, Color::White),
                (48 + file, PieceType::Pawn, Color::Black),
                (56 + file, *piece_type, Color::Black),
            ];
            for (index, piece_type, color) in placements {
                position.put_piece(Square::from_index(index), Piece::new(piece_type, color));
            }
        }
        position.castling_rights = CastlingRights::ALL;
        position
    }

    pub fn from_fen(fen: &str) -> Result<Position> {
        let invalid = |reason: &str| ChessError::InvalidFen(format!("{} in '{}'", reason, fen));

        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(invalid("wrong number of fields"));
        }

        let mut position = Position::empty();

        // Parse board position
        let rows: Vec<&str> = parts[0].split('/').collect();
        if rows.len() != 8 {
            return Err(invalid("wrong number of ranks"));
        }
        for (i, row) in rows.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file: u8 = 0;
            for ch in row.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(invalid("bad empty-square count"));
                    }
                    file += skip as u8;
                } else {
                    let piece =
                        Piece::from_char(ch).ok_or_else(|| invalid("unknown piece character"))?;
                    let square = Square::new(file, rank).ok_or_else(|| invalid("rank overflows"))?;
                    position.put_piece(square, piece);
                    file += 1;
                }
                if file > 8 {
                    return Err(invalid("rank overflows"));
                }
            }
            if file != 8 {
                return Err(invalid("rank too short"));
            }
        }

        // Parse active color
        position.active_color =
            Color::decode(parts[1]).ok_or_else(|| invalid("invalid active color"))?;

        // Parse castling rights
        let mut castling = CastlingRights::NONE;
        if parts[2] != "-" {
            for ch in parts[2].chars() {
                castling |= match ch {
                    'K' => CastlingRights::WHITEKINGSIDE,
                    'Q' => CastlingRights::WHITEQUEENSIDE,
                    'k' => CastlingRights::BLACKKINGSIDE,
                    'q' => CastlingRights::BLACKQUEENSIDE,
                    _ => return Err(invalid("invalid castling rights")),
                };
            }
        }
        position.castling_rights = castling;

        // Parse en passant square
        position.en_passant = match parts[3] {
            "-" => None,
            square => Some(square.parse().map_err(|_| invalid("invalid en passant square"))?),
        };

        if parts.len() == 6 {
            position.halfmove_clock =
                parts[4].parse().map_err(|_| invalid("invalid halfmove clock"))?;
            position.fullmove_number =
                parts[5].parse().map_err(|_| invalid("invalid fullmove number"))?;
        }

        Ok(position)
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.board[rank * 8 + file] {
                    None => empty += 1,
                    Some(piece) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece.to_char());
                    }
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push_str(self.active_color.abbreviation());
        fen.push(' ');
        if self.castling_rights.is_empty() {
            fen.push('-');
        } else {
            for (flag, c) in [
                (CastlingRights::WHITEKINGSIDE, 'K'),
                (CastlingRights::WHITEQUEENSIDE, 'Q'),
                (CastlingRights::BLACKKINGSIDE, 'k'),
                (CastlingRights::BLACKQUEENSIDE, 'q'),
            ] {
                if self.castling_rights.contains(flag) {
                    fen.push(c);
                }
            }
        }
        fen.push(' ');
        match self.en_passant {
            Some(square) => fen.push_str(&square.to_string()),
            None => fen.push('-'),
        }
        fen.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        fen
    }

    pub fn put_piece(&mut self, square: Square, piece: Piece) {
        self.remove_piece(square);
        let bit = square.bit();
        self.board[square.index()] = Some(piece);
        self.piece_bb[piece.piece_type.index()] |= bit;
        self.color_bb[piece.color.index()] |= bit;
    }

    pub fn remove_piece(&mut self, square: Square) -> Option<Piece> {
        let piece = self.board[square.index()].take()?;
        let bit = square.bit();
        self.piece_bb[piece.piece_type.index()] &= !bit;
        self.color_bb[piece.color.index()] &= !bit;
        Some(piece)
    }

    #[inline]
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.board[square.index()]
    }

    #[inline]
    pub fn active_color(&self) -> Color {
        self.active_color
    }

    #[inline]
    pub fn castling_rights(&self) -> CastlingRights {
        self.castling_rights
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    #[inline]
    pub fn occupancy(&self) -> Bitboard {
        self.color_bb[0] | self.color_bb[1]
    }

    #[inline]
    pub fn color_occupancy(&self, color: Color) -> Bitboard {
        self.color_bb[color.index()]
    }

    #[inline]
    pub fn pieces(&self, piece_type: PieceType, color: Color) -> Bitboard {
        self.piece_bb[piece_type.index()] & self.color_bb[color.index()]
    }

    #[inline]
    pub fn pieces_of_type(&self, piece_type: PieceType) -> Bitboard {
        self.piece_bb[piece_type.index()]
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        extract_bits(self.pieces(PieceType::King, color)).next().map(Square::from_index)
    }

    /// Zobrist hash of placement, side to move, castling rights and
    /// en-passant target. Move counters are not part of it.
    pub fn hash(&self) -> u64 {
        ZOBRIST.hash_position(self)
    }

    /// Whether `color` still has material that could in principle mate:
    /// anything beyond a bare king or a king with one minor piece.
    pub fn has_mating_material(&self, color: Color) -> bool {
        let heavy_or_pawns = self.pieces(PieceType::Pawn, color)
            | self.pieces(PieceType::Rook, color)
            | self.pieces(PieceType::Queen, color);
        if heavy_or_pawns != 0 {
            return true;
        }
        let minors = self.pieces(PieceType::Knight, color) | self.pieces(PieceType::Bishop, color);
        minors.count_ones() > 1
    }

    /// King vs king, or king and one minor piece vs a bare king.
    pub fn is_insufficient_material(&self) -> bool {
        if self.has_mating_material(Color::White) || self.has_mating_material(Color::Black) {
            return false;
        }
        let minors =
            self.pieces_of_type(PieceType::Knight) | self.pieces_of_type(PieceType::Bishop);
        minors.count_ones() <= 1
    }

    /// Returns the position after `mov`.
    pub fn apply_move(&self, mov: Move) -> Position {
        let mut next = self.clone();
        next.make_move(mov);
        next
    }

    /// Plays `mov` in place. The move is trusted to come from this
    /// position's move generator.
    ///
    /// # Panics
    ///
    /// Panics if the source square is empty.
    pub fn make_move(&mut self, mov: Move) {
        let piece = match self.remove_piece(mov.from) {
            Some(piece) => piece,
            None => panic!("make_move called with empty source square {} ({})", mov.from, mov),
        };
        let mover = piece.color;
        let mut irreversible = piece.piece_type == PieceType::Pawn;

        if mov.flag == MoveFlag::EnPassant {
            if let Some(captured) = Square::new(mov.to.file(), mov.from.rank()) {
                self.remove_piece(captured);
            }
            irreversible = true;
        } else if self.remove_piece(mov.to).is_some() {
            irreversible = true;
        }

        let placed = match mov.promotion {
            Some(piece_type) => Piece::new(piece_type, mover),
            None => piece,
        };
        self.put_piece(mov.to, placed);

        let rook_hop = match mov.flag {
            MoveFlag::CastleKingside => Some((mov.to.offset(1, 0), mov.to.offset(-1, 0))),
            MoveFlag::CastleQueenside => Some((mov.to.offset(-2, 0), mov.to.offset(1, 0))),
            _ => None,
        };
        if let Some((Some(rook_from), Some(rook_to))) = rook_hop {
            if let Some(rook) = self.remove_piece(rook_from) {
                self.put_piece(rook_to, rook);
            }
        }

        let lost = CastlingRights::lost_at(mov.from) | CastlingRights::lost_at(mov.to);
        self.castling_rights &= !lost;

        self.en_passant = if mov.flag == MoveFlag::DoublePawnPush {
            Square::new(mov.from.file(), (mov.from.rank() + mov.to.rank()) / 2)
        } else {
            None
        };

        if irreversible {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if mover == Color::Black {
            self.fullmove_number += 1;
        }
        self.active_color = !self.active_color;
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                match self.board[rank * 8 + file] {
                    None => f.write_str(". ")?,
                    Some(piece) => write!(f, "{} ", piece.to_char())?,
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_read_fen_initial_position() {
        let position = Position::from_fen(START_FEN).unwrap();
        assert_eq!(position, Position::new());
        assert_eq!(position.active_color(), Color::White);
        assert_eq!(position.castling_rights(), CastlingRights::ALL);
        assert_eq!(position.en_passant(), None);
        assert_eq!(position.halfmove_clock(), 0);
        assert_eq!(position.fullmove_number(), 1);
    }

    #[test]
    fn test_read_fen_occupancy() {
        let position = Position::new();
        assert_eq!(position.color_occupancy(Color::White), 0xFFFF);
        assert_eq!(position.color_occupancy(Color::Black), 0xFFFF000000000000);
        assert_eq!(position.king_square(Color::White), Some(Square::E1));
        assert_eq!(position.king_square(Color::Black), Some(Square::E8));
    }

    #[test]
    fn test_read_fen_black_active() {
        let fen = "rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b - - 1 2";
        let position = Position::from_fen(fen).unwrap();
        assert_eq!(position.active_color(), Color::Black);
        assert_eq!(position.castling_rights(), CastlingRights::NONE);
        assert_eq!(position.halfmove_clock(), 1);
        assert_eq!(position.fullmove_number(), 2);
    }

    #[test]
    fn test_read_fen_castling_rights() {
        for i in 0..16u8 {
            let mut rights = String::new();
            for (bit, symbol) in [(1, 'K'), (2, 'Q'), (4, 'k'), (8, 'q')] {
                if i & bit != 0 {
                    rights.push(symbol);
                }
            }
            if rights.is_empty() {
                rights.push('-');
            }

            let fen = format!("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w {} - 0 1", rights);
            let position = Position::from_fen(&fen).unwrap();
            assert_eq!(position.castling_rights().bits(), i, "FEN: {}", fen);
            assert_eq!(position.to_fen(), fen);
        }
    }

    #[test]
    fn test_fen_round_trip() {
        for fen in [
            START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ] {
            assert_eq!(Position::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn test_fen_without_counters() {
        let position = Position::from_fen("8/8/8/8/8/8/8/K6k w - -").unwrap();
        assert_eq!(position.halfmove_clock(), 0);
        assert_eq!(position.fullmove_number(), 1);
    }

    #[test]
    fn test_invalid_fen_is_rejected() {
        for fen in [
            "",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1",
            "rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNX w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQxq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq z9 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - x 1",
        ] {
            let err = Position::from_fen(fen).unwrap_err();
            assert_eq!(err.code(), "invalid_fen", "{}", fen);
        }
    }

    #[test]
    fn test_double_push_sets_en_passant() {
        let mut position = Position::new();
        position.make_move(Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePawnPush));
        assert_eq!(position.en_passant(), Some(sq("e3")));
        assert_eq!(position.active_color(), Color::Black);
        assert_eq!(position.halfmove_clock(), 0);
        assert_eq!(position.fullmove_number(), 1);

        position.make_move(Move::new(sq("g8"), sq("f6"), MoveFlag::Normal));
        assert_eq!(position.en_passant(), None);
        assert_eq!(position.halfmove_clock(), 1);
        assert_eq!(position.fullmove_number(), 2);
    }

    #[test]
    fn test_en_passant_removes_passed_pawn() {
        let fen = "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3";
        let position = Position::from_fen(fen).unwrap();
        let after = position.apply_move(Move::new(sq("d4"), sq("e3"), MoveFlag::EnPassant));
        assert_eq!(after.piece_at(sq("e4")), None);
        assert_eq!(after.piece_at(sq("d4")), None);
        assert_eq!(after.piece_at(sq("e3")), Some(Piece::new(PieceType::Pawn, Color::Black)));
        assert_eq!(after.pieces(PieceType::Pawn, Color::White).count_ones(), 7);
        // The source position is untouched
        assert!(position.piece_at(sq("e4")).is_some());
    }

    #[test]
    fn test_castling_moves_rook_and_clears_rights() {
        let position = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castle = Move::new(Square::E1, Square::G1, MoveFlag::CastleKingside);
        let after = position.apply_move(castle);
        assert_eq!(after.piece_at(Square::F1), Some(Piece::new(PieceType::Rook, Color::White)));
        assert_eq!(after.piece_at(Square::H1), None);
        assert_eq!(
            after.castling_rights(),
            CastlingRights::BLACKKINGSIDE | CastlingRights::BLACKQUEENSIDE
        );

        let after = after.apply_move(Move::new(Square::E8, Square::C8, MoveFlag::CastleQueenside));
        assert_eq!(after.piece_at(Square::D8), Some(Piece::new(PieceType::Rook, Color::Black)));
        assert_eq!(after.piece_at(Square::A8), None);
        assert_eq!(after.castling_rights(), CastlingRights::NONE);
    }

    #[test]
    fn test_rook_capture_clears_opponent_right() {
        let position = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let after = position.apply_move(Move::new(Square::A1, Square::A8, MoveFlag::Capture));
        assert!(!after.castling_rights().contains(CastlingRights::WHITEQUEENSIDE));
        assert!(!after.castling_rights().contains(CastlingRights::BLACKQUEENSIDE));
        assert!(after.castling_rights().contains(CastlingRights::WHITEKINGSIDE));
        assert!(after.castling_rights().contains(CastlingRights::BLACKKINGSIDE));
    }

    #[test]
    fn test_promotion_replaces_pawn() {
        let position = Position::from_fen("8/4P3/8/8/8/8/8/k1K5 w - - 0 1").unwrap();
        let promotion = Move::with_promotion(sq("e7"), sq("e8"), MoveFlag::Normal, PieceType::Rook);
        let after = position.apply_move(promotion);
        assert_eq!(after.piece_at(sq("e8")), Some(Piece::new(PieceType::Rook, Color::White)));
        assert_eq!(after.pieces(PieceType::Pawn, Color::White), 0);
    }

    #[test]
    #[should_panic(expected = "empty source square")]
    fn test_make_move_from_empty_square_panics() {
        let mut position = Position::new();
        position.make_move(Move::new(sq("e4"), sq("e5"), MoveFlag::Normal));
    }

    #[test]
    fn test_insufficient_material() {
        let bare = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(bare.is_insufficient_material());
        let bishop = Position::from_fen("8/8/8/4k3/8/8/8/2B1K3 b - - 0 1").unwrap();
        assert!(bishop.is_insufficient_material());
        let two_minors = Position::from_fen("8/8/8/4k3/8/8/8/2BNK3 w - - 0 1").unwrap();
        assert!(!two_minors.is_insufficient_material());
        let minor_each = Position::from_fen("8/8/3n4/4k3/8/8/8/2B1K3 w - - 0 1").unwrap();
        assert!(!minor_each.is_insufficient_material());
        let pawn = Position::from_fen("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1").unwrap();
        assert!(!pawn.is_insufficient_material());
    }

    #[test]
    fn test_hash_ignores_move_counters() {
        let a = Position::from_fen("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1").unwrap();
        let b = Position::from_fen("8/8/8/4k3/8/8/4P3/4K3 w - - 12 40").unwrap();
        assert_eq!(a.hash(), b.hash());
        let c = Position::from_fen("8/8/8/4k3/8/8/4P3/4K3 b - - 0 1").unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_display_diagram() {
        let text = Position::new().to_string();
        assert!(text.starts_with("8 r n b q k b n r"));
        assert!(text.contains("1 R N B Q K B N R"));
    }
}
