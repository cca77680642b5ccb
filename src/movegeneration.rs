//! Chess move generation module.
//!
//! Pseudo-legal moves come from the precomputed attack tables; legal moves
//! are the pseudo-legal ones that do not leave the mover's king attacked on
//! the resulting board. Output order is fixed: piece types in
//! `PieceType::ALL` order, then source squares ascending, then target
//! squares ascending, then promotion pieces strongest first.

use crate::chess_move::{Move, MoveFlag};
use crate::movegen_tables::TABLES;
use crate::piece::{Color, PieceType};
use crate::position::{CastlingRights, Position};
use crate::rayattacks::RAYS;
use crate::square::Square;
use crate::utils::{extract_bits, Bitboard, RANK_1, RANK_8};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastlingSide {
    Kingside,
    Queenside,
}

/// Whether any piece of color `by` attacks `square`.
pub fn is_square_attacked(position: &Position, square: Square, by: Color) -> bool {
    attackers_of(position, square, by) != 0
}

/// Bitboard of the pieces of color `by` that attack `square`.
pub fn attackers_of(position: &Position, square: Square, by: Color) -> Bitboard {
    let idx = square.index();
    let occupancy = position.occupancy();
    let queens = position.pieces(PieceType::Queen, by);

    // A pawn of `by` attacks `square` iff a pawn of the other color on
    // `square` would attack it back.
    let pawns =
        TABLES.pawn_attacks[by.opposite().index()][idx] & position.pieces(PieceType::Pawn, by);
    let knights = TABLES.knight_attacks[idx] & position.pieces(PieceType::Knight, by);
    let kings = TABLES.king_attacks[idx] & position.pieces(PieceType::King, by);
    let bishops = position.pieces(PieceType::Bishop, by) | queens;
    let rooks = position.pieces(PieceType::Rook, by) | queens;
    let diagonal = RAYS.get_bishop_attacks(idx, occupancy) & bishops;
    let orthogonal = RAYS.get_rook_attacks(idx, occupancy) & rooks;

    pawns | knights | kings | diagonal | orthogonal
}

/// Whether `color`'s king is attacked. A board without that king is never in check.
pub fn is_in_check(position: &Position, color: Color) -> bool {
    match position.king_square(color) {
        Some(king) => is_square_attacked(position, king, color.opposite()),
        None => false,
    }
}

/// Generates every pseudo-legal move for the side to move.
pub fn pseudo_legal_moves(position: &Position) -> Vec<Move> {
    let mut moves = Vec::with_capacity(48);
    let color = position.active_color();
    let own = position.color_occupancy(color);
    let opponent = position.color_occupancy(color.opposite());
    let occupancy = own | opponent;

    for piece_type in PieceType::ALL {
        for from in extract_bits(position.pieces(piece_type, color)) {
            let from = Square::from_index(from);
            match piece_type {
                PieceType::Pawn => {
                    generate_pawn_moves(position, from, color, occupancy, opponent, &mut moves)
                }
                PieceType::King => {
                    let targets = TABLES.king_attacks[from.index()] & !own;
                    push_targets(from, targets, opponent, &mut moves);
                    generate_castling_moves(position, from, color, &mut moves);
                }
                _ => {
                    let targets = piece_attacks(piece_type, from.index(), occupancy) & !own;
                    push_targets(from, targets, opponent, &mut moves);
                }
            }
        }
    }

    moves
}

/// Attack set of a non-pawn piece standing on `square`.
pub fn piece_attacks(piece_type: PieceType, square: usize, occupancy: Bitboard) -> Bitboard {
    match piece_type {
        PieceType::Knight => TABLES.knight_attacks[square],
        PieceType::Bishop => RAYS.get_bishop_attacks(square, occupancy),
        PieceType::Rook => RAYS.get_rook_attacks(square, occupancy),
        PieceType::Queen => RAYS.get_queen_attacks(square, occupancy),
        PieceType::King => TABLES.king_attacks[square],
        PieceType::Pawn => 0,
    }
}

fn push_targets(from: Square, targets: Bitboard, opponent: Bitboard, moves: &mut Vec<Move>) {
    for to in extract_bits(targets) {
        let flag = if opponent & (1u64 << to) != 0 { MoveFlag::Capture } else { MoveFlag::Normal };
        moves.push(Move::new(from, Square::from_index(to), flag));
    }
}

fn push_pawn_move(from: Square, to: Square, flag: MoveFlag, moves: &mut Vec<Move>) {
    if to.bit() & (RANK_1 | RANK_8) != 0 {
        for promotion in PieceType::PROMOTIONS {
            moves.push(Move::with_promotion(from, to, flag, promotion));
        }
    } else {
        moves.push(Move::new(from, to, flag));
    }
}

/// Generates pawn pushes, double pushes, captures, en passant and promotions.
fn generate_pawn_moves(
    position: &Position,
    from: Square,
    color: Color,
    occupancy: Bitboard,
    opponent: Bitboard,
    moves: &mut Vec<Move>,
) {
    let (forward, start_rank) = match color {
        Color::White => (1, 1),
        Color::Black => (-1, 6),
    };

    if let Some(one_step) = from.offset(0, forward) {
        if occupancy & one_step.bit() == 0 {
            push_pawn_move(from, one_step, MoveFlag::Normal, moves);
            if from.rank() == start_rank {
                if let Some(two_step) = one_step.offset(0, forward) {
                    if occupancy & two_step.bit() == 0 {
                        moves.push(Move::new(from, two_step, MoveFlag::DoublePawnPush));
                    }
                }
            }
        }
    }

    let attacks = TABLES.pawn_attacks[color.index()][from.index()];
    for to in extract_bits(attacks & opponent) {
        push_pawn_move(from, Square::from_index(to), MoveFlag::Capture, moves);
    }

    if let Some(ep) = position.en_passant() {
        if attacks & ep.bit() != 0 && occupancy & ep.bit() == 0 {
            moves.push(Move::new(from, ep, MoveFlag::EnPassant));
        }
    }
}

/// Checks if castling is available in the current position for `color`.
///
/// Requires the castling right, the king on its home square, the rook on
/// its corner, empty squares between them, and neither the king's square
/// nor the squares it crosses attacked.
pub fn can_castle(position: &Position, color: Color, side: CastlingSide) -> bool {
    let (king_home, rook_corner, right) = match (color, side) {
        (Color::White, CastlingSide::Kingside) => {
            (Square::E1, Square::H1, CastlingRights::WHITEKINGSIDE)
        }
        (Color::White, CastlingSide::Queenside) => {
            (Square::E1, Square::A1, CastlingRights::WHITEQUEENSIDE)
        }
        (Color::Black, CastlingSide::Kingside) => {
            (Square::E8, Square::H8, CastlingRights::BLACKKINGSIDE)
        }
        (Color::Black, CastlingSide::Queenside) => {
            (Square::E8, Square::A8, CastlingRights::BLACKQUEENSIDE)
        }
    };

    if !position.castling_rights().contains(right) {
        return false;
    }
    if position.pieces(PieceType::King, color) & king_home.bit() == 0 {
        return false;
    }
    if position.pieces(PieceType::Rook, color) & rook_corner.bit() == 0 {
        return false;
    }

    // Squares that must be empty, and squares the king passes through
    let (path, traversed): (Bitboard, [Square; 2]) = match (color, side) {
        (Color::White, CastlingSide::Kingside) => (0x60, [Square::F1, Square::G1]),
        (Color::White, CastlingSide::Queenside) => (0xE, [Square::D1, Square::C1]),
        (Color::Black, CastlingSide::Kingside) => (0x6000000000000000, [Square::F8, Square::G8]),
        (Color::Black, CastlingSide::Queenside) => (0x0E00000000000000, [Square::D8, Square::C8]),
    };

    if position.occupancy() & path != 0 {
        return false;
    }

    let enemy = color.opposite();
    if is_square_attacked(position, king_home, enemy) {
        return false;
    }
    traversed.iter().all(|square| !is_square_attacked(position, *square, enemy))
}

fn generate_castling_moves(position: &Position, from: Square, color: Color, moves: &mut Vec<Move>) {
    if can_castle(position, color, CastlingSide::Kingside) {
        if let Some(to) = from.offset(2, 0) {
            moves.push(Move::new(from, to, MoveFlag::CastleKingside));
        }
    }
    if can_castle(position, color, CastlingSide::Queenside) {
        if let Some(to) = from.offset(-2, 0) {
            moves.push(Move::new(from, to, MoveFlag::CastleQueenside));
        }
    }
}

/// Whether a pseudo-legal move keeps the mover's king safe.
fn keeps_king_safe(position: &Position, mov: Move) -> bool {
    let mover = position.active_color();
    !is_in_check(&position.apply_move(mov), mover)
}

/// Generates all legal moves for the side to move.
pub fn legal_moves(position: &Position) -> Vec<Move> {
    pseudo_legal_moves(position)
        .into_iter()
        .filter(|mov| keeps_king_safe(position, *mov))
        .collect()
}

/// Whether the side to move has at least one legal move.
pub fn has_legal_move(position: &Position) -> bool {
    pseudo_legal_moves(position)
        .into_iter()
        .any(|mov| keeps_king_safe(position, mov))
}

/// Legal moves of the piece on `square`, empty if the square does not hold
/// a piece of the side to move.
pub fn legal_moves_from(position: &Position, square: Square) -> Vec<Move> {
    match position.piece_at(square) {
        Some(piece) if piece.color == position.active_color() => legal_moves(position)
            .into_iter()
            .filter(|mov| mov.from == square)
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether `mov` is one of the legal moves in `position`. Never panics,
/// whatever the move holds.
pub fn is_legal(position: &Position, mov: &Move) -> bool {
    match position.piece_at(mov.from) {
        Some(piece) if piece.color == position.active_color() => {
            legal_moves_from(position, mov.from).contains(mov)
        }
        _ => false,
    }
}

/// Resolves coordinates to the matching legal move.
///
/// A promotion move needs `promotion` to pick the piece; a non-promotion
/// move must not carry one.
pub fn find_move(
    position: &Position,
    from: Square,
    to: Square,
    promotion: Option<PieceType>,
) -> Option<Move> {
    legal_moves_from(position, from)
        .into_iter()
        .find(|mov| mov.to == to && mov.promotion == promotion)
}

/// Whether moving from `from` to `to` would be a pawn promotion.
pub fn is_promotion_square(position: &Position, from: Square, to: Square) -> bool {
    match position.piece_at(from) {
        Some(piece) => {
            piece.piece_type == PieceType::Pawn && to.rank() == piece.color.promotion_rank()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn fen(s: &str) -> Position {
        Position::from_fen(s).unwrap()
    }

    #[test]
    fn start_position_has_twenty_moves() {
        let moves = legal_moves(&Position::new());
        assert_eq!(moves.len(), 20);
        assert_eq!(moves.iter().filter(|m| m.flag == MoveFlag::DoublePawnPush).count(), 8);
    }

    #[test]
    fn generation_order_is_deterministic() {
        let position = fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        assert_eq!(legal_moves(&position), legal_moves(&position.clone()));
    }

    #[test]
    fn test_can_castle_path_blocked() {
        let position = Position::new();
        assert!(!can_castle(&position, Color::White, CastlingSide::Kingside));
        assert!(!can_castle(&position, Color::White, CastlingSide::Queenside));
    }

    #[test]
    fn test_can_castle_open_path() {
        let position = fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert!(can_castle(&position, Color::White, CastlingSide::Kingside));
        assert!(can_castle(&position, Color::White, CastlingSide::Queenside));
        let castles: Vec<Move> = legal_moves(&position)
            .into_iter()
            .filter(Move::is_castle)
            .collect();
        assert_eq!(castles.len(), 2);
    }

    #[test]
    fn test_can_castle_without_rights() {
        let position = fen("r3k2r/8/8/8/8/8/8/R3K2R w kq - 0 1");
        assert!(!can_castle(&position, Color::White, CastlingSide::Kingside));
    }

    #[test]
    fn test_can_castle_path_attacked() {
        // Black rook on f8 covers f1
        let position = fen("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert!(!can_castle(&position, Color::White, CastlingSide::Kingside));
        assert!(can_castle(&position, Color::White, CastlingSide::Queenside));
    }

    #[test]
    fn test_cannot_castle_out_of_check() {
        let position = fen("4k3/4r3/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert!(!can_castle(&position, Color::White, CastlingSide::Kingside));
        assert!(!can_castle(&position, Color::White, CastlingSide::Queenside));
    }

    #[test]
    fn test_queenside_b_file_may_be_attacked() {
        // Black rook on b8 hits b1, which the king never crosses
        let position = fen("1r2k3/8/8/8/8/8/8/R3K3 w Q - 0 1");
        assert!(can_castle(&position, Color::White, CastlingSide::Queenside));
    }

    #[test]
    fn test_en_passant_capture() {
        let position = fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        let moves = legal_moves_from(&position, sq("d4"));
        assert!(moves.contains(&Move::new(sq("d4"), sq("e3"), MoveFlag::EnPassant)));
    }

    #[test]
    fn test_en_passant_exposing_king_is_illegal() {
        // Capturing en passant would open the fifth rank to the rook
        let position = fen("8/8/8/K2pP2r/8/8/8/7k w - d6 0 1");
        assert!(find_move(&position, sq("e5"), sq("d6"), None).is_none());
    }

    #[test]
    fn test_promotions_generate_four_moves() {
        let position = fen("8/4P3/8/8/8/8/8/k1K5 w - - 0 1");
        let promotions: Vec<Move> = legal_moves_from(&position, sq("e7"));
        assert_eq!(promotions.len(), 4);
        assert_eq!(promotions[0].promotion, Some(PieceType::Queen));
        assert!(find_move(&position, sq("e7"), sq("e8"), None).is_none());
        assert!(find_move(&position, sq("e7"), sq("e8"), Some(PieceType::Knight)).is_some());
        assert!(is_promotion_square(&position, sq("e7"), sq("e8")));
    }

    #[test]
    fn test_pinned_piece_cannot_move() {
        let position = fen("4k3/4r3/8/8/8/8/4B3/4K3 w - - 0 1");
        assert!(legal_moves_from(&position, sq("e2")).is_empty());
    }

    #[test]
    fn test_attack_detection() {
        let position = Position::new();
        assert!(is_square_attacked(&position, sq("f3"), Color::White));
        assert!(is_square_attacked(&position, sq("d6"), Color::Black));
        assert!(!is_square_attacked(&position, sq("e4"), Color::White));
        assert!(!is_in_check(&position, Color::White));

        let checked = fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert!(is_in_check(&checked, Color::White));
        assert!(!has_legal_move(&checked));
    }

    #[test]
    fn test_is_legal_rejects_nonsense() {
        let position = Position::new();
        // Empty square
        assert!(!is_legal(&position, &Move::new(sq("e4"), sq("e5"), MoveFlag::Normal)));
        // Wrong side
        assert!(!is_legal(&position, &Move::new(sq("e7"), sq("e5"), MoveFlag::DoublePawnPush)));
        // Onto own piece
        assert!(!is_legal(&position, &Move::new(sq("a1"), sq("a2"), MoveFlag::Normal)));
        // Wrong flag for an otherwise fine move
        assert!(!is_legal(&position, &Move::new(sq("e2"), sq("e4"), MoveFlag::Normal)));
        assert!(is_legal(&position, &Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePawnPush)));
    }

    /// Random games: every generated move flips the side to move and never
    /// leaves the mover in check.
    #[test]
    fn legality_invariant_over_random_walks() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut position = Position::new();
            for _ in 0..80 {
                let moves = legal_moves(&position);
                if moves.is_empty() {
                    break;
                }
                let mover = position.active_color();
                for mov in &moves {
                    let next = position.apply_move(*mov);
                    assert_ne!(next.active_color(), mover);
                    let fen = position.to_fen();
                    assert!(!is_in_check(&next, mover), "{} left king in check in {}", mov, fen);
                    assert_eq!(next.king_square(mover).is_some(), true);
                }
                let mov = moves[rng.gen_range(0..moves.len())];
                position.make_move(mov);
            }
        }
    }
}
