//! Caro Engine - Position canonicalizer and opening book lookup
//!
//! Positions where no stone is within 5 cells of any edge reduce to one of
//! 8 board symmetries (identity, 3 rotations, 4 reflections); the runtime
//! picks the symmetry whose resulting hash is lexicographically minimum and
//! remembers which one it applied so a looked-up relative move can be
//! mapped back. Near-edge positions are stored non-canonicalized. Book
//! lookup sits behind an abstract `BookStore` trait so persistence stays
//! external to this crate.

use crate::board::{Board, ZobristKeys};
use crate::types::{Player, Pos};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symmetry {
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
    ReflectHorizontal,
    ReflectVertical,
    ReflectDiagMain,
    ReflectDiagAnti,
}

impl Symmetry {
    pub const ALL: [Symmetry; 8] = [
        Symmetry::Identity,
        Symmetry::Rotate90,
        Symmetry::Rotate180,
        Symmetry::Rotate270,
        Symmetry::ReflectHorizontal,
        Symmetry::ReflectVertical,
        Symmetry::ReflectDiagMain,
        Symmetry::ReflectDiagAnti,
    ];

    /// Applies the symmetry to a single cell coordinate on a `size x size`
    /// board.
    pub fn apply(self, pos: Pos, size: u8) -> Pos {
        let n = size as i32 - 1;
        let (x, y) = (pos.x as i32, pos.y as i32);
        let (nx, ny) = match self {
            Symmetry::Identity => (x, y),
            Symmetry::Rotate90 => (n - y, x),
            Symmetry::Rotate180 => (n - x, n - y),
            Symmetry::Rotate270 => (y, n - x),
            Symmetry::ReflectHorizontal => (n - x, y),
            Symmetry::ReflectVertical => (x, n - y),
            Symmetry::ReflectDiagMain => (y, x),
            Symmetry::ReflectDiagAnti => (n - y, n - x),
        };
        Pos::new(nx as u8, ny as u8)
    }

    /// The symmetry that undoes `self`.
    pub fn inverse(self) -> Symmetry {
        match self {
            Symmetry::Rotate90 => Symmetry::Rotate270,
            Symmetry::Rotate270 => Symmetry::Rotate90,
            other => other,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Canonical {
    pub hash: u64,
    pub symmetry: Symmetry,
}

/// How close to an edge a stone must be (Chebyshev-from-edge distance) to
/// disable canonicalization for the whole position.
const EDGE_GUARD: u8 = 5;

fn any_stone_near_edge(board: &Board) -> bool {
    let size = board.size();
    let cells = size as usize * size as usize;
    let occupied = board.occupied();
    occupied.iter_set(cells).any(|idx| {
        let p = Pos::from_index(idx, size);
        p.x < EDGE_GUARD || p.y < EDGE_GUARD || p.x >= size - EDGE_GUARD || p.y >= size - EDGE_GUARD
    })
}

fn hash_under_symmetry(board: &Board, sym: Symmetry, zobrist: &ZobristKeys) -> u64 {
    let size = board.size();
    let cells = size as usize * size as usize;
    let mut h = 0u64;
    for player in [Player::Red, Player::Blue] {
        for idx in board.bit_board(player).iter_set(cells) {
            let pos = Pos::from_index(idx, size);
            let mapped = sym.apply(pos, size);
            h ^= zobrist.key(player, mapped.to_index(size));
        }
    }
    h
}

/// Computes the canonical hash and the symmetry applied to reach it. Returns
/// `Symmetry::Identity` unconditionally for near-edge positions.
pub fn canonicalize(board: &Board, zobrist: &ZobristKeys) -> Canonical {
    if any_stone_near_edge(board) {
        return Canonical { hash: board.hash(), symmetry: Symmetry::Identity };
    }
    Symmetry::ALL
        .into_iter()
        .map(|sym| Canonical { hash: hash_under_symmetry(board, sym, zobrist), symmetry: sym })
        .min_by_key(|c| c.hash)
        .unwrap()
}

/// One opening-book entry, keyed by canonical hash + side to move and
/// expressed relative to the canonical orientation.
#[derive(Clone, Copy, Debug)]
pub struct BookEntry {
    pub relative_move: Pos,
    pub score: i32,
    pub depth_achieved: i32,
    pub is_verified: bool,
    pub is_forcing: bool,
}

/// Read-only lookup contract; persistence and book generation live outside
/// this crate.
pub trait BookStore: Send + Sync {
    fn lookup(&self, canonical_hash: u64, side: Player) -> Vec<BookEntry>;
}

/// A book store with nothing in it; used when no book is configured.
pub struct NullBookStore;

impl BookStore for NullBookStore {
    fn lookup(&self, _canonical_hash: u64, _side: Player) -> Vec<BookEntry> {
        Vec::new()
    }
}

/// A book store backed by an in-memory map, useful for tests and for small
/// hand-curated books loaded wholesale at startup.
pub struct InMemoryBookStore {
    entries: std::collections::HashMap<(u64, usize), Vec<BookEntry>>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        InMemoryBookStore { entries: std::collections::HashMap::new() }
    }

    pub fn insert(&mut self, canonical_hash: u64, side: Player, entry: BookEntry) {
        self.entries.entry((canonical_hash, side.index())).or_default().push(entry);
    }
}

impl Default for InMemoryBookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookStore for InMemoryBookStore {
    fn lookup(&self, canonical_hash: u64, side: Player) -> Vec<BookEntry> {
        self.entries.get(&(canonical_hash, side.index())).cloned().unwrap_or_default()
    }
}

/// A book store backed by a `&'static` slice baked in at compile time, for
/// shipping a small fixed opening repertoire without external I/O.
pub struct StaticBookStore {
    entries: &'static [(u64, usize, BookEntry)],
}

impl StaticBookStore {
    pub const fn new(entries: &'static [(u64, usize, BookEntry)]) -> Self {
        StaticBookStore { entries }
    }
}

impl BookStore for StaticBookStore {
    fn lookup(&self, canonical_hash: u64, side: Player) -> Vec<BookEntry> {
        self.entries
            .iter()
            .filter(|(h, s, _)| *h == canonical_hash && *s == side.index())
            .map(|(_, _, e)| *e)
            .collect()
    }
}

/// Maps a book entry's relative move back to absolute board coordinates by
/// inverting the recorded symmetry, then checks legality and the
/// difficulty's book-depth cap.
pub fn resolve_book_move(
    entry: &BookEntry,
    canonical: Canonical,
    board: &Board,
    book_ply_cap: u16,
) -> Option<Pos> {
    if board.move_count() >= book_ply_cap {
        return None;
    }
    let absolute = canonical.symmetry.inverse().apply(entry.relative_move, board.size());
    if board.is_empty_cell(absolute.x, absolute.y) {
        Some(absolute)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::DEFAULT_ZOBRIST_SEED;

    #[test]
    fn identity_symmetry_is_a_no_op() {
        let p = Pos::new(3, 4);
        assert_eq!(Symmetry::Identity.apply(p, 15), p);
    }

    #[test]
    fn rotate90_four_times_is_identity() {
        let p = Pos::new(3, 4);
        let mut cur = p;
        for _ in 0..4 {
            cur = Symmetry::Rotate90.apply(cur, 15);
        }
        assert_eq!(cur, p);
    }

    #[test]
    fn inverse_undoes_symmetry() {
        let p = Pos::new(2, 11);
        for sym in Symmetry::ALL {
            let mapped = sym.apply(p, 15);
            assert_eq!(sym.inverse().apply(mapped, 15), p);
        }
    }

    #[test]
    fn near_edge_position_is_not_canonicalized() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = Board::empty(15).place(0, 0, Player::Red, &z).unwrap();
        let canon = canonicalize(&b, &z);
        assert_eq!(canon.symmetry, Symmetry::Identity);
    }

    #[test]
    fn central_position_picks_minimal_hash_symmetry() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = Board::empty(15).place(7, 7, Player::Red, &z).unwrap();
        let canon = canonicalize(&b, &z);
        // Every symmetry maps the single center stone to itself, so the
        // canonical hash must equal the direct hash regardless of which
        // symmetry "wins" the tie.
        assert_eq!(canon.hash, b.hash());
    }

    #[test]
    fn in_memory_book_store_round_trips() {
        let mut store = InMemoryBookStore::new();
        let entry = BookEntry { relative_move: Pos::new(8, 8), score: 10, depth_achieved: 6, is_verified: true, is_forcing: false };
        store.insert(42, Player::Red, entry);
        let got = store.lookup(42, Player::Red);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].relative_move, Pos::new(8, 8));
    }
}
