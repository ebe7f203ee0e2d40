//! Caro Engine - Board representation and GameState
//!
//! `Board` is a small immutable value (two bitboards + hash + move count);
//! `place` returns a new `Board` rather than mutating in place, giving cheap
//! structural sharing across move history. `GameState` layers current
//! player, clocks, game-over detection and append-only move history on top
//! of the raw bitboards.

use crate::error::{invariant_violation, EngineError, Result};
use crate::types::{Player, Pos, MAX_CELLS};
use crate::win::{self, WinResult};
use crate::BitBoard;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Fixed default seed used when `EngineConfig::rng_seed` is not supplied, so
/// that Zobrist keys (and therefore hashes) are reproducible across runs of
/// the same engine build.
pub const DEFAULT_ZOBRIST_SEED: u64 = 0x4361_726f_4761_6d65; // "CaroGame" in hex-ish

/// Per-(cell, player) Zobrist keys, generated once at engine construction.
#[derive(Clone)]
pub struct ZobristKeys {
    keys: [[u64; MAX_CELLS]; 2],
}

impl ZobristKeys {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut keys = [[0u64; MAX_CELLS]; 2];
        for side in keys.iter_mut() {
            for k in side.iter_mut() {
                *k = rng.next_u64();
            }
        }
        ZobristKeys { keys }
    }

    #[inline]
    pub fn key(&self, player: Player, cell: usize) -> u64 {
        self.keys[player.index()][cell]
    }
}

/// Immutable pair of bitboards with a Zobrist hash and move counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Board {
    red: BitBoard,
    blue: BitBoard,
    hash: u64,
    move_count: u16,
    size: u8,
}

impl Board {
    /// An empty board of the given side length.
    pub fn empty(size: u8) -> Self {
        Board {
            red: BitBoard::empty(),
            blue: BitBoard::empty(),
            hash: 0,
            move_count: 0,
            size,
        }
    }

    #[inline]
    pub fn size(&self) -> u8 {
        self.size
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn move_count(&self) -> u16 {
        self.move_count
    }

    #[inline]
    pub fn bit_board(&self, player: Player) -> &BitBoard {
        match player {
            Player::Red => &self.red,
            Player::Blue => &self.blue,
            Player::None => panic!("Board::bit_board called with Player::None"),
        }
    }

    #[inline]
    pub fn occupied(&self) -> BitBoard {
        self.red.union(&self.blue)
    }

    #[inline]
    pub fn is_empty_cell(&self, x: u8, y: u8) -> bool {
        let idx = Pos::new(x, y).to_index(self.size);
        !self.red.get(idx) && !self.blue.get(idx)
    }

    /// Returns the player occupying `(x, y)`, or `Player::None` if empty.
    /// No bounds checking is performed.
    #[inline]
    pub fn player_at(&self, x: u8, y: u8) -> Player {
        let idx = Pos::new(x, y).to_index(self.size);
        if self.red.get(idx) {
            Player::Red
        } else if self.blue.get(idx) {
            Player::Blue
        } else {
            Player::None
        }
    }

    /// Places a stone, returning a new `Board`. Fails with `IllegalMove` if
    /// out of range, occupied, or `player == Player::None`.
    pub fn place(&self, x: u8, y: u8, player: Player, zobrist: &ZobristKeys) -> Result<Board> {
        if !player.is_some() {
            return Err(EngineError::IllegalMove {
                pos: Pos::new(x, y),
                reason: "player must be Red or Blue",
            });
        }
        if !Pos::in_bounds(x as i32, y as i32, self.size) {
            return Err(EngineError::IllegalMove {
                pos: Pos::new(x, y),
                reason: "out of bounds",
            });
        }
        if !self.is_empty_cell(x, y) {
            return Err(EngineError::IllegalMove {
                pos: Pos::new(x, y),
                reason: "cell occupied",
            });
        }

        let idx = Pos::new(x, y).to_index(self.size);
        let mut next = *self;
        match player {
            Player::Red => next.red.set(idx),
            Player::Blue => next.blue.set(idx),
            Player::None => unreachable!(),
        }
        next.hash ^= zobrist.key(player, idx);
        next.move_count += 1;

        if next.red.intersects(&next.blue) {
            return Err(invariant_violation("red and blue bitboards overlap after place"));
        }
        Ok(next)
    }

    /// Recomputes the hash from scratch and compares to the stored hash
    ///. Used by tests and debug assertions, not the
    /// hot path.
    pub fn verify_hash(&self, zobrist: &ZobristKeys) -> bool {
        let mut h = 0u64;
        let cells = self.size as usize * self.size as usize;
        for idx in self.red.iter_set(cells) {
            h ^= zobrist.key(Player::Red, idx);
        }
        for idx in self.blue.iter_set(cells) {
            h ^= zobrist.key(Player::Blue, idx);
        }
        h == self.hash
    }

    pub fn win_at(&self, last: Pos, player: Player) -> WinResult {
        win::detect(self, last, player)
    }
}

/// Board + current player + clocks + history.
#[derive(Clone)]
pub struct GameState {
    board: Board,
    current: Player,
    time_remaining_ms: [u64; 2],
    game_over: bool,
    winner: Player,
    winning_line: Option<[Pos; 5]>,
    history: Vec<(Board, Player, Pos)>,
    zobrist: std::sync::Arc<ZobristKeys>,
}

impl GameState {
    pub fn new(size: u8, zobrist: std::sync::Arc<ZobristKeys>, time_remaining_ms: u64) -> Self {
        GameState {
            board: Board::empty(size),
            current: Player::Red,
            time_remaining_ms: [time_remaining_ms, time_remaining_ms],
            game_over: false,
            winner: Player::None,
            winning_line: None,
            history: Vec::new(),
            zobrist,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> Player {
        self.current
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn winner(&self) -> Player {
        self.winner
    }

    pub fn winning_line(&self) -> Option<[Pos; 5]> {
        self.winning_line
    }

    pub fn time_remaining_ms(&self, player: Player) -> u64 {
        self.time_remaining_ms[player.index()]
    }

    /// Records a move, alternating the current player. Fails if the game is
    /// already over or the move is illegal.
    pub fn record_move(&mut self, x: u8, y: u8) -> Result<()> {
        if self.game_over {
            return Err(EngineError::IllegalMove {
                pos: Pos::new(x, y),
                reason: "game is already over",
            });
        }
        let mover = self.current;
        let prev_board = self.board;
        let next_board = self.board.place(x, y, mover, &self.zobrist)?;
        let result = next_board.win_at(Pos::new(x, y), mover);

        self.history.push((prev_board, mover, Pos::new(x, y)));
        self.board = next_board;
        self.current = mover.opponent();

        if let Some(line) = result.winning_line {
            self.game_over = true;
            self.winner = mover;
            self.winning_line = Some(line);
        } else if self.board.move_count() as usize == self.board.size() as usize * self.board.size() as usize {
            self.game_over = true;
            self.winner = Player::None;
        }
        Ok(())
    }

    /// Undoes the last move, restoring the previous board and player.
    pub fn undo(&mut self) -> Result<()> {
        let (prev_board, mover, _pos) = self.history.pop().ok_or(EngineError::NoHistory)?;
        self.board = prev_board;
        self.current = mover;
        self.game_over = false;
        self.winner = Player::None;
        self.winning_line = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> ZobristKeys {
        ZobristKeys::new(DEFAULT_ZOBRIST_SEED)
    }

    #[test]
    fn empty_board_has_zero_hash_and_disjoint_bitsets() {
        let b = Board::empty(15);
        assert_eq!(b.hash(), 0);
        assert!(!b.bit_board(Player::Red).intersects(b.bit_board(Player::Blue)));
    }

    #[test]
    fn place_updates_hash_and_rejects_occupied() {
        let z = keys();
        let b = Board::empty(15);
        let b2 = b.place(7, 7, Player::Red, &z).unwrap();
        assert_ne!(b2.hash(), 0);
        assert!(b2.verify_hash(&z));
        assert!(b2.place(7, 7, Player::Blue, &z).is_err());
    }

    #[test]
    fn place_rejects_out_of_bounds_and_none() {
        let z = keys();
        let b = Board::empty(15);
        assert!(b.place(20, 0, Player::Red, &z).is_err());
        assert!(b.place(0, 0, Player::None, &z).is_err());
    }

    #[test]
    fn place_is_order_independent_on_hash() {
        let z = keys();
        let b = Board::empty(15);
        let a1 = b
            .place(3, 3, Player::Red, &z)
            .unwrap()
            .place(4, 4, Player::Blue, &z)
            .unwrap();
        let a2 = b
            .place(4, 4, Player::Blue, &z)
            .unwrap()
            .place(3, 3, Player::Red, &z)
            .unwrap();
        assert_eq!(a1.hash(), a2.hash());
    }

    #[test]
    fn game_state_record_and_undo_round_trip() {
        let z = std::sync::Arc::new(keys());
        let mut gs = GameState::new(15, z, 60_000);
        let before_hash = gs.board().hash();
        let before_player = gs.current_player();
        gs.record_move(7, 7).unwrap();
        assert_ne!(gs.board().hash(), before_hash);
        assert_eq!(gs.current_player(), before_player.opponent());
        gs.undo().unwrap();
        assert_eq!(gs.board().hash(), before_hash);
        assert_eq!(gs.current_player(), before_player);
    }

    #[test]
    fn undo_with_no_history_errors() {
        let z = std::sync::Arc::new(keys());
        let mut gs = GameState::new(15, z, 1_000);
        assert!(matches!(gs.undo(), Err(EngineError::NoHistory)));
    }
}
