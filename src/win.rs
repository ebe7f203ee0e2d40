//! Caro Engine - Win Detector (exactly-five rule)
//!
//! After a stone is placed, a run of six or more in a row is an *overline*
//! and is explicitly **not** a win under Caro rules; only a
//! run of exactly five counts.

use crate::board::Board;
use crate::types::{Direction, Player, Pos};

#[derive(Clone, Copy, Debug, Default)]
pub struct WinResult {
    pub winning_line: Option<[Pos; 5]>,
}

/// Checks all four directions through `last` for a run of `player`'s stones.
/// Reports a win iff the *longest* such run has length exactly 5.
pub fn detect(board: &Board, last: Pos, player: Player) -> WinResult {
    let size = board.size();
    let bb = board.bit_board(player);

    for dir in Direction::ALL {
        let (dx, dy) = dir.step();
        let (start, len) = run_extent(bb, last, dx, dy, size);
        if len == 5 {
            let mut line = [Pos::new(0, 0); 5];
            for (i, item) in line.iter_mut().enumerate() {
                *item = Pos::new(
                    (start.x as i32 + dx * i as i32) as u8,
                    (start.y as i32 + dy * i as i32) as u8,
                );
            }
            return WinResult { winning_line: Some(line) };
        }
    }
    WinResult { winning_line: None }
}

/// Returns the start cell and length of the maximal contiguous run of set
/// bits through `cell` along direction `(dx, dy)` (and its negation).
fn run_extent(
    bb: &crate::BitBoard,
    cell: Pos,
    dx: i32,
    dy: i32,
    size: u8,
) -> (Pos, u32) {
    let mut back = 0i32;
    loop {
        let nx = cell.x as i32 - dx * (back + 1);
        let ny = cell.y as i32 - dy * (back + 1);
        if !Pos::in_bounds(nx, ny, size) {
            break;
        }
        let idx = Pos::new(nx as u8, ny as u8).to_index(size);
        if !bb.get(idx) {
            break;
        }
        back += 1;
    }
    let mut fwd = 0i32;
    loop {
        let nx = cell.x as i32 + dx * (fwd + 1);
        let ny = cell.y as i32 + dy * (fwd + 1);
        if !Pos::in_bounds(nx, ny, size) {
            break;
        }
        let idx = Pos::new(nx as u8, ny as u8).to_index(size);
        if !bb.get(idx) {
            break;
        }
        fwd += 1;
    }
    let start = Pos::new(
        (cell.x as i32 - dx * back) as u8,
        (cell.y as i32 - dy * back) as u8,
    );
    (start, (back + fwd + 1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, ZobristKeys, DEFAULT_ZOBRIST_SEED};

    fn place_run(board: Board, z: &ZobristKeys, player: Player, cells: &[(u8, u8)]) -> Board {
        let mut b = board;
        for &(x, y) in cells {
            b = b.place(x, y, player, z).unwrap();
        }
        b
    }

    #[test]
    fn exactly_five_wins() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = place_run(
            Board::empty(15),
            &z,
            Player::Red,
            &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)],
        );
        let result = b.win_at(Pos::new(4, 0), Player::Red);
        assert!(result.winning_line.is_some());
    }

    #[test]
    fn six_in_a_row_is_not_a_win() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = place_run(
            Board::empty(15),
            &z,
            Player::Red,
            &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)],
        );
        let result = b.win_at(Pos::new(5, 0), Player::Red);
        assert!(result.winning_line.is_none());

        // removing the sixth stone restores the win, simulated here by
        // checking the 5-run board directly
        let b5 = place_run(
            Board::empty(15),
            &z,
            Player::Red,
            &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)],
        );
        assert!(b5.win_at(Pos::new(4, 0), Player::Red).winning_line.is_some());
    }

    #[test]
    fn no_win_reports_none() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = place_run(Board::empty(15), &z, Player::Red, &[(0, 0), (1, 0)]);
        assert!(b.win_at(Pos::new(1, 0), Player::Red).winning_line.is_none());
    }

    #[test]
    fn vertical_and_diagonal_runs_detected() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let bv = place_run(
            Board::empty(15),
            &z,
            Player::Blue,
            &[(2, 0), (2, 1), (2, 2), (2, 3), (2, 4)],
        );
        assert!(bv.win_at(Pos::new(2, 4), Player::Blue).winning_line.is_some());

        let bd = place_run(
            Board::empty(15),
            &z,
            Player::Blue,
            &[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)],
        );
        assert!(bd.win_at(Pos::new(4, 4), Player::Blue).winning_line.is_some());
    }
}
