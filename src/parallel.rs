//! Caro Engine - Lazy SMP parallel coordinator
//!
//! One master thread and N-1 helpers share only the transposition table;
//! each owns its own killer/history/continuation/counter-move tables so
//! there is no contention on those. Helpers with an odd thread id skew
//! their iterative-deepening schedule by skipping every other depth, which
//! diversifies what gets explored concurrently. `std::thread::scope` bounds
//! every worker's lifetime to the single `get_best_move` call, so no thread
//! can outlive the search that spawned it.

use crate::board::{Board, ZobristKeys};
use crate::ordering::OrderingTables;
use crate::search::{SearchContext, SearchResult};
use crate::types::{Player, Pos};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single write-protected "best root" slot, updated only on improvement.
struct BestRoot {
    depth_reached: i32,
    score: i32,
    best_move: Option<Pos>,
}

pub struct ParallelCoordinator<'a> {
    tt: &'a crate::tt::TranspositionTable,
    zobrist: &'a ZobristKeys,
    cancel: &'a AtomicBool,
    thread_count: usize,
}

impl<'a> ParallelCoordinator<'a> {
    pub fn new(
        tt: &'a crate::tt::TranspositionTable,
        zobrist: &'a ZobristKeys,
        cancel: &'a AtomicBool,
        thread_count: usize,
    ) -> Self {
        ParallelCoordinator { tt, zobrist, cancel, thread_count: thread_count.max(1) }
    }

    /// Runs `thread_count` Lazy-SMP workers and returns the master's result,
    /// falling back to the shared best-root slot on cancellation.
    pub fn search(&self, board: &Board, side: Player, last_move: Option<Pos>, max_depth: i32, board_size: u8) -> SearchResult {
        self.tt.new_generation();
        let best_root = Mutex::new(BestRoot { depth_reached: 0, score: 0, best_move: None });
        let master_result = Mutex::new(None::<SearchResult>);

        std::thread::scope(|scope| {
            for worker_id in 0..self.thread_count {
                let tt = self.tt;
                let zobrist = self.zobrist;
                let cancel = self.cancel;
                let best_root = &best_root;
                let master_result = &master_result;

                scope.spawn(move || {
                    let mut tables = OrderingTables::new(board_size);
                    let mut ctx = SearchContext::new(tt, zobrist, &mut tables, cancel);
                    // Odd-id helpers skew their schedule to every other depth
                    //; the master (id 0) always steps by 1.
                    let depth_step = if worker_id != 0 && worker_id % 2 == 1 { 2 } else { 1 };

                    let result = ctx.iterative_deepening(board, side, last_move, max_depth, depth_step, |iter_result| {
                        let mut slot = best_root.lock();
                        if iter_result.depth_reached > slot.depth_reached
                            || (iter_result.depth_reached == slot.depth_reached && iter_result.score > slot.score)
                        {
                            slot.depth_reached = iter_result.depth_reached;
                            slot.score = iter_result.score;
                            slot.best_move = iter_result.best_move;
                        }
                    });

                    if worker_id == 0 {
                        *master_result.lock() = Some(result);
                    }
                });
            }
        });

        if let Some(result) = master_result.into_inner() {
            if result.best_move.is_some() {
                return result;
            }
        }

        let fallback = best_root.into_inner();
        SearchResult {
            best_move: fallback.best_move,
            score: fallback.score,
            depth_reached: fallback.depth_reached,
            stats: crate::search::NodeCounters::default(),
            pv: fallback.best_move.into_iter().collect(),
        }
    }

    pub fn broadcast_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, DEFAULT_ZOBRIST_SEED, ZobristKeys};
    use crate::tt::TranspositionTable;

    #[test]
    fn single_thread_search_returns_a_move() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = Board::empty(15);
        let tt = TranspositionTable::new(1024 * 1024, 15);
        let cancel = AtomicBool::new(false);
        let coord = ParallelCoordinator::new(&tt, &z, &cancel, 1);
        let result = coord.search(&b, Player::Red, None, 2, 15);
        assert_eq!(result.best_move, Some(Pos::new(7, 7)));
    }

    #[test]
    fn multi_thread_search_returns_a_legal_move() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = Board::empty(15).place(7, 7, Player::Red, &z).unwrap();
        let tt = TranspositionTable::new(1024 * 1024, 15);
        let cancel = AtomicBool::new(false);
        let coord = ParallelCoordinator::new(&tt, &z, &cancel, 3);
        let result = coord.search(&b, Player::Blue, Some(Pos::new(7, 7)), 2, 15);
        assert!(result.best_move.is_some());
    }
}
