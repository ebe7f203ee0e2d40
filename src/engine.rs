//! Caro Engine - Public engine API
//!
//! `Engine` is the single entry point a host application talks to: it owns
//! the transposition table, Zobrist keys, per-side ponder sessions and the
//! stats channel, and wires the lower modules (move generation, search,
//! VCF, the book, the time manager) together behind `get_best_move`.
//! Individual searches borrow this shared state for the duration of one
//! call rather than holding their own copies.

use crate::board::{Board, ZobristKeys, DEFAULT_ZOBRIST_SEED};
use crate::canon;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ordering::OrderingTables;
use crate::parallel::ParallelCoordinator;
use crate::pattern::{candidate_cells, classify_cell};
use crate::pondering::{self, PonderSession, PonderStats};
use crate::search::SearchContext;
use crate::time_manager::{self, Urgency};
use crate::tt::TranspositionTable;
use crate::types::{Difficulty, Player, Pos};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Public search statistics, handed back from `get_best_move` and
/// `get_search_statistics`. Deliberately distinct from the
/// internal per-call node counters in `search::NodeCounters` -- this is the
/// shape a caller actually wants to display.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchStats {
    pub depth: i32,
    pub nodes: u64,
    pub nps: u64,
    pub tt_hit_rate: f64,
    pub thread_count: usize,
    pub pondering: bool,
    pub ponder_hit: bool,
    pub vcf_depth: u32,
    pub vcf_nodes: u64,
    pub book_used: bool,
    pub allocated_time_ms: u64,
}

/// Estimate of how many moves remain before the position is decided, used
/// to size the time budget. A fixed conservative guess rather than an
/// estimate derived from game phase.
const DEFAULT_MOVES_TO_GO: u32 = 30;

/// Owns the shared search state for one game. Not `Clone`; a host holds one
/// `Engine` per running game and constructs a new one between unrelated
/// games (or calls `clear_all_state`).
pub struct Engine {
    tt: TranspositionTable,
    zobrist: Arc<ZobristKeys>,
    config: EngineConfig,
    cancel: AtomicBool,
    tables: Mutex<OrderingTables>,
    ponder: Mutex<[PonderSession; 2]>,
    last_stats: Mutex<SearchStats>,
    rng: Mutex<StdRng>,
}

/// Constructs an engine from `config`. Fails with `ResourceExhausted` if the
/// board size is unsupported or the TT cannot be sized.
pub fn new_engine(config: EngineConfig) -> Result<Engine> {
    if config.board_size != 15 && config.board_size != 19 {
        return Err(EngineError::ResourceExhausted("board_size must be 15 or 19"));
    }
    if config.tt_size_bytes == 0 {
        return Err(EngineError::ResourceExhausted("tt_size_bytes must be nonzero"));
    }

    let seed = config.rng_seed.unwrap_or(DEFAULT_ZOBRIST_SEED);
    let zobrist = Arc::new(ZobristKeys::new(seed));
    let tt = TranspositionTable::new(config.tt_size_bytes, config.board_size);
    let tables = OrderingTables::new(config.board_size);
    let rng = StdRng::seed_from_u64(seed ^ 0x5151_5151_5151_5151);

    Ok(Engine {
        tt,
        zobrist,
        config,
        cancel: AtomicBool::new(false),
        tables: Mutex::new(tables),
        ponder: Mutex::new([PonderSession::new(), PonderSession::new()]),
        last_stats: Mutex::new(SearchStats::default()),
        rng: Mutex::new(rng),
    })
}

impl Engine {
    pub fn zobrist(&self) -> &Arc<ZobristKeys> {
        &self.zobrist
    }

    fn root_urgency(&self, board: &Board, side: Player) -> Urgency {
        let candidates = candidate_cells(board);
        let must_block_count = candidates
            .iter()
            .filter(|&&p| classify_cell(board, p.x, p.y, side).is_must_block())
            .count();
        if must_block_count == 1 {
            Urgency::Forced
        } else if candidates.iter().any(|&p| classify_cell(board, p.x, p.y, side).is_winning()) || must_block_count > 0 {
            Urgency::High
        } else {
            Urgency::Normal
        }
    }

    /// Returns the move the engine plays, and the stats of the search that
    /// produced it. Consults the opening book first (gated by
    /// `difficulty`'s book-ply cap), then a timed search, then applies the
    /// difficulty's error rate by occasionally substituting a random legal
    /// move instead of the engine's choice.
    #[allow(clippy::too_many_arguments)]
    pub fn get_best_move(
        &self,
        board: &Board,
        side: Player,
        difficulty: Difficulty,
        time_remaining_ms: u64,
        move_number: u16,
        ponder_enabled: bool,
        parallel_enabled: bool,
    ) -> Result<(Pos, SearchStats)> {
        self.get_best_move_with_callback(
            board,
            side,
            difficulty,
            time_remaining_ms,
            move_number,
            ponder_enabled,
            parallel_enabled,
            |_| {},
        )
    }

    /// As `get_best_move`, but invokes `on_iteration` once per completed
    /// iterative-deepening depth, for incremental UI updates.
    #[allow(clippy::too_many_arguments)]
    pub fn get_best_move_with_callback(
        &self,
        board: &Board,
        side: Player,
        difficulty: Difficulty,
        time_remaining_ms: u64,
        move_number: u16,
        ponder_enabled: bool,
        parallel_enabled: bool,
        mut on_iteration: impl FnMut(SearchStats),
    ) -> Result<(Pos, SearchStats)> {
        let profile = difficulty.profile();
        let candidates = candidate_cells(board);
        let legal: Vec<Pos> = candidates
            .into_iter()
            .filter(|&p| !crate::movegen::open_rule_forbids(board, side, p))
            .collect();
        if legal.is_empty() {
            return Err(EngineError::NoLegalMove);
        }

        self.cancel.store(false, Ordering::Relaxed);

        let book_store = self.config.resolved_book_store();
        let canonical = canon::canonicalize(board, &self.zobrist);
        let mut book_used = false;
        let mut chosen = None;

        if profile.book_ply_cap > 0 {
            let entries = book_store.lookup(canonical.hash, side);
            if let Some(entry) = entries.iter().max_by_key(|e| e.score) {
                if let Some(mv) = canon::resolve_book_move(entry, canonical, board, profile.book_ply_cap) {
                    chosen = Some(mv);
                    book_used = true;
                }
            }
        }

        let urgency = self.root_urgency(board, side);
        let allocated = (time_manager::allocate_budget_ms(
            time_remaining_ms,
            0,
            DEFAULT_MOVES_TO_GO,
            move_number,
            urgency,
        ) as f64
            * profile.time_multiplier) as u64;

        let (mut mv, mut stats) = if let Some(book_move) = chosen {
            (book_move, SearchStats { book_used, allocated_time_ms: 0, ..Default::default() })
        } else {
            let use_parallel = profile.parallel && parallel_enabled;
            let threads = if use_parallel { self.config.resolved_threads() } else { 1 };

            let start = std::time::Instant::now();
            let search_result = {
                let allocated = allocated.max(1);
                std::thread::scope(|scope| {
                    scope.spawn(|| {
                        let deadline = Duration::from_millis(allocated);
                        while start.elapsed() < deadline {
                            if self.cancel.load(Ordering::Relaxed) {
                                return;
                            }
                            std::thread::sleep(Duration::from_millis(5).min(deadline));
                        }
                        self.cancel.store(true, Ordering::Relaxed);
                    });

                    let result = if use_parallel {
                        let coordinator = ParallelCoordinator::new(&self.tt, &self.zobrist, &self.cancel, threads);
                        coordinator.search(board, side, None, profile.max_depth, self.config.board_size)
                    } else {
                        let mut tables = self.tables.lock().unwrap();
                        let mut ctx = SearchContext::new(&self.tt, &self.zobrist, &mut tables, &self.cancel);
                        self.tt.new_generation();
                        ctx.iterative_deepening(board, side, None, profile.max_depth, 1, |r| {
                            on_iteration(SearchStats {
                                depth: r.depth_reached,
                                nodes: r.stats.nodes,
                                ..Default::default()
                            });
                        })
                    };
                    self.cancel.store(true, Ordering::Relaxed);
                    result
                })
            };
            let elapsed = start.elapsed();

            let nps = if elapsed.as_millis() > 0 {
                (search_result.stats.nodes * 1000) / elapsed.as_millis() as u64
            } else {
                search_result.stats.nodes
            };
            let tt_hit_rate = if search_result.stats.nodes > 0 {
                search_result.stats.tt_hits as f64 / search_result.stats.nodes as f64
            } else {
                0.0
            };

            let resolved_move = search_result.best_move.or_else(|| self.root_tt_move(board)).or(legal.first().copied());

            let mv = resolved_move.ok_or(EngineError::NoLegalMove)?;
            let stats = SearchStats {
                depth: search_result.depth_reached,
                nodes: search_result.stats.nodes,
                nps,
                tt_hit_rate,
                thread_count: threads,
                pondering: false,
                ponder_hit: false,
                vcf_depth: if search_result.stats.vcf_nodes > 0 { crate::vcf::DEFAULT_VCF_DEPTH } else { 0 },
                vcf_nodes: search_result.stats.vcf_nodes,
                book_used,
                allocated_time_ms: allocated,
            };
            (mv, stats)
        };

        if profile.error_rate > 0.0 {
            let mut rng = self.rng.lock().unwrap();
            if rng.gen::<f64>() < profile.error_rate {
                if let Some(&random_move) = legal.get(rng.gen_range(0..legal.len())) {
                    mv = random_move;
                    stats.book_used = false;
                }
            }
        }

        if !legal.contains(&mv) {
            mv = legal[0];
        }

        *self.last_stats.lock().unwrap() = stats;

        if ponder_enabled && profile.ponder && !pondering::is_too_quiet_to_ponder(board) {
            if let Ok(played) = board.place(mv.x, mv.y, side, &self.zobrist) {
                self.maybe_start_pondering(&played, side.opponent());
            }
        }

        Ok((mv, stats))
    }

    fn root_tt_move(&self, board: &Board) -> Option<Pos> {
        self.tt.probe(board.hash()).and_then(|e| e.mv)
    }

    fn maybe_start_pondering(&self, board_after_own_move: &Board, opponent_side: Player) {
        let candidates = candidate_cells(board_after_own_move);
        let predicted = candidates
            .into_iter()
            .max_by_key(|&p| crate::pattern::pattern_weight(classify_cell(board_after_own_move, p.x, p.y, opponent_side)));
        if let Some(predicted_reply) = predicted {
            if let Ok(board_after_predicted) = board_after_own_move.place(predicted_reply.x, predicted_reply.y, opponent_side, &self.zobrist) {
                let mut sessions = self.ponder.lock().unwrap();
                sessions[opponent_side.index()].start(predicted_reply, board_after_predicted);
            }
        }
    }

    /// Non-blocking: records the predicted board to resume from if
    /// `opponent_move` matches, clearing the session otherwise. Actual background search dispatch is left to the host's own
    /// scheduling, mirroring `start_pondering`'s "non-blocking" contract.
    pub fn start_pondering(&self, board: &Board, opponent_move: Pos, side_to_ponder: Player, _difficulty: Difficulty) {
        let mut sessions = self.ponder.lock().unwrap();
        sessions[side_to_ponder.index()].on_opponent_move(opponent_move);
        let _ = board;
    }

    /// Stops pondering for `side` and returns the accumulated stats.
    pub fn stop_pondering(&self, side: Player) -> PonderStats {
        self.cancel.store(true, Ordering::Relaxed);
        let mut sessions = self.ponder.lock().unwrap();
        sessions[side.index()].cancel()
    }

    /// Clears per-thread ordering tables but preserves the TT, for reuse
    /// across closely related positions.
    pub fn clear_search_state(&self) {
        self.tables.lock().unwrap().decay();
    }

    /// Clears the TT and all per-thread tables; required between unrelated
    /// games.
    pub fn clear_all_state(&self) {
        self.tt.clear();
        self.tables.lock().unwrap().clear_all();
        let mut sessions = self.ponder.lock().unwrap();
        *sessions = [PonderSession::new(), PonderSession::new()];
    }

    /// Returns the stats of the most recently completed `get_best_move`
    /// call.
    pub fn get_search_statistics(&self) -> SearchStats {
        *self.last_stats.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn rejects_unsupported_board_size() {
        let cfg = EngineConfig::new(12);
        assert!(new_engine(cfg).is_err());
    }

    #[test]
    fn first_move_on_empty_board_is_center() {
        let engine = new_engine(EngineConfig::new(15)).unwrap();
        let board = Board::empty(15);
        let (mv, _stats) = engine
            .get_best_move(&board, Player::Red, Difficulty::Easy, 60_000, 0, false, false)
            .unwrap();
        assert_eq!(mv, Pos::new(7, 7));
    }

    #[test]
    fn clear_all_state_resets_ponder_sessions() {
        let engine = new_engine(EngineConfig::new(15)).unwrap();
        engine.clear_all_state();
        assert_eq!(engine.ponder.lock().unwrap()[0].state(), crate::pondering::PonderState::Idle);
    }

    #[test]
    fn no_legal_move_on_full_board_returns_error() {
        let engine = new_engine(EngineConfig::new(15)).unwrap();
        let mut board = Board::empty(15);
        let mut side = Player::Red;
        'fill: for y in 0..15 {
            for x in 0..15 {
                match board.place(x, y, side, &engine.zobrist) {
                    Ok(next) => {
                        if next.win_at(Pos::new(x, y), side).winning_line.is_some() {
                            break 'fill;
                        }
                        board = next;
                        side = side.opponent();
                    }
                    Err(_) => continue,
                }
            }
        }
        let _ = engine.get_best_move(&board, side, Difficulty::Easy, 1_000, 200, false, false);
    }
}
