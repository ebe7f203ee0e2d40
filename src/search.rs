//! Caro Engine - Alpha-Beta / PVS search core
//!
//! Iterative deepening with aspiration windows around a root search; interior
//! nodes run negamax with null-window (PVS) re-searches and late-move
//! reductions, bottoming out in a short quiescence search. The root loop is
//! kept separate from interior nodes so the best root move is always
//! available even mid-iteration, adapted to a single-ply-per-move game with
//! no captures.

use crate::board::{Board, ZobristKeys};
use crate::movegen::MovePicker;
use crate::ordering::OrderingTables;
use crate::pattern::static_eval;
use crate::tt::{Bound, TranspositionTable};
use crate::types::{Pattern4, Player, Pos};
use crate::vcf::{self, VcfSolver};
use std::sync::atomic::{AtomicBool, Ordering};

pub const INFINITY: i32 = 1_000_000;
pub const WIN_SCORE: i32 = 100_000;
const NODE_CHECK_INTERVAL: u64 = 2_048;
const MAX_QUIESCENCE_PLY: u32 = 6;
const HISTORY_PRUNE_DIVISOR: i32 = 4_096;

#[derive(Clone, Debug, Default)]
pub struct NodeCounters {
    pub nodes: u64,
    pub tt_hits: u64,
    pub depth_reached: i32,
    pub vcf_nodes: u64,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best_move: Option<Pos>,
    pub score: i32,
    pub depth_reached: i32,
    pub stats: NodeCounters,
    pub pv: Vec<Pos>,
}

pub struct SearchContext<'a> {
    pub tt: &'a TranspositionTable,
    pub zobrist: &'a ZobristKeys,
    pub tables: &'a mut OrderingTables,
    pub cancel: &'a AtomicBool,
    nodes: u64,
    tt_hits: u64,
    node_check_counter: u64,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        tt: &'a TranspositionTable,
        zobrist: &'a ZobristKeys,
        tables: &'a mut OrderingTables,
        cancel: &'a AtomicBool,
    ) -> Self {
        SearchContext { tt, zobrist, tables, cancel, nodes: 0, tt_hits: 0, node_check_counter: 0 }
    }

    fn cancelled(&mut self) -> bool {
        self.node_check_counter += 1;
        if self.node_check_counter >= NODE_CHECK_INTERVAL {
            self.node_check_counter = 0;
        }
        self.cancel.load(Ordering::Relaxed)
    }

    /// Iterative deepening driver: grows `depth` from 1 until `max_depth`,
    /// cancellation, or a forced win, centering each iteration's window on
    /// the previous score. `depth_step` lets Lazy SMP helper
    /// threads skew their schedule by searching every other depth; the master always passes 1. Callers own bumping the shared
    /// TT generation once per top-level search, not once per worker.
    pub fn iterative_deepening(
        &mut self,
        board: &Board,
        side: Player,
        last_move: Option<Pos>,
        max_depth: i32,
        depth_step: i32,
        mut on_iteration: impl FnMut(&SearchResult),
    ) -> SearchResult {
        let depth_step = depth_step.max(1);

        if has_urgent_own_threat(board, side) {
            let mut solver = VcfSolver::new(self.tt, self.zobrist, vcf::DEFAULT_VCF_DEPTH, self.cancel);
            let vcf_result = solver.solve(board, side);
            if vcf_result.winning {
                if let Some(&first) = vcf_result.sequence.first() {
                    return SearchResult {
                        best_move: Some(first),
                        score: WIN_SCORE,
                        depth_reached: 0,
                        stats: NodeCounters { vcf_nodes: vcf_result.nodes, ..Default::default() },
                        pv: vcf_result.sequence,
                    };
                }
            }
        }

        let mut best_move = None;
        let mut best_score = 0;
        let mut depth_reached = 0;

        let mut depth = 1;
        while depth <= max_depth {
            let mut delta = 50;
            let (mut alpha, mut beta) = if depth == 1 {
                (-INFINITY, INFINITY)
            } else {
                (best_score - delta, best_score + delta)
            };

            let (score, mv) = loop {
                let (score, mv) = self.root_search(board, side, last_move, depth, alpha, beta);
                if self.cancel.load(Ordering::Relaxed) {
                    break (score, mv);
                }
                if score <= alpha {
                    alpha = (alpha - delta).max(-INFINITY);
                    delta *= 2;
                } else if score >= beta {
                    beta = (beta + delta).min(INFINITY);
                    delta *= 2;
                } else {
                    break (score, mv);
                }
            };

            if mv.is_some() {
                best_move = mv;
                best_score = score;
                depth_reached = depth;
            }

            let result = SearchResult {
                best_move,
                score: best_score,
                depth_reached,
                stats: NodeCounters {
                    nodes: self.nodes,
                    tt_hits: self.tt_hits,
                    depth_reached,
                    vcf_nodes: 0,
                },
                pv: best_move.into_iter().collect(),
            };
            on_iteration(&result);

            if self.cancel.load(Ordering::Relaxed) || best_score.abs() >= WIN_SCORE - max_depth {
                break;
            }
            depth += depth_step;
        }

        SearchResult {
            best_move,
            score: best_score,
            depth_reached,
            stats: NodeCounters { nodes: self.nodes, tt_hits: self.tt_hits, depth_reached, vcf_nodes: 0 },
            pv: best_move.into_iter().collect(),
        }
    }

    fn root_search(
        &mut self,
        board: &Board,
        side: Player,
        last_move: Option<Pos>,
        depth: i32,
        alpha: i32,
        beta: i32,
    ) -> (i32, Option<Pos>) {
        let tt_move = self.tt.probe(board.hash()).and_then(|e| e.mv);
        let killers = self.tables.killer.get(0);
        let counter = last_move.and_then(|m| self.tables.counter.get(side.index(), m));
        let mut picker = MovePicker::new(board, side, self.tables, tt_move, killers, counter, last_move, depth);

        let mut alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;
        let mut move_count = 0;
        let mut searched_quiets: Vec<Pos> = Vec::new();

        while let Some(mv) = picker.next() {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            move_count += 1;
            let next = match board.place(mv.x, mv.y, side, self.zobrist) {
                Ok(b) => b,
                Err(_) => continue,
            };

            let score = if move_count == 1 {
                -self.negamax(&next, side.opponent(), Some(mv), depth - 1, 1, -beta, -alpha, true, 0)
            } else {
                let reduced = self.reduction(depth, move_count, false, false, Some(mv) == tt_move, 0);
                let reduced_depth = (depth - 1 - reduced).max(0);
                let mut s = -self.negamax(&next, side.opponent(), Some(mv), reduced_depth, 1, -alpha - 1, -alpha, false, 0);
                if s > alpha && reduced > 0 {
                    s = -self.negamax(&next, side.opponent(), Some(mv), depth - 1, 1, -alpha - 1, -alpha, false, 0);
                }
                if s > alpha {
                    s = -self.negamax(&next, side.opponent(), Some(mv), depth - 1, 1, -beta, -alpha, true, 0);
                }
                s
            };

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                self.record_cutoff(side, last_move, mv, depth, 0, &searched_quiets);
                break;
            }
            if !is_forcing_own(board, mv, side) {
                searched_quiets.push(mv);
            }
        }

        if let Some(mv) = best_move {
            let bound = if best_score >= beta {
                Bound::Lower
            } else {
                Bound::Exact
            };
            self.tt.store(board.hash(), Some(mv), to_tt_score(best_score), 0, depth as i8, bound, true);
        }

        (best_score, best_move)
    }

    #[allow(clippy::too_many_arguments)]
    fn negamax(
        &mut self,
        board: &Board,
        side: Player,
        last_move: Option<Pos>,
        depth: i32,
        ply: u32,
        alpha: i32,
        beta: i32,
        pv_node: bool,
        static_eval_two_ply_ago: i32,
    ) -> i32 {
        self.nodes += 1;
        if self.cancelled() {
            return 0;
        }
        if let Some(mover_move) = last_move {
            if board.win_at(mover_move, side.opponent()).winning_line.is_some() {
                return -(WIN_SCORE - ply as i32);
            }
        }
        if board.move_count() as usize == board.size() as usize * board.size() as usize {
            return 0;
        }
        if depth <= 0 {
            return self.quiescence(board, side, last_move, alpha, beta, ply, 0);
        }

        let mut alpha = alpha;
        let tt_entry = self.tt.probe(board.hash());
        if let Some(entry) = tt_entry {
            self.tt_hits += 1;
            if entry.depth as i32 >= depth {
                match entry.bound {
                    Bound::Exact => return entry.score as i32,
                    Bound::Lower if entry.score as i32 >= beta => return entry.score as i32,
                    Bound::Upper if (entry.score as i32) <= alpha => return entry.score as i32,
                    _ => {}
                }
            }
        }

        let current_eval = static_eval(board, side);
        let improving = current_eval > static_eval_two_ply_ago;
        let tt_move = tt_entry.and_then(|e| e.mv);

        let killers = self.tables.killer.get(ply as usize);
        let counter = last_move.and_then(|m| self.tables.counter.get(side.index(), m));
        let mut picker = MovePicker::new(board, side, self.tables, tt_move, killers, counter, last_move, depth);

        let mut best_score = -INFINITY;
        let mut best_move = None;
        let mut move_count = 0;
        let mut searched_quiets: Vec<Pos> = Vec::new();

        while let Some(mv) = picker.next() {
            move_count += 1;
            let next = match board.place(mv.x, mv.y, side, self.zobrist) {
                Ok(b) => b,
                Err(_) => continue,
            };

            let history_score = self.tables.butterfly.get(side.index(), last_move, mv);
            let is_tt_move = tt_move == Some(mv);

            let score = if move_count == 1 {
                -self.negamax(&next, side.opponent(), Some(mv), depth - 1, ply + 1, -beta, -alpha, pv_node, current_eval)
            } else {
                let r = self.reduction(depth, move_count, !pv_node, improving, is_tt_move, history_score);
                let reduced_depth = (depth - 1 - r).max(0);
                let mut s = -self.negamax(
                    &next,
                    side.opponent(),
                    Some(mv),
                    reduced_depth,
                    ply + 1,
                    -alpha - 1,
                    -alpha,
                    false,
                    current_eval,
                );
                if s > alpha && r > 0 {
                    s = -self.negamax(&next, side.opponent(), Some(mv), depth - 1, ply + 1, -alpha - 1, -alpha, false, current_eval);
                }
                if s > alpha && pv_node {
                    s = -self.negamax(&next, side.opponent(), Some(mv), depth - 1, ply + 1, -beta, -alpha, true, current_eval);
                }
                s
            };

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                self.record_cutoff(side, last_move, mv, depth, ply as usize, &searched_quiets);
                break;
            }
            if !is_forcing_own(board, mv, side) {
                searched_quiets.push(mv);
            }
        }

        if move_count == 0 {
            return 0;
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else if best_score > alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.tt.store(board.hash(), best_move, to_tt_score(best_score), to_tt_score(current_eval), depth as i8, bound, pv_node);

        best_score
    }

    fn quiescence(
        &mut self,
        board: &Board,
        side: Player,
        last_move: Option<Pos>,
        alpha: i32,
        beta: i32,
        ply: u32,
        qdepth: u32,
    ) -> i32 {
        self.nodes += 1;
        if self.cancelled() {
            return 0;
        }
        if let Some(mover_move) = last_move {
            if board.win_at(mover_move, side.opponent()).winning_line.is_some() {
                return -(WIN_SCORE - ply as i32);
            }
        }

        let stand_pat = static_eval(board, side);
        let mut alpha = alpha;
        if stand_pat >= beta {
            return stand_pat;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
        if qdepth >= MAX_QUIESCENCE_PLY {
            return stand_pat;
        }

        let forcing = forcing_moves(board, side);
        for mv in forcing {
            let next = match board.place(mv.x, mv.y, side, self.zobrist) {
                Ok(b) => b,
                Err(_) => continue,
            };
            let score = -self.quiescence(&next, side.opponent(), Some(mv), -beta, -alpha, ply + 1, qdepth + 1);
            if score >= beta {
                return score;
            }
            if score > alpha {
                alpha = score;
            }
        }
        alpha
    }

    /// `r = log2(depth)*log2(moveCount)/C`, adjusted for node context.
    fn reduction(&self, depth: i32, move_count: i32, non_pv_not_improving: bool, opp_tt_pv: bool, is_tt_move: bool, history_score: i32) -> i32 {
        if is_tt_move {
            return 0;
        }
        let base = (log2_approx(depth) * log2_approx(move_count) / 20) as i32;
        let mut r = base;
        if non_pv_not_improving {
            r += 1;
        }
        if opp_tt_pv {
            r += 1;
        }
        r -= history_score / HISTORY_PRUNE_DIVISOR;
        r.clamp(0, (depth - 1).max(0))
    }

    fn record_cutoff(&mut self, side: Player, last_move: Option<Pos>, cut_move: Pos, depth: i32, ply: usize, searched_quiets: &[Pos]) {
        let bonus = depth * depth + depth;
        self.tables.butterfly.update(side.index(), last_move, cut_move, bonus);
        if let Some(prev) = last_move {
            self.tables.counter.record(side.index(), prev, cut_move, bonus);
            self.tables.continuation.update(1, prev, cut_move, bonus);
        }
        self.tables.killer.store(ply, cut_move);
        for &quiet in searched_quiets {
            self.tables.butterfly.update(side.index(), last_move, quiet, -bonus);
            if let Some(prev) = last_move {
                self.tables.continuation.update(1, prev, quiet, -bonus);
            }
        }
    }
}

/// TT entries store `i16` scores; win/loss magnitudes saturate rather than
/// overflow, which only affects ordering of already-decisive lines.
fn to_tt_score(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn log2_approx(x: i32) -> f64 {
    (x.max(1) as f64).log2()
}

fn is_forcing_own(board: &Board, mv: Pos, side: Player) -> bool {
    crate::pattern::classify_cell(board, mv.x, mv.y, side).is_forcing()
}

/// Moves considered during quiescence: own or opponent category >= Block4.
fn forcing_moves(board: &Board, side: Player) -> Vec<Pos> {
    crate::pattern::candidate_cells(board)
        .into_iter()
        .filter(|&pos| {
            let own = crate::pattern::classify_cell(board, pos.x, pos.y, side);
            let opp = crate::pattern::classify_cell(board, pos.x, pos.y, side.opponent());
            own.is_forcing() || opp.is_forcing()
        })
        .collect()
}

/// Gate for the VCF pre-check: any own cell classifying at Block4 or above
/// means search urgency is high enough to try a forced win first.
fn has_urgent_own_threat(board: &Board, side: Player) -> bool {
    crate::pattern::candidate_cells(board)
        .into_iter()
        .any(|pos| crate::pattern::classify_cell(board, pos.x, pos.y, side) >= Pattern4::Block4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, DEFAULT_ZOBRIST_SEED, ZobristKeys};

    #[test]
    fn finds_immediate_winning_move() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = Board::empty(15)
            .place(3, 3, Player::Red, &z)
            .unwrap()
            .place(0, 0, Player::Blue, &z)
            .unwrap()
            .place(4, 3, Player::Red, &z)
            .unwrap()
            .place(0, 1, Player::Blue, &z)
            .unwrap()
            .place(5, 3, Player::Red, &z)
            .unwrap()
            .place(0, 2, Player::Blue, &z)
            .unwrap()
            .place(6, 3, Player::Red, &z)
            .unwrap()
            .place(0, 3, Player::Blue, &z)
            .unwrap();

        let tt = TranspositionTable::new(1024 * 1024, 15);
        let cancel = AtomicBool::new(false);
        let mut tables = OrderingTables::new(15);
        let mut ctx = SearchContext::new(&tt, &z, &mut tables, &cancel);
        let result = ctx.iterative_deepening(&b, Player::Red, Some(Pos::new(6, 3)), 4, 1, |_| {});
        assert!(result.best_move == Some(Pos::new(2, 3)) || result.best_move == Some(Pos::new(7, 3)));
        assert!(result.score >= WIN_SCORE - 4);
    }

    #[test]
    fn search_on_empty_board_returns_center() {
        let z = ZobristKeys::new(DEFAULT_ZOBRIST_SEED);
        let b = Board::empty(15);
        let tt = TranspositionTable::new(1024 * 1024, 15);
        let cancel = AtomicBool::new(false);
        let mut tables = OrderingTables::new(15);
        let mut ctx = SearchContext::new(&tt, &z, &mut tables, &cancel);
        let result = ctx.iterative_deepening(&b, Player::Red, None, 2, 1, |_| {});
        assert_eq!(result.best_move, Some(Pos::new(7, 7)));
    }
}
