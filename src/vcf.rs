//! Caro Engine - VCF (Victory by Continuous Four) tactical solver
//!
//! Run as a forcing pre-check before the main root search when the side to
//! move's threat urgency is high. Alternates an attacker, who only ever plays
//! moves that create a four-threat, against a defender who must neutralize
//! every such threat in one move or concede. Results are cached in the shared
//! transposition table at `depth = MAX` with an exact bound, so a solved
//! forced win is never recomputed from a transposing position.

use crate::board::{Board, ZobristKeys};
use crate::pattern::{candidate_cells, classify_cell};
use crate::tt::{Bound, TranspositionTable};
use crate::types::{Pattern4, Player, Pos};

pub const DEFAULT_VCF_DEPTH: u32 = 20;
const VCF_TT_DEPTH: i8 = 63;

#[derive(Clone, Debug, Default)]
pub struct VcfResult {
    pub winning: bool,
    pub sequence: Vec<Pos>,
    pub nodes: u64,
}

/// Moves the attacker is allowed to play: anything that creates a four the
/// defender cannot both block and survive.
fn is_attacker_move(p: Pattern4) -> bool {
    matches!(p, Pattern4::Flex4 | Pattern4::Block4 | Pattern4::Flex4Flex3 | Pattern4::Five)
}

pub struct VcfSolver<'a> {
    tt: &'a TranspositionTable,
    zobrist: &'a ZobristKeys,
    max_depth: u32,
    nodes: u64,
    cancel: &'a std::sync::atomic::AtomicBool,
}

impl<'a> VcfSolver<'a> {
    pub fn new(
        tt: &'a TranspositionTable,
        zobrist: &'a ZobristKeys,
        max_depth: u32,
        cancel: &'a std::sync::atomic::AtomicBool,
    ) -> Self {
        VcfSolver { tt, zobrist, max_depth, nodes: 0, cancel }
    }

    pub fn solve(&mut self, board: &Board, attacker: Player) -> VcfResult {
        let mut sequence = Vec::new();
        let winning = self.attacker_search(board, attacker, 0, &mut sequence);
        VcfResult { winning, sequence, nodes: self.nodes }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn attacker_search(&mut self, board: &Board, attacker: Player, depth: u32, seq: &mut Vec<Pos>) -> bool {
        self.nodes += 1;
        if self.cancelled() || depth >= self.max_depth {
            return false;
        }
        if let Some(entry) = self.tt.probe(board.hash()) {
            if entry.depth == VCF_TT_DEPTH && entry.bound == Bound::Exact {
                return entry.score > 0;
            }
        }

        let candidates = candidate_cells(board);
        for pos in candidates {
            let own = classify_cell(board, pos.x, pos.y, attacker);
            if !is_attacker_move(own) {
                continue;
            }
            let next = match board.place(pos.x, pos.y, attacker, self.zobrist) {
                Ok(b) => b,
                Err(_) => continue,
            };
            if own == Pattern4::Five {
                seq.push(pos);
                self.cache_result(board.hash(), true);
                return true;
            }
            seq.push(pos);
            if self.defender_search(&next, attacker, depth + 1, seq) {
                self.cache_result(board.hash(), true);
                return true;
            }
            seq.pop();
        }
        self.cache_result(board.hash(), false);
        false
    }

    /// Computes the defender's forced blocks: cells that break every one of
    /// the attacker's outstanding four-threats. Empty -> attacker already
    /// won; singleton -> forced reply; otherwise unwinnable.
    fn defender_search(&mut self, board: &Board, attacker: Player, depth: u32, seq: &mut Vec<Pos>) -> bool {
        self.nodes += 1;
        if self.cancelled() || depth >= self.max_depth {
            return false;
        }
        let defender = attacker.opponent();
        let candidates = candidate_cells(board);

        let forced_blocks: Vec<Pos> = candidates
            .iter()
            .copied()
            .filter(|&pos| classify_cell(board, pos.x, pos.y, defender).is_must_block())
            .collect();

        if forced_blocks.is_empty() {
            // No block exists anywhere: verify the attacker genuinely has an
            // unstoppable four before declaring victory (an empty block set
            // with no attacker threat at all is simply a quiet position).
            let attacker_has_threat = candidates
                .iter()
                .any(|&pos| is_attacker_move(classify_cell(board, pos.x, pos.y, attacker)));
            return attacker_has_threat;
        }
        if forced_blocks.len() > 1 {
            return false;
        }

        let block = forced_blocks[0];
        let next = match board.place(block.x, block.y, defender, self.zobrist) {
            Ok(b) => b,
            Err(_) => return false,
        };
        seq.push(block);
        let result = self.attacker_search(&next, attacker, depth + 1, seq);
        if !result {
            seq.pop();
        }
        result
    }

    fn cache_result(&self, hash: u64, winning: bool) {
        self.tt.store(
            hash,
            None,
            if winning { 1 } else { -1 },
            0,
            VCF_TT_DEPTH,
            Bound::Exact,
            false,
        );
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, DEFAULT_ZOBRIST_SEED, ZobristKeys};

    fn z() -> ZobristKeys {
        ZobristKeys::new(DEFAULT_ZOBRIST_SEED)
    }

    #[test]
    fn solver_finds_immediate_five_completion() {
        let z = z();
        // Red has an open four; placing the fifth stone wins outright.
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
        let cancel = std::sync::atomic::AtomicBool::new(false);
        let mut solver = VcfSolver::new(&tt, &z, DEFAULT_VCF_DEPTH, &cancel);
        let result = solver.solve(&b, Player::Red);
        assert!(result.winning);
        assert!(!result.sequence.is_empty());
    }

    #[test]
    fn solver_reports_no_win_on_quiet_position() {
        let z = z();
        let b = Board::empty(15).place(7, 7, Player::Red, &z).unwrap();
        let tt = TranspositionTable::new(1024 * 1024, 15);
        let cancel = std::sync::atomic::AtomicBool::new(false);
        let mut solver = VcfSolver::new(&tt, &z, DEFAULT_VCF_DEPTH, &cancel);
        let result = solver.solve(&b, Player::Red);
        assert!(!result.winning);
    }
}
