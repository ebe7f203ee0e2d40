//! Caro Engine - Candidate generation and staged move ordering
//!
//! Candidates are restricted to empty cells within Chebyshev radius 2 of an
//! existing stone (or the center cell on an empty board), reusing
//! `pattern::candidate_cells` exactly as the static evaluator does, so move
//! generation and evaluation never disagree about "interesting" cells. The
//! picker hands moves out in stages, lazily, bucketing must-blocks, winning
//! moves, threat-creators, killers/counters, then quiets ahead of a full
//! sort of only the quiet tail.

use crate::bitboard::BitBoard;
use crate::board::Board;
use crate::ordering::OrderingTables;
use crate::pattern::{self, candidate_cells};
use crate::types::{Pattern4, Player, Pos};

/// Per-candidate cached classification, computed once per `MovePicker`.
#[derive(Clone, Copy)]
struct Candidate {
    pos: Pos,
    own: Pattern4,
    opp: Pattern4,
    quiet_score: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Stage {
    TTMove,
    MustBlock,
    Winning,
    ThreatCreate,
    KillerCounter,
    GoodQuiet,
    BadQuiet,
    Done,
}

/// Threshold controlling how much of the quiet-move tail gets a full
/// insertion sort; below it, moves are returned in candidate-scan order.
const SORT_THRESHOLD_PER_PLY: i32 = -3560;

/// Returns `false` for the 5x5 exclusion zone around Red's first stone,
/// enforced only when placing the third stone of the game.
pub fn open_rule_forbids(board: &Board, player: Player, pos: Pos) -> bool {
    if player != Player::Red || board.move_count() != 2 {
        return false;
    }
    let red = board.bit_board(Player::Red);
    let size = board.size();
    for idx in red.iter_set(size as usize * size as usize) {
        let first = Pos::from_index(idx, size);
        if first.chebyshev_dist(pos) <= 2 {
            return true;
        }
    }
    false
}

/// Lazily staged move picker for one search node. Owns its own small
/// classification cache; construct once per node.
pub struct MovePicker {
    candidates: Vec<Candidate>,
    yielded: BitBoard,
    size: u8,
    stage: Stage,
    tt_move: Option<Pos>,
    killers: [Option<Pos>; 2],
    counter: Option<Pos>,
    depth: i32,
    cursor: usize,
    sorted_quiet: Option<Vec<Pos>>,
}

impl MovePicker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: &Board,
        side: Player,
        tables: &OrderingTables,
        tt_move: Option<Pos>,
        killers: [Option<Pos>; 2],
        counter: Option<Pos>,
        prev_move: Option<Pos>,
        depth: i32,
    ) -> Self {
        let player_idx = side.index();
        let size = board.size();
        let raw = candidate_cells(board);

        let candidates: Vec<Candidate> = raw
            .into_iter()
            .filter(|&pos| !open_rule_forbids(board, side, pos))
            .map(|pos| {
                let own = pattern::classify_cell(board, pos.x, pos.y, side);
                let opp = pattern::classify_cell(board, pos.x, pos.y, side.opponent());
                let butterfly = tables.butterfly.get(player_idx, prev_move, pos);
                let continuation = prev_move.map_or(0, |p| tables.continuation.score(1, p, pos));
                Candidate { pos, own, opp, quiet_score: butterfly + continuation }
            })
            .collect();

        MovePicker {
            candidates,
            yielded: BitBoard::empty(),
            size,
            stage: Stage::TTMove,
            tt_move,
            killers,
            counter,
            depth,
            cursor: 0,
            sorted_quiet: None,
        }
    }

    fn mark_yielded(&mut self, pos: Pos) {
        self.yielded.set(pos.to_index(self.size));
    }

    fn already_yielded(&self, pos: Pos) -> bool {
        self.yielded.get(pos.to_index(self.size))
    }

    fn find(&self, pred: impl Fn(&Candidate) -> bool) -> Option<Pos> {
        self.candidates
            .iter()
            .find(|c| !self.already_yielded(c.pos) && pred(c))
            .map(|c| c.pos)
    }

    /// Best-scoring match among candidates satisfying `pred`, used for
    /// MustBlock/Winning so the most urgent threat is tried first when
    /// several qualify.
    fn best(&self, pred: impl Fn(&Candidate) -> bool) -> Option<Pos> {
        self.candidates
            .iter()
            .filter(|c| !self.already_yielded(c.pos) && pred(c))
            .max_by_key(|c| c.quiet_score)
            .map(|c| c.pos)
    }

    fn build_sorted_quiet(&mut self) {
        let threshold = SORT_THRESHOLD_PER_PLY * self.depth.max(1);
        let mut above: Vec<Candidate> = self
            .candidates
            .iter()
            .copied()
            .filter(|c| !self.already_yielded(c.pos) && c.quiet_score >= threshold)
            .collect();
        above.sort_by(|a, b| b.quiet_score.cmp(&a.quiet_score));

        let below: Vec<Pos> = self
            .candidates
            .iter()
            .filter(|c| !self.already_yielded(c.pos) && c.quiet_score < threshold)
            .map(|c| c.pos)
            .collect();

        let mut out: Vec<Pos> = above.into_iter().map(|c| c.pos).collect();
        out.extend(below);
        self.sorted_quiet = Some(out);
    }

    /// Returns the next move in staged order, or `None` once exhausted.
    pub fn next(&mut self) -> Option<Pos> {
        loop {
            match self.stage {
                Stage::TTMove => {
                    self.stage = Stage::MustBlock;
                    if let Some(mv) = self.tt_move {
                        if self.candidates.iter().any(|c| c.pos == mv) && !self.already_yielded(mv) {
                            self.mark_yielded(mv);
                            return Some(mv);
                        }
                    }
                }
                Stage::MustBlock => {
                    if let Some(mv) = self.best(|c| c.opp.is_must_block()) {
                        self.mark_yielded(mv);
                        return Some(mv);
                    }
                    self.stage = Stage::Winning;
                }
                Stage::Winning => {
                    if let Some(mv) = self.best(|c| c.own.is_winning()) {
                        self.mark_yielded(mv);
                        return Some(mv);
                    }
                    self.stage = Stage::ThreatCreate;
                }
                Stage::ThreatCreate => {
                    if let Some(mv) = self.best(|c| c.own.is_threat_creator()) {
                        self.mark_yielded(mv);
                        return Some(mv);
                    }
                    self.stage = Stage::KillerCounter;
                }
                Stage::KillerCounter => {
                    for mv in [self.killers[0], self.killers[1], self.counter].into_iter().flatten() {
                        if self.find(|c| c.pos == mv).is_some() {
                            self.mark_yielded(mv);
                            return Some(mv);
                        }
                    }
                    self.stage = Stage::GoodQuiet;
                }
                Stage::GoodQuiet | Stage::BadQuiet => {
                    if self.sorted_quiet.is_none() {
                        self.build_sorted_quiet();
                        self.cursor = 0;
                    }
                    let list = self.sorted_quiet.as_ref().unwrap();
                    if self.cursor >= list.len() {
                        self.stage = Stage::Done;
                        continue;
                    }
                    let mv = list[self.cursor];
                    self.cursor += 1;
                    if self.already_yielded(mv) {
                        continue;
                    }
                    self.mark_yielded(mv);
                    return Some(mv);
                }
                Stage::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, ZobristKeys, DEFAULT_ZOBRIST_SEED};

    fn z() -> ZobristKeys {
        ZobristKeys::new(DEFAULT_ZOBRIST_SEED)
    }

    #[test]
    fn open_rule_blocks_second_red_move_near_first() {
        let z = z();
        let b = Board::empty(15)
            .place(7, 7, Player::Red, &z)
            .unwrap()
            .place(0, 0, Player::Blue, &z)
            .unwrap();
        assert!(open_rule_forbids(&b, Player::Red, Pos::new(8, 8)));
        assert!(!open_rule_forbids(&b, Player::Red, Pos::new(14, 14)));
    }

    #[test]
    fn open_rule_does_not_apply_after_move_three() {
        let z = z();
        let b = Board::empty(15)
            .place(7, 7, Player::Red, &z)
            .unwrap()
            .place(0, 0, Player::Blue, &z)
            .unwrap()
            .place(14, 14, Player::Red, &z)
            .unwrap()
            .place(1, 1, Player::Blue, &z)
            .unwrap();
        assert!(!open_rule_forbids(&b, Player::Red, Pos::new(8, 8)));
    }

    #[test]
    fn must_block_move_is_returned_before_quiet_moves() {
        let z = z();
        // Blue has an open three; Red to move must block or it becomes Flex4.
        let b = Board::empty(15)
            .place(5, 5, Player::Red, &z)
            .unwrap()
            .place(3, 7, Player::Blue, &z)
            .unwrap()
            .place(12, 12, Player::Red, &z)
            .unwrap()
            .place(4, 7, Player::Blue, &z)
            .unwrap()
            .place(11, 12, Player::Red, &z)
            .unwrap()
            .place(5, 7, Player::Blue, &z)
            .unwrap();
        let tables = OrderingTables::new(15);
        let mut picker = MovePicker::new(&b, Player::Red, &tables, None, [None, None], None, None, 4);
        let first = picker.next().unwrap();
        // The first move yielded must be one of the two extension cells of
        // Blue's open three (the only Flex3 block points).
        assert!(first == Pos::new(2, 7) || first == Pos::new(6, 7));
    }

    #[test]
    fn picker_never_yields_same_move_twice() {
        let z = z();
        let b = Board::empty(15).place(7, 7, Player::Red, &z).unwrap();
        let tables = OrderingTables::new(15);
        let mut picker = MovePicker::new(&b, Player::Blue, &tables, None, [None, None], None, None, 1);
        let mut seen = std::collections::HashSet::new();
        while let Some(mv) = picker.next() {
            assert!(seen.insert(mv), "duplicate move yielded: {:?}", mv);
        }
    }
}
