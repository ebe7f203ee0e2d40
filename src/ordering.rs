//! Caro Engine - Move ordering tables
//!
//! All four tables are thread-local per the Lazy SMP design: each search worker owns one `OrderingTables` and never reads another
//! worker's. Bounded updates use the same `value += bonus - value*|bonus|/RANGE`
//! scheme so no table needs manual clamping.

use crate::types::{Pos, MAX_CELLS};

const RANGE: i32 = 30_000;
pub const MAX_PLY: usize = 128;

#[inline]
fn bounded_update(value: &mut i32, bonus: i32) {
    let decay = (*value as i64 * bonus.unsigned_abs() as i64 / RANGE as i64) as i32;
    *value += bonus - decay;
}

fn move_key(from: Option<Pos>, to: Pos, size: u8) -> usize {
    let from_idx = from.map_or(MAX_CELLS, |p| p.to_index(size));
    from_idx * (MAX_CELLS + 1) + to.to_index(size)
}

/// `[player][from][to] -> i16`, flattened into one table keyed
/// by `(from_or_none, to)` since Caro moves have no natural "piece identity"
/// the way chess from/to squares imply one.
pub struct ButterflyTable {
    size: u8,
    table: [Vec<i32>; 2],
}

impl ButterflyTable {
    pub fn new(size: u8) -> Self {
        let len = (MAX_CELLS + 1) * MAX_CELLS;
        ButterflyTable {
            size,
            table: [vec![0i32; len], vec![0i32; len]],
        }
    }

    pub fn get(&self, player_idx: usize, from: Option<Pos>, to: Pos) -> i32 {
        self.table[player_idx][move_key(from, to, self.size)]
    }

    pub fn update(&mut self, player_idx: usize, from: Option<Pos>, to: Pos, bonus: i32) {
        let key = move_key(from, to, self.size);
        bounded_update(&mut self.table[player_idx][key], bonus);
    }

    pub fn decay(&mut self) {
        for side in self.table.iter_mut() {
            for v in side.iter_mut() {
                *v /= 2;
            }
        }
    }
}

/// Two killer slots per ply.
pub struct KillerTable {
    slots: [[Option<Pos>; 2]; MAX_PLY],
}

impl Default for KillerTable {
    fn default() -> Self {
        KillerTable { slots: [[None; 2]; MAX_PLY] }
    }
}

impl KillerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, ply: usize, mv: Pos) {
        if ply >= MAX_PLY {
            return;
        }
        if self.slots[ply][0] != Some(mv) {
            self.slots[ply][1] = self.slots[ply][0];
            self.slots[ply][0] = Some(mv);
        }
    }

    pub fn get(&self, ply: usize) -> [Option<Pos>; 2] {
        if ply >= MAX_PLY {
            [None, None]
        } else {
            self.slots[ply]
        }
    }

    pub fn clear(&mut self) {
        self.slots = [[None; 2]; MAX_PLY];
    }
}

/// `[player][opp_move][our_move] -> i16`.
pub struct CounterMoveTable {
    size: u8,
    table: [Vec<Option<Pos>>; 2],
    history: [Vec<i32>; 2],
}

impl CounterMoveTable {
    pub fn new(size: u8) -> Self {
        let cells = size as usize * size as usize;
        CounterMoveTable {
            size,
            table: [vec![None; cells], vec![None; cells]],
            history: [vec![0i32; cells * cells], vec![0i32; cells * cells]],
        }
    }

    pub fn record(&mut self, player_idx: usize, opp_move: Pos, our_move: Pos, bonus: i32) {
        let opp_idx = opp_move.to_index(self.size);
        self.table[player_idx][opp_idx] = Some(our_move);
        let cells = self.size as usize * self.size as usize;
        let key = opp_idx * cells + our_move.to_index(self.size);
        bounded_update(&mut self.history[player_idx][key], bonus);
    }

    pub fn get(&self, player_idx: usize, opp_move: Pos) -> Option<Pos> {
        self.table[player_idx][opp_move.to_index(self.size)]
    }

    pub fn history_score(&self, player_idx: usize, opp_move: Pos, our_move: Pos) -> i32 {
        let cells = self.size as usize * self.size as usize;
        let key = opp_move.to_index(self.size) * cells + our_move.to_index(self.size);
        self.history[player_idx][key]
    }

    pub fn clear(&mut self) {
        for t in self.table.iter_mut() {
            t.iter_mut().for_each(|v| *v = None);
        }
    }
}

/// `[player][prev_move][curr_move] -> i16`, maintained up to 6 plies back
///. Indexed here by just the immediately preceding move per
/// ply depth requested by the caller (the search core threads the previous
/// N moves through explicitly rather than this table owning ply history).
pub struct ContinuationTable {
    size: u8,
    /// One table per lookback distance (1..=6 plies).
    tables: [Vec<i32>; 6],
}

impl ContinuationTable {
    pub fn new(size: u8) -> Self {
        let cells = size as usize * size as usize;
        ContinuationTable {
            size,
            tables: std::array::from_fn(|_| vec![0i32; cells * cells]),
        }
    }

    fn key(&self, prev: Pos, curr: Pos) -> usize {
        let cells = self.size as usize * self.size as usize;
        prev.to_index(self.size) * cells + curr.to_index(self.size)
    }

    pub fn update(&mut self, lookback: usize, prev: Pos, curr: Pos, bonus: i32) {
        if lookback == 0 || lookback > 6 {
            return;
        }
        let key = self.key(prev, curr);
        bounded_update(&mut self.tables[lookback - 1][key], bonus);
    }

    pub fn score(&self, lookback: usize, prev: Pos, curr: Pos) -> i32 {
        if lookback == 0 || lookback > 6 {
            return 0;
        }
        self.tables[lookback - 1][self.key(prev, curr)]
    }

    pub fn clear(&mut self) {
        for t in self.tables.iter_mut() {
            t.iter_mut().for_each(|v| *v = 0);
        }
    }
}

/// Bundle of per-thread ordering state.
pub struct OrderingTables {
    pub butterfly: ButterflyTable,
    pub killer: KillerTable,
    pub counter: CounterMoveTable,
    pub continuation: ContinuationTable,
}

impl OrderingTables {
    pub fn new(size: u8) -> Self {
        OrderingTables {
            butterfly: ButterflyTable::new(size),
            killer: KillerTable::new(),
            counter: CounterMoveTable::new(size),
            continuation: ContinuationTable::new(size),
        }
    }

    /// Used by `clear_search_state()`: halves accumulated history/continuation
    /// scores and drops killers, but keeps some warm state across closely
    /// related positions rather than zeroing outright.
    pub fn decay(&mut self) {
        self.butterfly.decay();
        self.killer.clear();
        for v in self.continuation.tables.iter_mut() {
            v.iter_mut().for_each(|x| *x /= 2);
        }
    }

    pub fn clear_all(&mut self) {
        self.butterfly = ButterflyTable::new(self.butterfly.size);
        self.killer.clear();
        self.counter.clear();
        self.continuation.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_update_stays_within_range() {
        let mut v = 0i32;
        for _ in 0..10_000 {
            bounded_update(&mut v, 2_000);
        }
        assert!(v.abs() <= RANGE);
    }

    #[test]
    fn killer_table_keeps_two_most_recent_distinct() {
        let mut kt = KillerTable::new();
        kt.store(3, Pos::new(1, 1));
        kt.store(3, Pos::new(2, 2));
        assert_eq!(kt.get(3), [Some(Pos::new(2, 2)), Some(Pos::new(1, 1))]);
        kt.store(3, Pos::new(2, 2));
        assert_eq!(kt.get(3)[0], Some(Pos::new(2, 2)));
    }

    #[test]
    fn counter_move_records_and_retrieves() {
        let mut ct = CounterMoveTable::new(15);
        ct.record(0, Pos::new(7, 7), Pos::new(8, 7), 100);
        assert_eq!(ct.get(0, Pos::new(7, 7)), Some(Pos::new(8, 7)));
        assert!(ct.history_score(0, Pos::new(7, 7), Pos::new(8, 7)) > 0);
    }
}
