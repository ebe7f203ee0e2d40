//! Caro Engine - Sharded, lock-free Transposition Table
//!
//! Each entry stores its packed payload in one `AtomicU64` and a second
//! `AtomicU64` "checksum" word equal to `key16 XOR payload` at write time.
//! A reader re-derives `key16` as `checksum XOR payload` from its own two
//! independent atomic loads: if a concurrent writer tore the two loads apart
//! the XOR will not reproduce the original key and the probe is treated as a
//! miss. Each slot is plain atomics behind a `#[repr(C)]` struct, no mutex;
//! this is the standard lockless-hashing technique for concurrent
//! transposition tables.

use crate::types::Pos;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

impl Bound {
    fn to_bits(self) -> u64 {
        match self {
            Bound::Exact => 0,
            Bound::Lower => 1,
            Bound::Upper => 2,
        }
    }
    fn from_bits(bits: u64) -> Bound {
        match bits & 0b11 {
            1 => Bound::Lower,
            2 => Bound::Upper,
            _ => Bound::Exact,
        }
    }
}

const NO_MOVE: u64 = 0x1FF; // 9-bit sentinel (max 361 cells fits in 0..360)

/// Decoded view of a stored entry, handed back from `probe`/`store`.
#[derive(Clone, Copy, Debug)]
pub struct TTEntry {
    pub mv: Option<Pos>,
    pub score: i16,
    pub static_eval: i16,
    pub depth: i8,
    pub bound: Bound,
    pub age: u8,
    pub pv: bool,
}

fn pack(board_size: u8, mv: Option<Pos>, score: i16, static_eval: i16, depth: i8, bound: Bound, age: u8, pv: bool) -> u64 {
    let move_bits = mv.map_or(NO_MOVE, |p| p.to_index(board_size) as u64);
    let mut data = move_bits & 0x1FF;
    data |= (score as u16 as u64) << 9;
    data |= (static_eval as u16 as u64) << 25;
    data |= ((depth.max(0) as u64) & 0x3F) << 41;
    data |= bound.to_bits() << 47;
    data |= ((age as u64) & 0x3F) << 49;
    data |= ((pv as u64) & 1) << 55;
    data
}

fn unpack(board_size: u8, data: u64) -> TTEntry {
    let move_bits = data & 0x1FF;
    let mv = if move_bits == NO_MOVE {
        None
    } else {
        Some(Pos::from_index(move_bits as usize, board_size))
    };
    let score = ((data >> 9) & 0xFFFF) as u16 as i16;
    let static_eval = ((data >> 25) & 0xFFFF) as u16 as i16;
    let depth = ((data >> 41) & 0x3F) as i8;
    let bound = Bound::from_bits((data >> 47) & 0b11);
    let age = ((data >> 49) & 0x3F) as u8;
    let pv = ((data >> 55) & 1) != 0;
    TTEntry { mv, score, static_eval, depth, bound, age, pv }
}

#[repr(C)]
struct AtomicSlot {
    data: AtomicU64,
    checksum: AtomicU64,
}

impl AtomicSlot {
    const fn empty() -> Self {
        AtomicSlot { data: AtomicU64::new(0), checksum: AtomicU64::new(0) }
    }
}

/// A group of 3 entries sharing a cluster index. Aligned
/// to a 32-byte boundary; the 3x16-byte payload rounds up to 64 bytes of
/// backing storage, landing the cluster on its own cache line.
#[repr(C, align(32))]
struct Cluster {
    slots: [AtomicSlot; 3],
}

impl Cluster {
    const fn empty() -> Self {
        Cluster { slots: [AtomicSlot::empty(), AtomicSlot::empty(), AtomicSlot::empty()] }
    }
}

struct Shard {
    clusters: Box<[Cluster]>,
}

/// Shard count; a power of two so the shard index is a plain mask, not a
/// modulo, on the hot path.
const SHARD_COUNT: usize = 16;
const DEFAULT_TT_BYTES: usize = 128 * 1024 * 1024;

pub struct TranspositionTable {
    shards: Vec<Shard>,
    clusters_per_shard: usize,
    board_size: u8,
    generation: AtomicU8,
}

impl TranspositionTable {
    pub fn new(size_bytes: usize, board_size: u8) -> Self {
        let size_bytes = size_bytes.max(SHARD_COUNT * std::mem::size_of::<Cluster>());
        let total_clusters = (size_bytes / std::mem::size_of::<Cluster>()).max(SHARD_COUNT);
        let clusters_per_shard = (total_clusters / SHARD_COUNT).max(1);

        let shards = (0..SHARD_COUNT)
            .map(|_| Shard {
                clusters: (0..clusters_per_shard).map(|_| Cluster::empty()).collect(),
            })
            .collect();

        TranspositionTable {
            shards,
            clusters_per_shard,
            board_size,
            generation: AtomicU8::new(0),
        }
    }

    pub fn default_size() -> usize {
        DEFAULT_TT_BYTES
    }

    /// Bumps the global 6-bit generation counter. Called at the start of
    /// every top-level `search`.
    pub fn new_generation(&self) {
        let g = self.generation.load(Ordering::Relaxed);
        self.generation.store((g + 1) & 0x3F, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    fn locate(&self, hash: u64) -> (usize, usize) {
        let shard = ((hash >> 16) as usize) & (SHARD_COUNT - 1);
        let bucket_seed = hash >> 32;
        let cluster = ((bucket_seed as u128 * self.clusters_per_shard as u128) >> 64) as usize;
        (shard, cluster.min(self.clusters_per_shard - 1))
    }

    /// Linear scan of 3 entries; hit iff the recovered key16 matches and the
    /// read wasn't torn.
    pub fn probe(&self, hash: u64) -> Option<TTEntry> {
        let (shard, cluster_idx) = self.locate(hash);
        let cluster = &self.shards[shard].clusters[cluster_idx];
        let want_key16 = hash as u16;

        for slot in cluster.slots.iter() {
            let data = slot.data.load(Ordering::Acquire);
            let checksum = slot.checksum.load(Ordering::Acquire);
            if data == 0 && checksum == 0 {
                continue;
            }
            let recovered_key16 = (checksum ^ data) as u16;
            if recovered_key16 == want_key16 {
                return Some(unpack(self.board_size, data));
            }
        }
        None
    }

    /// Finds an existing key16 match or the minimal `depth - 8*relative_age`
    /// victim and overwrites it with release-ordered stores.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        hash: u64,
        mv: Option<Pos>,
        score: i16,
        static_eval: i16,
        depth: i8,
        bound: Bound,
        pv: bool,
    ) {
        let (shard, cluster_idx) = self.locate(hash);
        let cluster = &self.shards[shard].clusters[cluster_idx];
        let want_key16 = hash as u16;
        let generation = self.generation.load(Ordering::Relaxed);

        let mut victim = 0usize;
        let mut victim_score = i32::MAX;
        let mut found_match = false;

        for (i, slot) in cluster.slots.iter().enumerate() {
            let data = slot.data.load(Ordering::Acquire);
            let checksum = slot.checksum.load(Ordering::Acquire);
            let is_empty = data == 0 && checksum == 0;
            let recovered_key16 = (checksum ^ data) as u16;

            if !is_empty && recovered_key16 == want_key16 {
                victim = i;
                found_match = true;
                break;
            }
            let entry_depth = if is_empty { -64 } else { ((data >> 41) & 0x3F) as i32 };
            let entry_age = if is_empty { 0 } else { ((data >> 49) & 0x3F) as i32 };
            let relative_age = (generation as i32 - entry_age).rem_euclid(64);
            let replacement_score = entry_depth - 8 * relative_age;
            if replacement_score < victim_score {
                victim_score = replacement_score;
                victim = i;
            }
        }
        let _ = found_match;

        let data = pack(self.board_size, mv, score, static_eval, depth, bound, generation, pv);
        let checksum = (want_key16 as u64) ^ data;

        let slot = &cluster.slots[victim];
        slot.data.store(data, Ordering::Release);
        slot.checksum.store(checksum, Ordering::Release);
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            for cluster in shard.clusters.iter() {
                for slot in cluster.slots.iter() {
                    slot.data.store(0, Ordering::Relaxed);
                    slot.checksum.store(0, Ordering::Relaxed);
                }
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Approximate permille usage (sampled, for stats reporting).
    pub fn hashfull_permille(&self) -> u32 {
        let sample_clusters = 1000.min(self.shards[0].clusters.len());
        if sample_clusters == 0 {
            return 0;
        }
        let mut used = 0u32;
        let mut total = 0u32;
        for cluster in self.shards[0].clusters.iter().take(sample_clusters) {
            for slot in cluster.slots.iter() {
                total += 1;
                let data = slot.data.load(Ordering::Relaxed);
                let checksum = slot.checksum.load(Ordering::Relaxed);
                if data != 0 || checksum != 0 {
                    used += 1;
                }
            }
        }
        if total == 0 {
            0
        } else {
            (used * 1000) / total
        }
    }
}
