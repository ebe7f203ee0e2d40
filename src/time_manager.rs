//! Caro Engine - Per-move time budget allocation

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePhase {
    Opening,
    EarlyMid,
    LateMid,
    Endgame,
}

impl GamePhase {
    pub fn for_move_count(move_count: u16) -> GamePhase {
        match move_count {
            0..=10 => GamePhase::Opening,
            11..=25 => GamePhase::EarlyMid,
            26..=45 => GamePhase::LateMid,
            _ => GamePhase::Endgame,
        }
    }

    fn multiplier(self) -> f64 {
        match self {
            GamePhase::Opening => 0.5,
            GamePhase::EarlyMid => 0.8,
            GamePhase::LateMid => 1.2,
            GamePhase::Endgame => 1.0,
        }
    }
}

/// Root-position urgency, feeding the `urgency_mult` term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    /// A must-block or own winning move exists at the root.
    High,
    /// The picker's first stage is forced: exactly one legal must-block.
    Forced,
    Normal,
}

impl Urgency {
    fn multiplier(self) -> f64 {
        match self {
            Urgency::High => 1.5,
            Urgency::Forced => 0.3,
            Urgency::Normal => 1.0,
        }
    }
}

const RESERVE_MS: u64 = 100;
const EMERGENCY_THRESHOLD_MS: u64 = 500;
const EMERGENCY_MIN_MS: u64 = 10;

/// `alloc = min(T_rem * 0.5, base * phase_mult * urgency_mult)`,
/// `base = T_rem / max(m, 20) + inc`.
pub fn allocate_budget_ms(
    time_remaining_ms: u64,
    increment_ms: u64,
    estimated_moves_to_go: u32,
    move_count: u16,
    urgency: Urgency,
) -> u64 {
    if time_remaining_ms < EMERGENCY_THRESHOLD_MS {
        let reserve = RESERVE_MS.min(time_remaining_ms);
        return EMERGENCY_MIN_MS.max(time_remaining_ms.saturating_sub(reserve)).max(EMERGENCY_MIN_MS);
    }

    let t_rem = time_remaining_ms as f64;
    let m = (estimated_moves_to_go as f64).max(20.0);
    let base = t_rem / m + increment_ms as f64;

    let phase = GamePhase::for_move_count(move_count);
    let budget = base * phase.multiplier() * urgency.multiplier();
    let capped = budget.min(t_rem * 0.5);

    let with_reserve = capped.max(RESERVE_MS as f64);
    with_reserve.min(t_rem.max(EMERGENCY_MIN_MS as f64)) as u64
}
