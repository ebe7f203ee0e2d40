//! Caro Engine - Pondering state machine
//!
//! After returning a move, the engine predicts the opponent's reply from
//! its own root PV, applies it to a board copy, and launches a bounded
//! search on the resulting position while the opponent thinks. A quiet
//! position (no Flex3-or-above threat on either side, still in the opening
//! phase) skips pondering outright rather than spending a thread on a line
//! unlikely to be played.

use crate::board::Board;
use crate::search::NodeCounters;
use crate::time_manager::GamePhase;
use crate::types::{Pattern4, Player, Pos};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PonderState {
    Idle,
    Pondering,
    PonderHit,
    PonderMiss,
    Cancelled,
}

#[derive(Clone, Debug, Default)]
pub struct PonderStats {
    pub state_reached: Option<PonderState>,
    pub search_stats: NodeCounters,
}

/// `true` when pondering should be skipped: still in the opening phase and
/// neither side has a Flex3-or-stronger threat anywhere on the board.
pub fn is_too_quiet_to_ponder(board: &Board) -> bool {
    if GamePhase::for_move_count(board.move_count()) != GamePhase::Opening {
        return false;
    }
    let candidates = crate::pattern::candidate_cells(board);
    !candidates.iter().any(|&pos| {
        crate::pattern::classify_cell(board, pos.x, pos.y, Player::Red) >= Pattern4::Flex3
            || crate::pattern::classify_cell(board, pos.x, pos.y, Player::Blue) >= Pattern4::Flex3
    })
}

/// Tracks one side's ponder lifecycle across the gap between "engine
/// returned a move" and "opponent's actual move is known".
pub struct PonderSession {
    state: PonderState,
    predicted_reply: Option<Pos>,
    board_after_predicted: Option<Board>,
    accumulated_stats: NodeCounters,
}

impl Default for PonderSession {
    fn default() -> Self {
        PonderSession {
            state: PonderState::Idle,
            predicted_reply: None,
            board_after_predicted: None,
            accumulated_stats: NodeCounters::default(),
        }
    }
}

impl PonderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PonderState {
        self.state
    }

    /// Begins pondering on `predicted_reply`, the second move of the prior
    /// search's PV (the opponent's predicted move).
    pub fn start(&mut self, predicted_reply: Pos, board_after_predicted: Board) {
        self.state = PonderState::Pondering;
        self.predicted_reply = Some(predicted_reply);
        self.board_after_predicted = Some(board_after_predicted);
        self.accumulated_stats = NodeCounters::default();
    }

    /// Feeds stats from the ongoing ponder search into the session total.
    pub fn merge_stats(&mut self, stats: &NodeCounters) {
        self.accumulated_stats.nodes += stats.nodes;
        self.accumulated_stats.tt_hits += stats.tt_hits;
        self.accumulated_stats.vcf_nodes += stats.vcf_nodes;
        self.accumulated_stats.depth_reached = self.accumulated_stats.depth_reached.max(stats.depth_reached);
    }

    /// Called with the opponent's actual move. Returns the board to resume
    /// searching from on a hit, or `None` on a miss (caller must start a
    /// fresh search from scratch).
    pub fn on_opponent_move(&mut self, actual_move: Pos) -> Option<Board> {
        if self.predicted_reply == Some(actual_move) {
            self.state = PonderState::PonderHit;
            self.board_after_predicted.take()
        } else {
            self.state = PonderState::PonderMiss;
            self.board_after_predicted = None;
            self.predicted_reply = None;
            None
        }
    }

    /// Caller-requested stop (new game, shutdown, or explicit `stop_pondering`).
    pub fn cancel(&mut self) -> PonderStats {
        self.state = PonderState::Cancelled;
        let stats = PonderStats { state_reached: Some(PonderState::Cancelled), search_stats: self.accumulated_stats.clone() };
        self.predicted_reply = None;
        self.board_after_predicted = None;
        stats
    }

    pub fn finish(&mut self) -> PonderStats {
        let stats = PonderStats { state_reached: Some(self.state), search_stats: self.accumulated_stats.clone() };
        self.state = PonderState::Idle;
        stats
    }
}
