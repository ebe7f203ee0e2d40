//! Caro Engine - core search library for a Caro (Gomoku-variant, exactly-
//! five, open-rule) playing program.
//!
//! The library never installs a global `tracing` subscriber; it only emits
//! events. Binaries (see `main.rs`) are responsible for wiring up a sink.

pub mod bitboard;
pub mod board;
pub mod canon;
pub mod config;
pub mod engine;
pub mod error;
pub mod movegen;
pub mod ordering;
pub mod parallel;
pub mod pattern;
pub mod pondering;
pub mod search;
pub mod stats;
pub mod time_manager;
pub mod tt;
pub mod types;
pub mod vcf;
pub mod win;

pub use bitboard::BitBoard;
pub use board::{Board, GameState, ZobristKeys};
pub use config::EngineConfig;
pub use engine::{new_engine, Engine, SearchStats};
pub use error::{EngineError, Result};
pub use types::{Difficulty, Pattern4, Player, Pos};
