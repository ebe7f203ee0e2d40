//! Caro Engine - demo binary
//!
//! Installs a `tracing-subscriber` filter (the library itself stays silent
//! on that front), builds an `Engine`, and plays a short scripted game
//! against itself on an empty board, printing each move and the stats that
//! produced it.

use caro_engine::{new_engine, Board, Difficulty, EngineConfig, Player};

fn main() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = EngineConfig::new(15);
    let engine = new_engine(config).expect("engine construction should not fail with a default config");

    let mut board = Board::empty(15);
    let mut side = Player::Red;
    let mut move_number = 0u16;

    for _ in 0..20 {
        let (mv, stats) = match engine.get_best_move(&board, side, Difficulty::Hard, 30_000, move_number, false, true) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(%err, "no move available, stopping demo game");
                break;
            }
        };

        board = board
            .place(mv.x, mv.y, side, engine.zobrist())
            .expect("get_best_move guarantees a legal move");

        println!(
            "move {}: {:?} plays ({}, {}) -- depth {} nodes {} nps {}",
            move_number, side, mv.x, mv.y, stats.depth, stats.nodes, stats.nps
        );

        if board.win_at(mv, side).winning_line.is_some() {
            println!("{:?} wins", side);
            break;
        }

        side = side.opponent();
        move_number += 1;
    }
}
