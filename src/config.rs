//! Caro Engine - Engine configuration

use crate::canon::{BookStore, NullBookStore};
use std::sync::Arc;

pub const DEFAULT_TT_SIZE_BYTES: usize = 128 * 1024 * 1024;

#[derive(Clone)]
pub struct EngineConfig {
    pub tt_size_bytes: usize,
    /// `None` means "auto": `num_cpus::get().saturating_sub(1)`, clamped to 1.
    pub threads: Option<usize>,
    pub board_size: u8,
    /// `None` is equivalent to `NullBookStore` (no opening book).
    pub book_store: Option<Arc<dyn BookStore>>,
    pub rng_seed: Option<u64>,
    /// Passthrough only consulted by the demo binary to initialize its
    /// `tracing-subscriber` filter; the library itself never installs a
    /// global subscriber.
    pub log_level: Option<String>,
}

impl EngineConfig {
    pub fn new(board_size: u8) -> Self {
        EngineConfig {
            tt_size_bytes: DEFAULT_TT_SIZE_BYTES,
            threads: None,
            board_size,
            book_store: None,
            rng_seed: None,
            log_level: None,
        }
    }

    pub fn resolved_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| num_cpus::get().saturating_sub(1)).max(1)
    }

    /// Resolves `book_store` to a concrete lookup target, defaulting to a
    /// store that never returns any entries.
    pub fn resolved_book_store(&self) -> Arc<dyn BookStore> {
        self.book_store.clone().unwrap_or_else(|| Arc::new(NullBookStore))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(15)
    }
}
