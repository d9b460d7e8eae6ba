//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{ArenaHandle, ArenaSettings, GameArena};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
}

impl AppState {
    /// Build the state and the arena it talks to. The caller spawns the arena.
    pub fn new(config: Config) -> (Self, GameArena) {
        let config = Arc::new(config);

        // Initialize arena
        let (arena, handle) = GameArena::new(ArenaSettings::from(config.as_ref()));

        let state = Self {
            config,
            arena: handle,
        };

        (state, arena)
    }
}
