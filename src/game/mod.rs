//! Game simulation modules

pub mod arena;
pub mod combat;
pub mod input;
pub mod physics;
pub mod simulator;
pub mod snapshot;

pub use arena::{ArenaCommand, ArenaHandle, ArenaSettings, ArenaStats, Broadcast, GameArena};
pub use input::{InputQueue, InputSample, Key, KeyState, MoveIntent};
pub use physics::ArenaRules;
pub use simulator::{ActionEvent, PlayerState, Simulator};
