//! Brawl Arena - authoritative simulation and state sync for a multiplayer
//! brawler
//!
//! - `game`: input queues, physics, the per-tick simulator and the arena task
//! - `ws` / `http`: WebSocket protocol and the axum server shell
//! - `client`: input batching plus snapshot reconciliation and interpolation

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
