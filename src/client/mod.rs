//! Client-side core: input batching and snapshot reconciliation

pub mod batcher;
pub mod world;

pub use batcher::InputBatcher;
pub use world::{ClientPlayer, ClientWorld};
