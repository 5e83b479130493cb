//! The matching engine: the single authority that accepts orders, executes
//! fills, mutates positions, persists, and emits events.

pub mod engine;

pub use engine::{MatchingEngine, OpenInterest, OrderBookSnapshot};
