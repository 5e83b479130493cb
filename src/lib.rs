//! # R.index Trading Kernel
//!
//! A simulated perpetual-futures exchange for a single synthetic index
//! instrument. Traders submit leveraged buy/sell orders; the kernel matches
//! them against a price-time-priority order book, tracks signed positions
//! and realized/unrealized P&L, and forcibly closes positions whose mark
//! price crosses a leverage-dependent liquidation threshold.
//!
//! ## Scope
//!
//! This crate is the core engine: order book, matching, position ledger,
//! liquidation monitor, persistence, and event fan-out. It owns no
//! transport — an embedding application drains [`events::EventHub`]
//! receivers onto a WebSocket, serves [`matching::MatchingEngine`] queries
//! over HTTP, and runs [`liquidation::LiquidationMonitor::run`] as a task.
//!
//! ## Concurrency model
//!
//! The matching engine holds a single exclusive lock for the duration of
//! `submit`, `cancel`, and a liquidation scan. The insurance fund and the
//! event hub's subscriber registry are protected by their own, independent
//! locks, so a slow subscriber or a liquidation scan never blocks order
//! submission.
//!
//! ## Status
//!
//! This crate is a simulation kernel, not a production trading system: it
//! has no funding-rate mechanism, no auto-deleveraging beyond the
//! insurance-fund contract, and serves exactly one instrument per engine
//! instance.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod liquidation;
pub mod market;
pub mod matching;
pub mod orderbook;
pub mod persistence;
pub mod prelude;

pub use config::KernelConfig;
pub use error::{KernelError, KernelResult};
pub use matching::MatchingEngine;
