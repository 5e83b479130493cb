//! The durability boundary: a trait the matching engine writes through,
//! with an in-memory implementation and an optional write-ahead journal.

#[cfg(feature = "journal")]
pub mod journal;
pub mod memory;

use crate::domain::{Liquidation, Order, Position, Trade, Trader};
use crate::market::stats::MarketStats;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

pub use memory::MemoryStore;

/// Errors raised by a [`PersistenceStore`] implementation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PersistenceError {
    /// The backing store could not be reached or is not currently
    /// accepting writes.
    #[error("persistence store unavailable: {0}")]
    Unavailable(String),

    /// Durable state failed an integrity check on load (journal CRC
    /// mismatch, truncated record).
    #[error("persisted state is corrupt: {0}")]
    Corrupt(String),

    /// The underlying filesystem operation failed.
    #[error("persistence I/O error at {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The six tables the spec's persisted-state layout describes, exposed as
/// a single synchronous trait. The matching engine calls this from inside
/// its exclusive lock, so implementations must not block on anything that
/// could itself wait on the engine (no re-entrant calls back into
/// `MatchingEngine`).
pub trait PersistenceStore: Send + Sync {
    /// Insert or overwrite a trader record (registration, or a balance /
    /// stats update from a fill or forced close).
    fn put_trader(&self, trader: &Trader) -> Result<(), PersistenceError>;

    /// Every registered trader.
    fn load_traders(&self) -> Result<Vec<Trader>, PersistenceError>;

    /// Insert or overwrite a resting/terminal order record.
    fn put_order(&self, order: &Order) -> Result<(), PersistenceError>;

    /// Insert or overwrite a trader's position, keyed by
    /// `(instrument, trader_id)`.
    fn put_position(&self, position: &Position) -> Result<(), PersistenceError>;

    /// Delete a trader's position record (the position closed to flat).
    fn delete_position(&self, trader_id: Uuid, instrument: &str) -> Result<(), PersistenceError>;

    /// Append an executed trade. Trades are never mutated once written.
    fn append_trade(&self, trade: &Trade) -> Result<(), PersistenceError>;

    /// Append a liquidation record. Liquidations are never mutated once
    /// written.
    fn append_liquidation(&self, liquidation: &Liquidation) -> Result<(), PersistenceError>;

    /// Persist the insurance fund's current balance and lifetime totals.
    fn put_insurance_fund_balance(
        &self,
        balance: rust_decimal::Decimal,
        total_in: rust_decimal::Decimal,
        total_out: rust_decimal::Decimal,
    ) -> Result<(), PersistenceError>;

    /// All orders that are still resting (not `Filled`/`Cancelled`), for
    /// rebuilding the book on startup.
    fn load_resting_orders(&self) -> Result<Vec<Order>, PersistenceError>;

    /// Every open position, for rebuilding the ledger on startup.
    fn load_positions(&self) -> Result<Vec<Position>, PersistenceError>;

    /// The most recent trades, most recent first, capped at `limit`.
    fn recent_trades(&self, limit: usize) -> Result<Vec<Trade>, PersistenceError>;

    /// Trades involving `trader_id` as buyer or seller, most recent first,
    /// capped at `limit`.
    fn trades_for_trader(&self, trader_id: Uuid, limit: usize) -> Result<Vec<Trade>, PersistenceError>;

    /// The most recent liquidations, most recent first, capped at `limit`.
    fn recent_liquidations(&self, limit: usize) -> Result<Vec<Liquidation>, PersistenceError>;

    /// Trades in `[since, until]`, oldest first, for candle bucketing.
    fn trades_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Trade>, PersistenceError>;

    /// The insurance fund's last persisted balance and totals, if any
    /// were ever written.
    fn load_insurance_fund_balance(
        &self,
    ) -> Result<Option<(rust_decimal::Decimal, rust_decimal::Decimal, rust_decimal::Decimal)>, PersistenceError>;

    /// Overwrite the instrument's headline market statistics, recomputed
    /// after every trade.
    fn put_market_stats(&self, stats: &MarketStats) -> Result<(), PersistenceError>;

    /// The last persisted market statistics, if any were ever written.
    fn get_market_stats(&self) -> Result<Option<MarketStats>, PersistenceError>;
}
