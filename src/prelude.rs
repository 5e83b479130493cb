//! Convenience re-exports of the crate's most commonly used types.
//!
//! ```
//! use rindex_kernel::prelude::*;
//! ```

// Configuration.
pub use crate::config::{KernelConfig, MaintenanceMarginConfig};

// Domain records.
pub use crate::domain::{
    InsuranceFund, InsuranceFundSnapshot, Liquidation, Order, OrderStatus, OrderType, Position,
    PositionEffect, Side, Trade, Trader, TraderType,
};

// Errors.
pub use crate::error::{KernelError, KernelResult};

// Event hub.
pub use crate::events::{EventHub, HubEvent};

// Liquidation monitor and leverage tiers.
pub use crate::liquidation::{tiers::MaintenanceMargin, LiquidationMonitor};

// Market stats and candles.
pub use crate::market::{Candle, CandleInterval, MarketStats};

// The matching engine.
pub use crate::matching::{MatchingEngine, OpenInterest, OrderBookSnapshot};

// Order book.
pub use crate::orderbook::{OrderBook, OrderBookError, PriceLevel};

// Persistence.
pub use crate::persistence::{MemoryStore, PersistenceError, PersistenceStore};
