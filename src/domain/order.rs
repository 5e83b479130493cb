//! Orders: the mutable half of the matching engine's input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Side of an order, or of the position it is building/reducing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Buy / long.
    Buy,
    /// Sell / short.
    Sell,
}

impl Side {
    /// The other side.
    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type. Market orders never rest; any unfilled remainder is
/// cancelled rather than left in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Resting limit order at a specified price.
    Limit,
    /// Immediate execution against the best available prices; no price
    /// field is consulted.
    Market,
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Resting, no fills yet.
    Pending,
    /// Resting, partially filled.
    Partial,
    /// Terminal: fully filled.
    Filled,
    /// Terminal: cancelled (explicitly, or a market order's unfilled
    /// remainder).
    Cancelled,
}

impl OrderStatus {
    /// Terminal statuses can never be mutated again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Resting orders are the ones that can sit in the book.
    #[must_use]
    pub fn is_resting(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Partial)
    }
}

/// An order submitted by a trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier, assigned on submission.
    pub id: Uuid,
    /// The trader who submitted this order.
    pub trader_id: Uuid,
    /// Buy or sell.
    pub side: Side,
    /// Limit or market.
    pub order_type: OrderType,
    /// Limit price; ignored for market orders.
    pub price: Decimal,
    /// Original requested size. Always positive.
    pub size: Decimal,
    /// Cumulative filled size. `0 <= filled_size <= size`.
    pub filled_size: Decimal,
    /// Leverage requested for this order, in `[1, max_leverage]`.
    pub leverage: u32,
    /// Current lifecycle state.
    pub status: OrderStatus,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Size not yet filled.
    #[must_use]
    pub fn remaining_size(&self) -> Decimal {
        self.size - self.filled_size
    }

    /// Apply a fill of `fill_size` at `now`, advancing `filled_size` and
    /// `status`. Does not decide whether the order rests or is cancelled
    /// when a remainder exists for a market order — that is the matching
    /// loop's call, made once matching against the book is exhausted.
    pub fn apply_fill(&mut self, fill_size: Decimal, now: DateTime<Utc>) {
        self.filled_size += fill_size;
        self.status = if self.remaining_size() <= Decimal::ZERO {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
        self.updated_at = now;
    }
}
