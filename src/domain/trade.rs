//! Immutable trade records.

use crate::domain::order::Side;
use crate::domain::position::PositionEffect;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One executed fill between two distinct traders (`buyer_id` always
/// differs from `seller_id` — the matching engine skips self-trades
/// rather than recording them). Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier.
    pub id: Uuid,
    /// Execution price — always the resting order's price.
    pub price: Decimal,
    /// Size exchanged.
    pub size: Decimal,
    /// Execution time.
    pub timestamp: DateTime<Utc>,
    /// Buyer's trader id.
    pub buyer_id: Uuid,
    /// Seller's trader id.
    pub seller_id: Uuid,
    /// Buyer's order id.
    pub buyer_order_id: Uuid,
    /// Seller's order id.
    pub seller_order_id: Uuid,
    /// Leverage in effect for the buyer's side of this fill.
    pub buyer_leverage: u32,
    /// Leverage in effect for the seller's side of this fill.
    pub seller_leverage: u32,
    /// How this fill affected the buyer's position.
    pub buyer_effect: PositionEffect,
    /// How this fill affected the seller's position.
    pub seller_effect: PositionEffect,
    /// Buyer's resulting signed position size after this fill.
    pub buyer_new_position: Decimal,
    /// Seller's resulting signed position size after this fill.
    pub seller_new_position: Decimal,
    /// Which side was the newly submitted order in this fill.
    pub aggressor_side: Side,
}
