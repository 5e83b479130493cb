//! Immutable liquidation records.

use crate::domain::order::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A forced close performed by the liquidation monitor. Immutable once
/// created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liquidation {
    /// Unique identifier.
    pub id: Uuid,
    /// The trader whose position was closed.
    pub trader_id: Uuid,
    /// Side of the position being closed: `Buy` = long liquidated, `Sell`
    /// = short liquidated.
    pub side: Side,
    /// Size closed, always positive.
    pub size: Decimal,
    /// The position's entry price at the time of closure.
    pub entry_price: Decimal,
    /// The position's liquidation-price threshold.
    pub liquidation_price: Decimal,
    /// The mark price that triggered this liquidation.
    pub mark_price: Decimal,
    /// Leverage the position was held at.
    pub leverage: u32,
    /// Signed loss; positive means the trader lost that much.
    pub loss: Decimal,
    /// Whether the insurance fund had to cover a shortfall.
    pub insurance_fund_hit: bool,
    /// Time of the forced close.
    pub timestamp: DateTime<Utc>,
}
