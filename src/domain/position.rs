//! Position ledger: weighted-average entry, realized/unrealized P&L, and
//! liquidation price derivation.
//!
//! The update rule lives as an associated function so it can be exercised
//! without a live matching engine (see the unit tests in this module and
//! the scenario tests under `tests/`).

use crate::domain::order::Side;
use crate::liquidation::tiers::{self, MaintenanceMargin};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a fill affected a trader's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionEffect {
    /// The fill created a new position or added to an existing one in the
    /// same direction.
    Open,
    /// The fill reduced (or flipped) an existing position.
    Close,
    /// The position was force-closed by the liquidation monitor.
    Liquidation,
}

/// A trader's open position in the single instrument this kernel serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Owning trader.
    pub trader_id: Uuid,
    /// Instrument name (the kernel is single-instrument, but the field is
    /// kept so persisted records are self-describing per the spec's
    /// `(trader_id, instrument)` key).
    pub instrument: String,
    /// Signed size: positive long, negative short. Never zero — a flat
    /// position has no record at all.
    pub size: Decimal,
    /// Weighted-average entry price.
    pub entry_price: Decimal,
    /// Leverage in effect for this position.
    pub leverage: u32,
    /// Margin backing this position.
    pub margin: Decimal,
    /// Accumulated realized P&L across the position's lifetime.
    pub realized_pnl: Decimal,
    /// Price at which this position becomes liquidatable.
    pub liquidation_price: Decimal,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// `true` for a long (positive size).
    #[must_use]
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    /// Unrealized P&L at `mark_price`.
    #[must_use]
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        if self.is_long() {
            (mark_price - self.entry_price) * self.size
        } else {
            (self.entry_price - mark_price) * self.size.abs()
        }
    }

    /// `true` when `mark_price` has crossed this position's liquidation
    /// threshold.
    #[must_use]
    pub fn is_liquidatable(&self, mark_price: Decimal) -> bool {
        if self.is_long() {
            mark_price <= self.liquidation_price
        } else {
            mark_price >= self.liquidation_price
        }
    }

    fn recompute_liquidation_price(&mut self, tiers: &MaintenanceMargin) {
        self.liquidation_price =
            tiers::liquidation_price(self.entry_price, self.leverage, self.is_long(), tiers);
    }

    /// Apply a signed size delta `delta` at trade `price` to `existing`
    /// (`None` when the trader is currently flat), per the update rule:
    ///
    /// 1. **Opening** (same sign as the existing position, or flat):
    ///    entry price becomes the size-weighted average; realized P&L
    ///    is untouched.
    /// 2. **Reducing** (opposite sign, `|delta| <= |size|`): realize P&L
    ///    on the closed portion at `price`; entry price is unchanged.
    /// 3. **Flipping** (opposite sign, `|delta| > |size|`): realize P&L on
    ///    the whole existing size, then open the residual at `price`.
    ///
    /// Returns `(new_position, effect, realized_pnl_delta, freed_margin)`.
    /// `new_position` is `None` when the resulting size is exactly zero —
    /// the record is deleted, not zeroed. `realized_pnl_delta` is the P&L
    /// this specific fill realized (zero for a pure open/add).
    /// `freed_margin` is the margin this fill released back to the
    /// trader's free balance (zero unless the fill reduced, closed, or
    /// flipped an existing position).
    #[allow(clippy::too_many_arguments)]
    pub fn apply_fill(
        existing: Option<&Position>,
        trader_id: Uuid,
        instrument: &str,
        delta: Decimal,
        price: Decimal,
        order_leverage: u32,
        tiers: &MaintenanceMargin,
        now: DateTime<Utc>,
    ) -> (Option<Position>, PositionEffect, Decimal, Decimal) {
        let Some(existing) = existing else {
            // Flat -> open.
            let mut pos = Position {
                trader_id,
                instrument: instrument.to_string(),
                size: delta,
                entry_price: price,
                leverage: order_leverage,
                margin: (price * delta.abs()) / Decimal::from(order_leverage),
                realized_pnl: Decimal::ZERO,
                liquidation_price: Decimal::ZERO,
                updated_at: now,
            };
            pos.recompute_liquidation_price(tiers);
            return (Some(pos), PositionEffect::Open, Decimal::ZERO, Decimal::ZERO);
        };

        let same_sign = existing.size.signum() == delta.signum() || existing.size == Decimal::ZERO;

        if same_sign {
            // Opening / adding in the same direction. Leverage is kept
            // from the existing position (spec open question: adds keep
            // the resting position's leverage, not the new order's).
            let new_size = existing.size + delta;
            let new_entry = (existing.size * existing.entry_price + delta * price) / new_size;
            let added_notional = price * delta.abs();
            let mut pos = Position {
                trader_id,
                instrument: instrument.to_string(),
                size: new_size,
                entry_price: new_entry,
                leverage: existing.leverage,
                margin: existing.margin + added_notional / Decimal::from(existing.leverage),
                realized_pnl: existing.realized_pnl,
                liquidation_price: existing.liquidation_price,
                updated_at: now,
            };
            pos.recompute_liquidation_price(tiers);
            return (Some(pos), PositionEffect::Open, Decimal::ZERO, Decimal::ZERO);
        }

        // Opposite sign: reducing or flipping.
        let closed = existing.size.abs().min(delta.abs());
        let realized_delta = if existing.is_long() {
            (price - existing.entry_price) * closed
        } else {
            (existing.entry_price - price) * closed
        };
        let new_realized = existing.realized_pnl + realized_delta;
        let new_size = existing.size + delta;

        if new_size == Decimal::ZERO {
            return (None, PositionEffect::Close, realized_delta, existing.margin);
        }

        if new_size.signum() == existing.size.signum() {
            // Pure reduction: entry price unchanged, margin shrinks
            // proportionally to the closed fraction.
            let closed_fraction = closed / existing.size.abs();
            let freed_margin = existing.margin * closed_fraction;
            let mut pos = Position {
                trader_id,
                instrument: instrument.to_string(),
                size: new_size,
                entry_price: existing.entry_price,
                leverage: existing.leverage,
                margin: existing.margin - freed_margin,
                realized_pnl: new_realized,
                liquidation_price: existing.liquidation_price,
                updated_at: now,
            };
            pos.recompute_liquidation_price(tiers);
            (Some(pos), PositionEffect::Close, realized_delta, freed_margin)
        } else {
            // Flip: residual opens fresh at the fill price, under the
            // leverage of the order that caused the flip.
            let residual = new_size;
            let mut pos = Position {
                trader_id,
                instrument: instrument.to_string(),
                size: residual,
                entry_price: price,
                leverage: order_leverage,
                margin: (price * residual.abs()) / Decimal::from(order_leverage),
                realized_pnl: new_realized,
                liquidation_price: Decimal::ZERO,
                updated_at: now,
            };
            pos.recompute_liquidation_price(tiers);
            (
                Some(pos),
                PositionEffect::Close,
                realized_delta,
                existing.margin,
            )
        }
    }
}

/// Side of the *position* (not of any order): long positions are tagged
/// `Buy`, shorts `Sell`, matching the spec's liquidation-record
/// convention.
#[must_use]
pub fn side_of_position(size: Decimal) -> Side {
    if size > Decimal::ZERO {
        Side::Buy
    } else {
        Side::Sell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tiers() -> MaintenanceMargin {
        MaintenanceMargin {
            conservative: dec!(0.005),
            moderate: dec!(0.01),
            aggressive: dec!(0.02),
            degen: dec!(0.05),
        }
    }

    #[test]
    fn opening_from_flat_sets_entry_to_fill_price() {
        let (pos, effect, realized, freed_margin) = Position::apply_fill(
            None,
            Uuid::new_v4(),
            "R.index",
            dec!(1),
            dec!(100),
            10,
            &tiers(),
            Utc::now(),
        );
        let pos = pos.unwrap();
        assert_eq!(effect, PositionEffect::Open);
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(pos.size, dec!(1));
        assert!(pos.liquidation_price < pos.entry_price);
        assert_eq!(realized, Decimal::ZERO);
        assert_eq!(freed_margin, Decimal::ZERO);
    }

    #[test]
    fn flip_resets_entry_to_fill_price_and_realizes_pnl() {
        // Scenario 4 from the spec: +2 @ 100 long, sell 3 @ 110.
        let long = Position {
            trader_id: Uuid::new_v4(),
            instrument: "R.index".into(),
            size: dec!(2),
            entry_price: dec!(100),
            leverage: 10,
            margin: dec!(20),
            realized_pnl: Decimal::ZERO,
            liquidation_price: dec!(80),
            updated_at: Utc::now(),
        };
        let (pos, effect, realized, freed_margin) = Position::apply_fill(
            Some(&long),
            long.trader_id,
            "R.index",
            dec!(-3),
            dec!(110),
            10,
            &tiers(),
            Utc::now(),
        );
        let pos = pos.unwrap();
        assert_eq!(effect, PositionEffect::Close);
        assert_eq!(pos.size, dec!(-1));
        assert_eq!(pos.entry_price, dec!(110));
        assert_eq!(pos.realized_pnl, dec!(20));
        assert_eq!(realized, dec!(20));
        assert_eq!(freed_margin, dec!(20));
    }

    #[test]
    fn full_close_deletes_the_position() {
        let long = Position {
            trader_id: Uuid::new_v4(),
            instrument: "R.index".into(),
            size: dec!(1),
            entry_price: dec!(100),
            leverage: 5,
            margin: dec!(20),
            realized_pnl: Decimal::ZERO,
            liquidation_price: dec!(80),
            updated_at: Utc::now(),
        };
        let (pos, effect, realized, freed_margin) = Position::apply_fill(
            Some(&long),
            long.trader_id,
            "R.index",
            dec!(-1),
            dec!(105),
            5,
            &tiers(),
            Utc::now(),
        );
        assert!(pos.is_none());
        assert_eq!(effect, PositionEffect::Close);
        assert_eq!(realized, dec!(5));
        assert_eq!(freed_margin, dec!(20));
    }

    #[test]
    fn liquidation_price_sign_matches_direction() {
        let (long, ..) = Position::apply_fill(
            None,
            Uuid::new_v4(),
            "R.index",
            dec!(1),
            dec!(100),
            100,
            &tiers(),
            Utc::now(),
        );
        let long = long.unwrap();
        assert!(long.liquidation_price < long.entry_price);

        let (short, ..) = Position::apply_fill(
            None,
            Uuid::new_v4(),
            "R.index",
            dec!(-1),
            dec!(100),
            100,
            &tiers(),
            Utc::now(),
        );
        let short = short.unwrap();
        assert!(short.liquidation_price > short.entry_price);
    }
}
