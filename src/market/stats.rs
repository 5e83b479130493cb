//! Headline market statistics, recomputed on demand from the trade log
//! and the open-position set.

use crate::domain::Position;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Trade;

/// A point-in-time summary of the instrument's trading activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketStats {
    /// Price of the most recent trade (or the configured starting price).
    pub last_price: Decimal,
    /// Same as `last_price` — the kernel's mark price is defined as
    /// last-trade price, never order-book mid.
    pub mark_price: Decimal,
    /// Highest trade price in the trailing 24 hours.
    pub high_24h: Decimal,
    /// Lowest trade price in the trailing 24 hours.
    pub low_24h: Decimal,
    /// Sum of `size * price` over trades in the trailing 24 hours.
    pub volume_24h: Decimal,
    /// Sum of `|size|` over every non-flat position.
    pub open_interest: Decimal,
    /// Current insurance fund balance.
    pub insurance_fund: Decimal,
}

impl MarketStats {
    /// Compute stats as of `now`, given the most recent trades (any
    /// order), all open positions, and the fund balance. `fallback_price`
    /// is used for `last_price`/`mark_price` when no trade has occurred
    /// yet.
    #[must_use]
    pub fn compute(
        now: DateTime<Utc>,
        recent_trades: &[Trade],
        positions: &[Position],
        insurance_fund_balance: Decimal,
        fallback_price: Decimal,
    ) -> Self {
        let last_trade = recent_trades.iter().max_by_key(|t| t.timestamp);
        let last_price = last_trade.map_or(fallback_price, |t| t.price);

        let window_start = now - Duration::hours(24);
        let window: Vec<&Trade> = recent_trades
            .iter()
            .filter(|t| t.timestamp >= window_start && t.timestamp <= now)
            .collect();

        let high_24h = window
            .iter()
            .map(|t| t.price)
            .fold(None, |acc: Option<Decimal>, p| {
                Some(acc.map_or(p, |a| a.max(p)))
            })
            .unwrap_or(last_price);
        let low_24h = window
            .iter()
            .map(|t| t.price)
            .fold(None, |acc: Option<Decimal>, p| {
                Some(acc.map_or(p, |a| a.min(p)))
            })
            .unwrap_or(last_price);
        let volume_24h = window.iter().map(|t| t.size * t.price).sum();

        let open_interest = positions.iter().map(|p| p.size.abs()).sum();

        Self {
            last_price,
            mark_price: last_price,
            high_24h,
            low_24h,
            volume_24h,
            open_interest,
            insurance_fund: insurance_fund_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn trade_at(price: Decimal, ts: DateTime<Utc>) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            price,
            size: dec!(1),
            timestamp: ts,
            buyer_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            buyer_order_id: Uuid::new_v4(),
            seller_order_id: Uuid::new_v4(),
            buyer_leverage: 1,
            seller_leverage: 1,
            buyer_effect: crate::domain::PositionEffect::Open,
            seller_effect: crate::domain::PositionEffect::Open,
            buyer_new_position: dec!(1),
            seller_new_position: dec!(-1),
            aggressor_side: crate::domain::order::Side::Buy,
        }
    }

    #[test]
    fn no_trades_falls_back_to_configured_price() {
        let now = Utc::now();
        let stats = MarketStats::compute(now, &[], &[], Decimal::ZERO, dec!(1000));
        assert_eq!(stats.last_price, dec!(1000));
        assert_eq!(stats.mark_price, dec!(1000));
    }

    #[test]
    fn last_price_is_most_recent_trade() {
        let now = Utc::now();
        let trades = vec![
            trade_at(dec!(100), now - Duration::minutes(10)),
            trade_at(dec!(105), now - Duration::minutes(1)),
        ];
        let stats = MarketStats::compute(now, &trades, &[], Decimal::ZERO, dec!(1000));
        assert_eq!(stats.last_price, dec!(105));
        assert_eq!(stats.high_24h, dec!(105));
        assert_eq!(stats.low_24h, dec!(100));
        assert_eq!(stats.volume_24h, dec!(205));
    }
}
