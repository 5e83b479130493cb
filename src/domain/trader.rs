//! Trader accounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of account, set at registration time by the authentication
/// collaborator and never changed afterwards by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraderType {
    /// A human-operated account.
    Human,
    /// An automated trading bot.
    Bot,
    /// A designated market maker with (possibly) preferential fee treatment
    /// upstream; the kernel itself treats it like any other trader.
    MarketMaker,
}

/// A trader account, mutated only by the matching engine (on trade) and
/// the liquidation monitor (on forced close).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trader {
    /// Stable identifier, assigned at registration.
    pub id: Uuid,
    /// Unique display handle.
    pub username: String,
    /// Account kind.
    pub trader_type: TraderType,
    /// Free balance available for margin. Non-negative except transiently
    /// during a forced close, when a loss exceeding margin is netted
    /// against it before the insurance fund is consulted.
    pub balance: Decimal,
    /// Signed, cumulative realized profit and loss.
    pub total_pnl: Decimal,
    /// Number of fills this trader has participated in (either side).
    pub trade_count: u64,
    /// Highest leverage this trader has ever used. Monotonically
    /// non-decreasing.
    pub max_leverage_used: u32,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl Trader {
    /// Construct a freshly registered trader with zeroed trading history.
    pub fn new(
        id: Uuid,
        username: impl Into<String>,
        trader_type: TraderType,
        starting_balance: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            trader_type,
            balance: starting_balance,
            total_pnl: Decimal::ZERO,
            trade_count: 0,
            max_leverage_used: 0,
            created_at,
        }
    }

    /// Raise `max_leverage_used` to `max(prior, leverage)`. Never lowers it.
    pub fn note_leverage_used(&mut self, leverage: u32) {
        if leverage > self.max_leverage_used {
            self.max_leverage_used = leverage;
        }
    }

    /// Record participation in one fill: bumps the trade counter and the
    /// leverage high-water mark together, since every fill that touches a
    /// trader also carries the leverage of the order that caused it.
    pub fn record_fill(&mut self, leverage: u32) {
        self.trade_count += 1;
        self.note_leverage_used(leverage);
    }

    /// Fold a realized P&L amount (signed) into the running total. Called
    /// on every fill that closes or reduces a position; margin/balance
    /// movement is handled separately (only a forced close touches
    /// `balance` directly, via [`Trader::credit_balance`]).
    pub fn record_realized_pnl(&mut self, amount: Decimal) {
        self.total_pnl += amount;
    }

    /// Credit `amount` to the free balance without touching `total_pnl`
    /// (e.g. returning margin freed by a forced close).
    pub fn credit_balance(&mut self, amount: Decimal) {
        self.balance += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_leverage_used_never_decreases() {
        let mut t = Trader::new(Uuid::new_v4(), "alice", TraderType::Human, Decimal::ZERO, Utc::now());
        t.note_leverage_used(10);
        t.note_leverage_used(5);
        assert_eq!(t.max_leverage_used, 10);
        t.note_leverage_used(20);
        assert_eq!(t.max_leverage_used, 20);
    }
}
