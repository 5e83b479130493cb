//! Insurance fund: a singleton balance, protected by its own lock so the
//! liquidation monitor can read it without contending with the matching
//! engine's lock (spec §5 "Shared resources").

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the fund, safe to hand out without holding the
/// lock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InsuranceFundSnapshot {
    /// Current balance.
    pub balance: Decimal,
    /// Monotonic lifetime total credited to the fund.
    pub total_in: Decimal,
    /// Monotonic lifetime total paid out of the fund.
    pub total_out: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct InsuranceFundState {
    balance: Decimal,
    total_in: Decimal,
    total_out: Decimal,
}

/// The insurance fund singleton.
#[derive(Debug)]
pub struct InsuranceFund {
    state: Mutex<InsuranceFundState>,
}

/// Result of resolving one liquidation's loss against margin and the
/// fund.
#[derive(Debug, Clone, Copy)]
pub struct FundResolution {
    /// Whether the fund had to cover a shortfall (loss > margin and the
    /// fund was insufficient to cover it in full, or covered a partial
    /// shortfall at all).
    pub insurance_fund_hit: bool,
}

impl InsuranceFund {
    /// Create a fund with the given starting balance.
    #[must_use]
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            state: Mutex::new(InsuranceFundState {
                balance: initial_balance,
                total_in: Decimal::ZERO,
                total_out: Decimal::ZERO,
            }),
        }
    }

    /// Overwrite the fund's state with a persisted `(balance, total_in,
    /// total_out)` snapshot, loaded once at engine construction so a
    /// restart resumes from the fund's actual history rather than the
    /// configured starting balance.
    pub fn restore(&self, balance: Decimal, total_in: Decimal, total_out: Decimal) {
        let mut s = self.state.lock();
        s.balance = balance;
        s.total_in = total_in;
        s.total_out = total_out;
    }

    /// Current balance, total credited, and total debited.
    #[must_use]
    pub fn snapshot(&self) -> InsuranceFundSnapshot {
        let s = self.state.lock();
        InsuranceFundSnapshot {
            balance: s.balance,
            total_in: s.total_in,
            total_out: s.total_out,
        }
    }

    /// Resolve a forced close's loss against the margin that was backing
    /// the position, per the spec's §4.4 rule:
    ///
    /// - `loss <= margin`: the surplus accrues to the fund.
    /// - `loss > margin`: the shortfall is paid from the fund, up to its
    ///   balance; any residual beyond the fund's balance is forgiven here
    ///   (no socialised loss / ADL in this spec).
    pub fn resolve(&self, loss: Decimal, margin: Decimal) -> FundResolution {
        let mut s = self.state.lock();
        if loss <= margin {
            let surplus = margin - loss;
            s.balance += surplus;
            s.total_in += surplus;
            FundResolution {
                insurance_fund_hit: false,
            }
        } else {
            let shortfall = loss - margin;
            let paid = shortfall.min(s.balance);
            s.balance -= paid;
            s.total_out += paid;
            FundResolution {
                insurance_fund_hit: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn surplus_accrues_when_loss_within_margin() {
        let fund = InsuranceFund::new(dec!(100));
        let r = fund.resolve(dec!(1), dec!(1));
        assert!(!r.insurance_fund_hit);
        let snap = fund.snapshot();
        assert_eq!(snap.balance, dec!(100));
        assert_eq!(snap.total_in, dec!(0));
    }

    #[test]
    fn shortfall_is_paid_from_fund() {
        // Scenario 6: loss 1.5, margin 1, shortfall 0.5.
        let fund = InsuranceFund::new(dec!(100));
        let r = fund.resolve(dec!(1.5), dec!(1));
        assert!(r.insurance_fund_hit);
        let snap = fund.snapshot();
        assert_eq!(snap.balance, dec!(99.5));
        assert_eq!(snap.total_out, dec!(0.5));
    }

    #[test]
    fn exhausted_fund_forgives_residual_but_balance_never_negative() {
        let fund = InsuranceFund::new(dec!(0.2));
        let r = fund.resolve(dec!(1.5), dec!(1));
        assert!(r.insurance_fund_hit);
        let snap = fund.snapshot();
        assert_eq!(snap.balance, dec!(0));
        assert_eq!(snap.total_out, dec!(0.2));
    }

    #[test]
    fn restore_replaces_state_wholesale() {
        let fund = InsuranceFund::new(dec!(100));
        fund.restore(dec!(250), dec!(300), dec!(150));
        let snap = fund.snapshot();
        assert_eq!(snap.balance, dec!(250));
        assert_eq!(snap.total_in, dec!(300));
        assert_eq!(snap.total_out, dec!(150));
    }
}
