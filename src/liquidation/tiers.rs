//! Leverage tiers, maintenance margin, and the liquidation-price formula.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maintenance-margin fraction for each leverage tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaintenanceMargin {
    /// Leverage <= 10.
    pub conservative: Decimal,
    /// Leverage <= 50.
    pub moderate: Decimal,
    /// Leverage <= 100.
    pub aggressive: Decimal,
    /// Leverage > 100.
    pub degen: Decimal,
}

impl From<crate::config::MaintenanceMarginConfig> for MaintenanceMargin {
    fn from(c: crate::config::MaintenanceMarginConfig) -> Self {
        Self {
            conservative: c.conservative,
            moderate: c.moderate,
            aggressive: c.aggressive,
            degen: c.degen,
        }
    }
}

/// Which maintenance-margin bracket a given leverage falls into. The
/// mapping is fixed; the margin fractions themselves are configuration.
#[must_use]
pub fn maintenance_margin_for(leverage: u32, tiers: &MaintenanceMargin) -> Decimal {
    if leverage <= 10 {
        tiers.conservative
    } else if leverage <= 50 {
        tiers.moderate
    } else if leverage <= 100 {
        tiers.aggressive
    } else {
        tiers.degen
    }
}

/// Derive the liquidation price for a position, per the spec's formula:
///
/// ```text
/// maintMargin = margins[tierOf(leverage)]
/// distance    = entry_price / leverage * (1 - maintMargin)
/// liqPrice    = entry_price - distance      (long)
///               entry_price + distance      (short)
/// ```
#[must_use]
pub fn liquidation_price(
    entry_price: Decimal,
    leverage: u32,
    is_long: bool,
    tiers: &MaintenanceMargin,
) -> Decimal {
    let maint_margin = maintenance_margin_for(leverage, tiers);
    let distance = entry_price / Decimal::from(leverage) * (Decimal::ONE - maint_margin);
    if is_long {
        entry_price - distance
    } else {
        entry_price + distance
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
    fn scenario_5_aggressive_tier_liq_price() {
        // entry 100, leverage 100 -> aggressive tier, maintMargin = 0.02
        // distance = 100/100 * 0.98 = 0.98 -> liq_price = 99.02
        let liq = liquidation_price(dec!(100), 100, true, &tiers());
        assert_eq!(liq, dec!(99.02));
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(maintenance_margin_for(10, &tiers()), tiers().conservative);
        assert_eq!(maintenance_margin_for(11, &tiers()), tiers().moderate);
        assert_eq!(maintenance_margin_for(50, &tiers()), tiers().moderate);
        assert_eq!(maintenance_margin_for(51, &tiers()), tiers().aggressive);
        assert_eq!(maintenance_margin_for(100, &tiers()), tiers().aggressive);
        assert_eq!(maintenance_margin_for(101, &tiers()), tiers().degen);
    }
}
