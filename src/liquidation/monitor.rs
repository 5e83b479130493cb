//! The periodic forced-close scan (§4.4 "Scan loop").

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::matching::MatchingEngine;

/// Drives [`MatchingEngine::liquidate_triggered`] on a fixed interval until
/// told to stop. Runs as its own task (or OS thread, in a sync embedding);
/// the engine's own lock is what actually makes each scan safe to run
/// concurrently with order submission.
pub struct LiquidationMonitor {
    engine: Arc<MatchingEngine>,
    check_interval: Duration,
}

impl LiquidationMonitor {
    /// Build a monitor that scans `engine` every `check_interval_ms`
    /// milliseconds.
    #[must_use]
    pub fn new(engine: Arc<MatchingEngine>, check_interval_ms: u64) -> Self {
        Self {
            engine,
            check_interval: Duration::from_millis(check_interval_ms),
        }
    }

    /// Run the scan loop until `shutdown` signals `true`. Any forced close
    /// already underway when shutdown fires completes before the loop
    /// exits, since each scan holds the engine lock for its own duration.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.check_interval);
        info!(
            instrument = self.engine.instrument(),
            interval_ms = self.check_interval.as_millis() as u64,
            "liquidation monitor started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.engine.liquidate_triggered();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("liquidation monitor stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KernelConfig, MaintenanceMarginConfig};
    use crate::domain::order::{Order, OrderStatus, OrderType, Side};
    use crate::domain::{InsuranceFund, TraderType};
    use crate::events::EventHub;
    use crate::persistence::MemoryStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn config() -> KernelConfig {
        KernelConfig {
            instrument: "R.index".into(),
            starting_mark_price: dec!(1000),
            tick_size: dec!(0.01),
            min_order_size: dec!(0.001),
            max_leverage: 100,
            liquidation_check_interval_ms: 20,
            insurance_fund_initial_balance: dec!(10000),
            maintenance_margin: MaintenanceMarginConfig {
                conservative: dec!(0.005),
                moderate: dec!(0.01),
                aggressive: dec!(0.02),
                degen: dec!(0.05),
            },
            starting_trader_balance: dec!(100000),
            recent_trades_capacity: 1000,
        }
    }

    fn limit_order(trader_id: Uuid, side: Side, price: rust_decimal::Decimal, size: rust_decimal::Decimal, leverage: u32) -> Order {
        Order {
            id: Uuid::nil(),
            trader_id,
            side,
            order_type: OrderType::Limit,
            price,
            size,
            filled_size: rust_decimal::Decimal::ZERO,
            leverage,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn market_order(trader_id: Uuid, side: Side, size: rust_decimal::Decimal, leverage: u32) -> Order {
        Order {
            id: Uuid::nil(),
            trader_id,
            side,
            order_type: OrderType::Market,
            price: rust_decimal::Decimal::ZERO,
            size,
            filled_size: rust_decimal::Decimal::ZERO,
            leverage,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn scan_loop_closes_a_triggered_position_then_stops_on_shutdown() {
        let engine = Arc::new(
            MatchingEngine::new(
                &config(),
                Arc::new(MemoryStore::new()),
                Arc::new(EventHub::new()),
                Arc::new(InsuranceFund::new(dec!(10000))),
            )
            .unwrap(),
        );
        let buyer = engine.register_trader("buyer", TraderType::Human).unwrap();
        let seller = engine.register_trader("seller", TraderType::Human).unwrap();
        engine
            .submit(limit_order(seller.id, Side::Sell, dec!(100), dec!(1), 100))
            .unwrap();
        engine
            .submit(market_order(buyer.id, Side::Buy, dec!(1), 100))
            .unwrap();
        // Push the mark price below the long's liquidation threshold.
        engine
            .submit(limit_order(buyer.id, Side::Sell, dec!(90), dec!(0.001), 100))
            .unwrap();
        engine
            .submit(market_order(seller.id, Side::Buy, dec!(0.001), 100))
            .unwrap();

        let monitor = LiquidationMonitor::new(engine.clone(), 10);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { monitor.run(rx).await });

        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(engine.get_position(buyer.id).is_none());
    }
}
