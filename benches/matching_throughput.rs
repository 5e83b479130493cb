use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use rindex_kernel::domain::order::{Order, OrderStatus, OrderType, Side};
use rindex_kernel::domain::{InsuranceFund, TraderType};
use rindex_kernel::events::EventHub;
use rindex_kernel::persistence::MemoryStore;
use rindex_kernel::{KernelConfig, MatchingEngine};
use rindex_kernel::config::MaintenanceMarginConfig;

fn config() -> KernelConfig {
    KernelConfig {
        instrument: "R.index".into(),
        starting_mark_price: dec!(1000),
        tick_size: dec!(0.01),
        min_order_size: dec!(0.001),
        max_leverage: 100,
        liquidation_check_interval_ms: 100,
        insurance_fund_initial_balance: dec!(100_000),
        maintenance_margin: MaintenanceMarginConfig {
            conservative: dec!(0.005),
            moderate: dec!(0.01),
            aggressive: dec!(0.02),
            degen: dec!(0.05),
        },
        starting_trader_balance: dec!(1_000_000),
        recent_trades_capacity: 1000,
    }
}

fn engine() -> MatchingEngine {
    MatchingEngine::new(
        &config(),
        Arc::new(MemoryStore::new()),
        Arc::new(EventHub::new()),
        Arc::new(InsuranceFund::new(dec!(100_000))),
    )
    .expect("engine construction")
}

fn limit_order(trader_id: Uuid, side: Side, price: Decimal, size: Decimal) -> Order {
    Order {
        id: Uuid::nil(),
        trader_id,
        side,
        order_type: OrderType::Limit,
        price,
        size,
        filled_size: Decimal::ZERO,
        leverage: 10,
        status: OrderStatus::Pending,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

fn market_order(trader_id: Uuid, side: Side, size: Decimal) -> Order {
    Order {
        id: Uuid::nil(),
        trader_id,
        side,
        order_type: OrderType::Market,
        price: Decimal::ZERO,
        size,
        filled_size: Decimal::ZERO,
        leverage: 10,
        status: OrderStatus::Pending,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

/// Submitting a resting limit order with no crossable liquidity: pure
/// book-insertion cost.
fn bench_resting_limit_inserts(c: &mut Criterion) {
    c.bench_function("submit_resting_limit_order", |b| {
        let engine = engine();
        let trader = engine
            .register_trader("maker", TraderType::MarketMaker)
            .unwrap();
        let mut price = dec!(900);
        b.iter(|| {
            price += dec!(0.01);
            engine
                .submit(limit_order(trader.id, Side::Buy, price, dec!(1)))
                .unwrap();
        });
    });
}

/// A market order that fully crosses a single resting order at the best
/// price: the matching loop's steady-state cost.
fn bench_single_level_cross(c: &mut Criterion) {
    c.bench_function("submit_crossing_market_order", |b| {
        let engine = engine();
        let maker = engine
            .register_trader("maker", TraderType::MarketMaker)
            .unwrap();
        let taker = engine.register_trader("taker", TraderType::Bot).unwrap();
        b.iter(|| {
            engine
                .submit(limit_order(maker.id, Side::Sell, dec!(1000), dec!(1)))
                .unwrap();
            engine
                .submit(market_order(taker.id, Side::Buy, dec!(1)))
                .unwrap();
        });
    });
}

/// Matching throughput against a book with a pre-populated depth ladder, to
/// show the cost of walking several price levels.
fn bench_deep_book_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_depth_ladder");
    for depth in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let engine = engine();
            let maker = engine
                .register_trader("maker", TraderType::MarketMaker)
                .unwrap();
            let taker = engine.register_trader("taker", TraderType::Bot).unwrap();
            for i in 0..depth {
                engine
                    .submit(limit_order(
                        maker.id,
                        Side::Sell,
                        dec!(1000) + Decimal::from(i),
                        dec!(1),
                    ))
                    .unwrap();
            }
            b.iter(|| {
                engine
                    .submit(market_order(taker.id, Side::Buy, Decimal::from(depth)))
                    .unwrap();
                for i in 0..depth {
                    engine
                        .submit(limit_order(
                            maker.id,
                            Side::Sell,
                            dec!(1000) + Decimal::from(i),
                            dec!(1),
                        ))
                        .unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_resting_limit_inserts,
    bench_single_level_cross,
    bench_deep_book_sweep,
);
criterion_main!(benches);
