//! The synchronous matching core: one exclusive lock guarding the order
//! book, position ledger, and trader accounts for the instrument this
//! kernel instance serves.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::config::KernelConfig;
use crate::domain::order::{Order, OrderStatus, OrderType, Side};
use crate::domain::{InsuranceFund, Liquidation, Position, Trade, Trader, TraderType};
use crate::error::{KernelError, KernelResult};
use crate::events::{EventHub, HubEvent};
use crate::liquidation::tiers::MaintenanceMargin;
use crate::market::candles::{bucket_trades, Candle, CandleInterval};
use crate::market::stats::MarketStats;
use crate::orderbook::OrderBook;
use crate::persistence::PersistenceStore;

/// Top-of-book levels handed back by [`MatchingEngine::get_order_book`].
#[derive(Debug, Clone)]
pub struct OrderBookSnapshot {
    /// `(price, total_size)`, best first.
    pub bids: Vec<(Decimal, Decimal)>,
    /// `(price, total_size)`, best first.
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Aggregate open interest, broken down by position direction.
#[derive(Debug, Clone, Copy)]
pub struct OpenInterest {
    /// Sum of `|size|` over every non-flat position.
    pub total_oi: Decimal,
    /// Number of long positions.
    pub long_positions: usize,
    /// Number of short positions.
    pub short_positions: usize,
}

struct EngineState {
    book: OrderBook,
    traders: HashMap<Uuid, Trader>,
    /// Keyed by trader id: the kernel serves a single instrument, so a
    /// trader has at most one position.
    positions: HashMap<Uuid, Position>,
    /// Newest first, capped at `recent_trades_capacity`.
    recent_trades: VecDeque<Trade>,
    /// Newest first, capped at `recent_trades_capacity`.
    recent_liquidations: VecDeque<Liquidation>,
    last_trade_price: Option<Decimal>,
}

/// The single-instrument matching engine: order book, position ledger, and
/// trader accounts behind one exclusive lock, per the concurrency model.
pub struct MatchingEngine {
    instrument: String,
    state: Mutex<EngineState>,
    store: Arc<dyn PersistenceStore>,
    hub: Arc<EventHub>,
    insurance_fund: Arc<InsuranceFund>,
    tiers: MaintenanceMargin,
    max_leverage: u32,
    min_order_size: Decimal,
    starting_mark_price: Decimal,
    starting_trader_balance: Decimal,
    recent_trades_capacity: usize,
}

impl MatchingEngine {
    /// Build an engine for `config.instrument`, replaying prior state from
    /// `store` (§4.3.6): traders, positions, the recent-trades ring, recent
    /// liquidations, then resting orders in their original `created_at`
    /// order so time priority survives a restart.
    #[instrument(skip(config, store, hub, insurance_fund), fields(instrument = %config.instrument))]
    pub fn new(
        config: &KernelConfig,
        store: Arc<dyn PersistenceStore>,
        hub: Arc<EventHub>,
        insurance_fund: Arc<InsuranceFund>,
    ) -> KernelResult<Self> {
        let traders: HashMap<Uuid, Trader> = store
            .load_traders()?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        let positions: HashMap<Uuid, Position> = store
            .load_positions()?
            .into_iter()
            .map(|p| (p.trader_id, p))
            .collect();

        let mut recent_trades: VecDeque<Trade> =
            store.recent_trades(config.recent_trades_capacity)?.into();
        let mut recent_liquidations: VecDeque<Liquidation> =
            store.recent_liquidations(config.recent_trades_capacity)?.into();
        // Both stores return newest-first already; guard against a backing
        // implementation that doesn't and re-sort defensively.
        recent_trades.make_contiguous().sort_by_key(|t| std::cmp::Reverse(t.timestamp));
        recent_liquidations
            .make_contiguous()
            .sort_by_key(|l| std::cmp::Reverse(l.timestamp));

        let last_trade_price = recent_trades.front().map(|t| t.price);

        if let Some((balance, total_in, total_out)) = store.load_insurance_fund_balance()? {
            insurance_fund.restore(balance, total_in, total_out);
        }

        let mut resting_orders = store.load_resting_orders()?;
        resting_orders.sort_by_key(|o| o.created_at);
        let mut book = OrderBook::new();
        for order in resting_orders {
            book.add_resting(order);
        }

        info!(
            traders = traders.len(),
            positions = positions.len(),
            resting_orders = book.order_count(),
            trades = recent_trades.len(),
            insurance_fund_balance = %insurance_fund.snapshot().balance,
            "recovered engine state from persistence"
        );

        Ok(Self {
            instrument: config.instrument.clone(),
            state: Mutex::new(EngineState {
                book,
                traders,
                positions,
                recent_trades,
                recent_liquidations,
                last_trade_price,
            }),
            store,
            hub,
            insurance_fund,
            tiers: config.maintenance_margin.into(),
            max_leverage: config.max_leverage,
            min_order_size: config.min_order_size,
            starting_mark_price: config.starting_mark_price,
            starting_trader_balance: config.starting_trader_balance,
            recent_trades_capacity: config.recent_trades_capacity,
        })
    }

    /// The instrument this engine instance serves.
    #[must_use]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Register a trader idempotently: a repeated call with the same
    /// `username` returns the existing account rather than creating a
    /// second one (the persisted layout enforces `username` uniqueness).
    pub fn register_trader(
        &self,
        username: impl Into<String>,
        trader_type: TraderType,
    ) -> KernelResult<Trader> {
        let username = username.into();
        let mut state = self.state.lock();
        if let Some(existing) = state.traders.values().find(|t| t.username == username) {
            return Ok(existing.clone());
        }
        let trader = Trader::new(
            Uuid::new_v4(),
            username,
            trader_type,
            self.starting_trader_balance,
            Utc::now(),
        );
        self.store.put_trader(&trader)?;
        state.traders.insert(trader.id, trader.clone());
        info!(trader_id = %trader.id, "registered trader");
        Ok(trader)
    }

    fn validate_order(&self, order: &Order, traders: &HashMap<Uuid, Trader>) -> KernelResult<()> {
        if !traders.contains_key(&order.trader_id) {
            return Err(KernelError::UnknownTrader(order.trader_id));
        }
        if order.size < self.min_order_size {
            return Err(KernelError::InvalidOrder(format!(
                "size {} is below the minimum order size {}",
                order.size, self.min_order_size
            )));
        }
        if order.leverage == 0 || order.leverage > self.max_leverage {
            return Err(KernelError::InvalidOrder(format!(
                "leverage {} is out of range [1, {}]",
                order.leverage, self.max_leverage
            )));
        }
        if order.order_type == OrderType::Limit && order.price <= Decimal::ZERO {
            return Err(KernelError::InvalidOrder(
                "limit order price must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Submit a new order: validate, match against the book, mutate
    /// positions, persist, and emit events. See §4.3.1-§4.3.3.
    #[instrument(skip(self, order), fields(instrument = %self.instrument, trader_id = %order.trader_id))]
    pub fn submit(&self, mut order: Order) -> KernelResult<(Order, Vec<Trade>)> {
        let now = Utc::now();
        order.id = Uuid::new_v4();
        order.status = OrderStatus::Pending;
        order.filled_size = Decimal::ZERO;
        order.created_at = now;
        order.updated_at = now;

        let mut state = self.state.lock();
        self.validate_order(&order, &state.traders)?;

        let limit_price = match order.order_type {
            OrderType::Limit => Some(order.price),
            OrderType::Market => None,
        };
        let candidates = state.book.crossable_order_ids(order.side, limit_price);
        let had_candidates = !candidates.is_empty();

        let mut trades = Vec::new();
        for resting_id in candidates {
            if order.remaining_size() <= Decimal::ZERO {
                break;
            }
            let Some(resting) = state.book.get(resting_id) else {
                continue;
            };
            if resting.trader_id == order.trader_id {
                trace!(order_id = %resting_id, "skipping self-trade candidate");
                continue;
            }
            let fill_size = order.remaining_size().min(resting.remaining_size());
            let trade = self.execute_fill(&mut state, &mut order, resting_id, fill_size, now)?;
            trades.push(trade);
        }

        if order.order_type == OrderType::Market && trades.is_empty() && had_candidates {
            // Every opposing order at a crossable price belonged to this
            // trader: nothing was mutated, so the error can simply be
            // returned (§7 SelfTradeOnly, no state change on this path).
            return Err(KernelError::SelfTradeOnly);
        }

        match order.order_type {
            OrderType::Market => {
                if order.remaining_size() > Decimal::ZERO {
                    order.status = OrderStatus::Cancelled;
                    order.updated_at = now;
                }
            }
            OrderType::Limit => {
                if order.remaining_size() > Decimal::ZERO {
                    state.book.add_resting(order.clone());
                }
            }
        }

        self.store.put_order(&order)?;
        self.hub.broadcast(HubEvent::Order(order.clone()));
        debug!(
            order_id = %order.id,
            trades = trades.len(),
            status = ?order.status,
            "order submitted"
        );

        Ok((order, trades))
    }

    /// Execute one fill between the aggressor `order` and the resting order
    /// `resting_id`, per §4.3.3: update both positions, record the trade,
    /// persist every touched record, and emit the trade/order events for
    /// the resting side.
    fn execute_fill(
        &self,
        state: &mut EngineState,
        order: &mut Order,
        resting_id: Uuid,
        fill_size: Decimal,
        now: DateTime<Utc>,
    ) -> KernelResult<Trade> {
        let price = state
            .book
            .get(resting_id)
            .map(|o| o.price)
            .ok_or(KernelError::NotFound(resting_id))?;

        order.apply_fill(fill_size, now);
        let resting = state.book.fill_order(resting_id, fill_size, now)
            .map_err(|_| KernelError::NotFound(resting_id))?;

        let (buyer_order_id, buyer_trader_id, buyer_leverage, seller_order_id, seller_trader_id, seller_leverage) =
            match order.side {
                Side::Buy => (
                    order.id,
                    order.trader_id,
                    order.leverage,
                    resting.id,
                    resting.trader_id,
                    resting.leverage,
                ),
                Side::Sell => (
                    resting.id,
                    resting.trader_id,
                    resting.leverage,
                    order.id,
                    order.trader_id,
                    order.leverage,
                ),
            };

        let buyer_existing = state.positions.get(&buyer_trader_id).cloned();
        let (buyer_pos, buyer_effect, buyer_realized, buyer_freed_margin) = Position::apply_fill(
            buyer_existing.as_ref(),
            buyer_trader_id,
            &self.instrument,
            fill_size,
            price,
            buyer_leverage,
            &self.tiers,
            now,
        );
        let seller_existing = state.positions.get(&seller_trader_id).cloned();
        let (seller_pos, seller_effect, seller_realized, seller_freed_margin) = Position::apply_fill(
            seller_existing.as_ref(),
            seller_trader_id,
            &self.instrument,
            -fill_size,
            price,
            seller_leverage,
            &self.tiers,
            now,
        );

        let buyer_new_position = buyer_pos.as_ref().map_or(Decimal::ZERO, |p| p.size);
        let seller_new_position = seller_pos.as_ref().map_or(Decimal::ZERO, |p| p.size);

        self.apply_position_update(state, buyer_trader_id, buyer_pos)?;
        self.apply_position_update(state, seller_trader_id, seller_pos)?;

        self.settle_trader(state, buyer_trader_id, buyer_leverage, buyer_realized, buyer_freed_margin)?;
        self.settle_trader(state, seller_trader_id, seller_leverage, seller_realized, seller_freed_margin)?;

        let trade = Trade {
            id: Uuid::new_v4(),
            price,
            size: fill_size,
            timestamp: now,
            buyer_id: buyer_trader_id,
            seller_id: seller_trader_id,
            buyer_order_id,
            seller_order_id,
            buyer_leverage,
            seller_leverage,
            buyer_effect,
            seller_effect,
            buyer_new_position,
            seller_new_position,
            aggressor_side: order.side,
        };

        self.store.append_trade(&trade)?;
        state.recent_trades.push_front(trade.clone());
        if state.recent_trades.len() > self.recent_trades_capacity {
            state.recent_trades.pop_back();
        }
        state.last_trade_price = Some(price);

        let recent_trades: Vec<Trade> = state.recent_trades.iter().cloned().collect();
        let positions: Vec<Position> = state.positions.values().cloned().collect();
        let stats = MarketStats::compute(
            now,
            &recent_trades,
            &positions,
            self.insurance_fund.snapshot().balance,
            price,
        );
        self.store.put_market_stats(&stats)?;

        self.store.put_order(&resting)?;
        self.hub.broadcast(HubEvent::Trade(trade.clone()));
        self.hub.broadcast(HubEvent::Order(resting));

        Ok(trade)
    }

    fn apply_position_update(
        &self,
        state: &mut EngineState,
        trader_id: Uuid,
        pos: Option<Position>,
    ) -> KernelResult<()> {
        match pos {
            Some(p) => {
                self.store.put_position(&p)?;
                self.hub.broadcast(HubEvent::Position(p.clone()));
                state.positions.insert(trader_id, p);
            }
            None => {
                self.store.delete_position(trader_id, &self.instrument)?;
                state.positions.remove(&trader_id);
            }
        }
        Ok(())
    }

    fn settle_trader(
        &self,
        state: &mut EngineState,
        trader_id: Uuid,
        leverage: u32,
        realized_delta: Decimal,
        freed_margin: Decimal,
    ) -> KernelResult<()> {
        let trader = state
            .traders
            .get_mut(&trader_id)
            .ok_or(KernelError::UnknownTrader(trader_id))?;
        trader.record_fill(leverage);
        trader.record_realized_pnl(realized_delta);
        trader.credit_balance(freed_margin);
        self.store.put_trader(trader)?;
        Ok(())
    }

    /// Cancel a resting order: remove it from the book, mark it cancelled,
    /// persist, and emit an order-update event. Fails if the order is not
    /// currently resting (unknown, already terminal, or never submitted).
    pub fn cancel(&self, order_id: Uuid) -> KernelResult<Order> {
        let mut state = self.state.lock();
        let mut order = state
            .book
            .remove(order_id)
            .map_err(|_| KernelError::NotFound(order_id))?;
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        self.store.put_order(&order)?;
        self.hub.broadcast(HubEvent::Order(order.clone()));
        info!(order_id = %order_id, "order cancelled");
        Ok(order)
    }

    /// Top-`depth` levels of each side of the book, best first.
    #[must_use]
    pub fn get_order_book(&self, depth: usize) -> OrderBookSnapshot {
        let state = self.state.lock();
        OrderBookSnapshot {
            bids: state.book.depth_snapshot(Side::Buy, depth),
            asks: state.book.depth_snapshot(Side::Sell, depth),
        }
    }

    /// A trader's open position, or `None` if they are flat.
    #[must_use]
    pub fn get_position(&self, trader_id: Uuid) -> Option<Position> {
        self.state.lock().positions.get(&trader_id).cloned()
    }

    /// Every non-flat position.
    #[must_use]
    pub fn get_all_positions(&self) -> Vec<Position> {
        self.state.lock().positions.values().cloned().collect()
    }

    /// A trader account by id.
    #[must_use]
    pub fn get_trader(&self, trader_id: Uuid) -> Option<Trader> {
        self.state.lock().traders.get(&trader_id).cloned()
    }

    /// Every registered trader.
    #[must_use]
    pub fn get_all_traders(&self) -> Vec<Trader> {
        self.state.lock().traders.values().cloned().collect()
    }

    /// The most recent trades, newest first, capped at `limit`.
    #[must_use]
    pub fn get_recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.state
            .lock()
            .recent_trades
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Trades involving `trader_id`, newest first, capped at `limit`, drawn
    /// from the full persisted trade log rather than the in-memory ring (a
    /// trader's history can outlive `recent_trades_capacity`).
    pub fn get_trader_trades(&self, trader_id: Uuid, limit: usize) -> KernelResult<Vec<Trade>> {
        Ok(self.store.trades_for_trader(trader_id, limit)?)
    }

    /// The most recent liquidations, newest first, capped at `limit`.
    #[must_use]
    pub fn get_recent_liquidations(&self, limit: usize) -> Vec<Liquidation> {
        self.state
            .lock()
            .recent_liquidations
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Aggregate open interest across every non-flat position.
    #[must_use]
    pub fn get_open_interest(&self) -> OpenInterest {
        let state = self.state.lock();
        let mut total_oi = Decimal::ZERO;
        let mut long_positions = 0;
        let mut short_positions = 0;
        for pos in state.positions.values() {
            total_oi += pos.size.abs();
            if pos.is_long() {
                long_positions += 1;
            } else {
                short_positions += 1;
            }
        }
        OpenInterest {
            total_oi,
            long_positions,
            short_positions,
        }
    }

    /// The current mark price: the most recent trade price, or the
    /// configured starting price before any trade has occurred (§4.3.5).
    #[must_use]
    pub fn get_mark_price(&self) -> Decimal {
        self.state
            .lock()
            .last_trade_price
            .unwrap_or(self.starting_mark_price)
    }

    /// Headline market statistics (§4.7).
    #[must_use]
    pub fn get_market_stats(&self) -> MarketStats {
        let state = self.state.lock();
        let trades: Vec<Trade> = state.recent_trades.iter().cloned().collect();
        let positions: Vec<Position> = state.positions.values().cloned().collect();
        MarketStats::compute(
            Utc::now(),
            &trades,
            &positions,
            self.insurance_fund.snapshot().balance,
            self.starting_mark_price,
        )
    }

    /// The most recent `limit` candles of `interval` width, built from the
    /// in-memory recent-trades ring.
    #[must_use]
    pub fn get_candles(&self, interval: CandleInterval, limit: usize) -> Vec<Candle> {
        let trades: Vec<Trade> = self.state.lock().recent_trades.iter().cloned().collect();
        let mut candles = bucket_trades(&trades, interval);
        candles.sort_by_key(|c| c.open_time);
        if candles.len() > limit {
            candles.split_off(candles.len() - limit)
        } else {
            candles
        }
    }

    /// Candles of `interval` width covering `[start, end]`, built from the
    /// full persisted trade log rather than the in-memory ring (the range
    /// may exceed the ring's capacity).
    pub fn get_historical_candles(
        &self,
        interval: CandleInterval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> KernelResult<Vec<Candle>> {
        let trades = self.store.trades_between(start, end)?;
        let mut candles = bucket_trades(&trades, interval);
        candles.sort_by_key(|c| c.open_time);
        if candles.len() > limit {
            Ok(candles.split_off(candles.len() - limit))
        } else {
            Ok(candles)
        }
    }

    /// Scan every non-flat position against the current mark price and
    /// force-close any that have crossed their liquidation threshold
    /// (§4.4). Positions are visited in a deterministic order (ascending
    /// trader id) so repeated scans over identical state are reproducible.
    #[instrument(skip(self), fields(instrument = %self.instrument))]
    pub fn liquidate_triggered(&self) -> Vec<Liquidation> {
        let mut state = self.state.lock();
        let mark_price = state.last_trade_price.unwrap_or(self.starting_mark_price);
        if mark_price <= Decimal::ZERO {
            return Vec::new();
        }

        let mut triggered: Vec<Uuid> = state
            .positions
            .iter()
            .filter(|(_, pos)| pos.is_liquidatable(mark_price))
            .map(|(id, _)| *id)
            .collect();
        triggered.sort();

        let now = Utc::now();
        let mut liquidations = Vec::new();
        for trader_id in triggered {
            match self.force_close(&mut state, trader_id, mark_price, now) {
                Ok(liq) => liquidations.push(liq),
                Err(e) => warn!(trader_id = %trader_id, error = %e, "forced close failed"),
            }
        }
        if !liquidations.is_empty() {
            info!(count = liquidations.len(), %mark_price, "liquidation scan closed positions");
        }
        liquidations
    }

    /// Force-close `trader_id`'s position at `mark_price`, settling the
    /// insurance fund and crediting the trader's balance, per §4.4. Not a
    /// `Trade` — recorded only as a `Liquidation`, since it is settled
    /// against the insurance fund rather than a crossing order.
    fn force_close(
        &self,
        state: &mut EngineState,
        trader_id: Uuid,
        mark_price: Decimal,
        now: DateTime<Utc>,
    ) -> KernelResult<Liquidation> {
        let position = state
            .positions
            .remove(&trader_id)
            .ok_or(KernelError::NotFound(trader_id))?;

        let is_long = position.is_long();
        let loss = if is_long {
            (position.entry_price - mark_price) * position.size
        } else {
            (mark_price - position.entry_price) * position.size.abs()
        };
        let resolution = self.insurance_fund.resolve(loss, position.margin);
        if resolution.insurance_fund_hit {
            warn!(%trader_id, %loss, margin = %position.margin, "insurance fund covered a liquidation shortfall");
        }

        let pnl = -loss;
        let trader = state
            .traders
            .get_mut(&trader_id)
            .ok_or(KernelError::UnknownTrader(trader_id))?;
        trader.record_realized_pnl(pnl);
        trader.credit_balance(position.margin + pnl);
        self.store.put_trader(trader)?;

        self.store.delete_position(trader_id, &self.instrument)?;

        let liquidation = Liquidation {
            id: Uuid::new_v4(),
            trader_id,
            side: if is_long { Side::Buy } else { Side::Sell },
            size: position.size.abs(),
            entry_price: position.entry_price,
            liquidation_price: position.liquidation_price,
            mark_price,
            leverage: position.leverage,
            loss,
            insurance_fund_hit: resolution.insurance_fund_hit,
            timestamp: now,
        };
        self.store.append_liquidation(&liquidation)?;
        let fund = self.insurance_fund.snapshot();
        self.store
            .put_insurance_fund_balance(fund.balance, fund.total_in, fund.total_out)?;

        let recent_trades: Vec<Trade> = state.recent_trades.iter().cloned().collect();
        let positions: Vec<Position> = state.positions.values().cloned().collect();
        let stats = MarketStats::compute(now, &recent_trades, &positions, fund.balance, mark_price);
        self.store.put_market_stats(&stats)?;

        state.recent_liquidations.push_front(liquidation.clone());
        if state.recent_liquidations.len() > self.recent_trades_capacity {
            state.recent_liquidations.pop_back();
        }

        self.hub.broadcast(HubEvent::Liquidation(liquidation.clone()));
        Ok(liquidation)
    }
}
