//! Per-instrument order book: price levels on both sides plus an index of
//! every resting order by id.

use crate::domain::order::{Order, Side};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::level::PriceLevel;

/// Errors raised by book-level operations. The matching engine maps these
/// onto [`crate::error::KernelError`] where a caller-visible failure is
/// warranted; most are programmer-error invariants that never fire once
/// the matching loop is correct.
#[derive(Debug, thiserror::Error)]
pub enum OrderBookError {
    /// Asked to remove/mutate an order id the book has no record of.
    #[error("order not resting in book: {0}")]
    OrderNotFound(Uuid),
}

/// The book for a single instrument: bids and asks keyed by price,
/// ascending, plus a flat index of every resting order for O(1)
/// cancel-by-id.
#[derive(Debug, Default)]
pub struct OrderBook {
    bids: BTreeMap<Decimal, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    resting: HashMap<Uuid, Order>,
}

impl OrderBook {
    /// An empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn levels(&self, side: Side) -> &BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Highest resting bid price, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    /// Lowest resting ask price, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// `true` when `side` has no resting liquidity at all.
    #[must_use]
    pub fn is_empty(&self, side: Side) -> bool {
        self.levels(side).is_empty()
    }

    /// Total resting size at an exact price on `side`.
    #[must_use]
    pub fn depth_at(&self, side: Side, price: Decimal) -> Decimal {
        self.levels(side)
            .get(&price)
            .map_or(Decimal::ZERO, PriceLevel::total_size)
    }

    /// Insert a resting order at the back of its price level's queue.
    pub fn add_resting(&mut self, order: Order) {
        let side = order.side;
        let price = order.price;
        let id = order.id;
        let remaining = order.remaining_size();
        self.levels_mut(side)
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push(id, remaining);
        self.resting.insert(id, order);
    }

    /// Look up a resting order by id.
    #[must_use]
    pub fn get(&self, order_id: Uuid) -> Option<&Order> {
        self.resting.get(&order_id)
    }

    /// Remove a resting order entirely (explicit cancel, or a fully filled
    /// order being retired by the matching loop).
    pub fn remove(&mut self, order_id: Uuid) -> Result<Order, OrderBookError> {
        let order = self
            .resting
            .remove(&order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        let remaining = order.remaining_size();
        let levels = self.levels_mut(order.side);
        if let Some(level) = levels.get_mut(&order.price) {
            level.remove(order_id, remaining);
            if level.is_empty() {
                levels.remove(&order.price);
            }
        }
        Ok(order)
    }

    /// The order currently at the front of `side`'s best price level, if
    /// the book has any liquidity on that side.
    #[must_use]
    pub fn best_resting(&self, side: Side) -> Option<&Order> {
        let price = match side {
            Side::Buy => self.best_bid(),
            Side::Sell => self.best_ask(),
        }?;
        let level = self.levels(side).get(&price)?;
        let id = level.front()?;
        self.resting.get(&id)
    }

    /// Order ids a new order on `aggressor_side` could cross against, in
    /// strict matching priority (best price first, FIFO within a level),
    /// optionally bounded by `limit_price` (ignored for a market order).
    /// Self-trade-prevention walks this list front-to-back, skipping any
    /// order that belongs to the aggressor rather than removing it, so the
    /// full candidate list is computed once up front rather than
    /// re-queried after every fill.
    #[must_use]
    pub fn crossable_order_ids(&self, aggressor_side: Side, limit_price: Option<Decimal>) -> Vec<Uuid> {
        let book_side = aggressor_side.opposite();
        let mut ids = Vec::new();
        match book_side {
            Side::Sell => {
                for (&price, level) in self.asks.iter() {
                    if let Some(limit) = limit_price {
                        if price > limit {
                            break;
                        }
                    }
                    ids.extend(level.order_ids());
                }
            }
            Side::Buy => {
                for (&price, level) in self.bids.iter().rev() {
                    if let Some(limit) = limit_price {
                        if price < limit {
                            break;
                        }
                    }
                    ids.extend(level.order_ids());
                }
            }
        }
        ids
    }

    /// Apply a fill of `fill_size` to the resting order `order_id`,
    /// wherever it sits in its level's queue, removing it from the book
    /// once fully filled. Does not require the order to be at the front —
    /// needed so self-trade skips can leave orders ahead of the match
    /// untouched.
    pub fn fill_order(
        &mut self,
        order_id: Uuid,
        fill_size: Decimal,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Order, OrderBookError> {
        let order = self
            .resting
            .get_mut(&order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        order.apply_fill(fill_size, now);
        let remaining = order.remaining_size();
        let price = order.price;
        let side = order.side;
        let snapshot = order.clone();
        let fully_filled = remaining <= Decimal::ZERO;

        let levels = self.levels_mut(side);
        if let Some(level) = levels.get_mut(&price) {
            level.fill_at(order_id, fill_size, fully_filled);
            if level.is_empty() {
                levels.remove(&price);
            }
        }
        if fully_filled {
            self.resting.remove(&order_id);
        }
        Ok(snapshot)
    }

    /// Number of resting orders across both sides.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.resting.len()
    }

    /// A point-in-time view of the book's depth, `(price, size)` pairs
    /// ordered best-first on each side.
    #[must_use]
    pub fn depth_snapshot(&self, side: Side, levels: usize) -> Vec<(Decimal, Decimal)> {
        match side {
            Side::Buy => self
                .bids
                .iter()
                .rev()
                .take(levels)
                .map(|(p, l)| (*p, l.total_size()))
                .collect(),
            Side::Sell => self
                .asks
                .iter()
                .take(levels)
                .map(|(p, l)| (*p, l.total_size()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(side: Side, price: Decimal, size: Decimal) -> Order {
        Order {
            id: Uuid::new_v4(),
            trader_id: Uuid::new_v4(),
            side,
            order_type: crate::domain::order::OrderType::Limit,
            price,
            size,
            filled_size: Decimal::ZERO,
            leverage: 1,
            status: crate::domain::order::OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn best_bid_and_ask_track_extremes() {
        let mut book = OrderBook::new();
        book.add_resting(order(Side::Buy, dec!(99), dec!(1)));
        book.add_resting(order(Side::Buy, dec!(101), dec!(1)));
        book.add_resting(order(Side::Sell, dec!(105), dec!(1)));
        book.add_resting(order(Side::Sell, dec!(103), dec!(1)));
        assert_eq!(book.best_bid(), Some(dec!(101)));
        assert_eq!(book.best_ask(), Some(dec!(103)));
    }

    #[test]
    fn fifo_within_a_level() {
        let mut book = OrderBook::new();
        let first = order(Side::Buy, dec!(100), dec!(1));
        let first_id = first.id;
        book.add_resting(first);
        book.add_resting(order(Side::Buy, dec!(100), dec!(1)));
        let front = book.best_resting(Side::Buy).unwrap();
        assert_eq!(front.id, first_id);
    }

    #[test]
    fn removing_the_last_order_at_a_level_drops_the_level() {
        let mut book = OrderBook::new();
        let o = order(Side::Buy, dec!(100), dec!(1));
        let id = o.id;
        book.add_resting(o);
        book.remove(id).unwrap();
        assert!(book.is_empty(Side::Buy));
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn fill_order_removes_a_fully_filled_order() {
        let mut book = OrderBook::new();
        let o = order(Side::Sell, dec!(100), dec!(1));
        let id = o.id;
        book.add_resting(o);
        let filled = book.fill_order(id, dec!(1), Utc::now()).unwrap();
        assert_eq!(filled.status, crate::domain::order::OrderStatus::Filled);
        assert!(book.is_empty(Side::Sell));
    }

    #[test]
    fn crossable_order_ids_respects_limit_price_and_priority() {
        let mut book = OrderBook::new();
        book.add_resting(order(Side::Sell, dec!(101), dec!(1)));
        book.add_resting(order(Side::Sell, dec!(100), dec!(1)));
        book.add_resting(order(Side::Sell, dec!(102), dec!(1)));
        let ids = book.crossable_order_ids(Side::Buy, Some(dec!(101)));
        let prices: Vec<Decimal> = ids.iter().map(|id| book.get(*id).unwrap().price).collect();
        assert_eq!(prices, vec![dec!(100), dec!(101)]);
    }

    #[test]
    fn fill_order_can_skip_over_a_non_front_order_without_disturbing_it() {
        let mut book = OrderBook::new();
        let first = order(Side::Sell, dec!(100), dec!(1));
        let first_id = first.id;
        let second = order(Side::Sell, dec!(100), dec!(1));
        let second_id = second.id;
        book.add_resting(first);
        book.add_resting(second);

        let filled = book.fill_order(second_id, dec!(1), Utc::now()).unwrap();
        assert_eq!(filled.id, second_id);
        assert_eq!(filled.status, crate::domain::order::OrderStatus::Filled);
        // The untouched front order is still resting, at its original spot.
        assert_eq!(book.best_resting(Side::Sell).unwrap().id, first_id);
        assert_eq!(book.depth_at(Side::Sell, dec!(100)), dec!(1));
    }
}
