//! A single price level: a FIFO queue of resting order ids plus the
//! aggregate size they represent.

use rust_decimal::Decimal;
use std::collections::VecDeque;
use uuid::Uuid;

/// All resting orders at one exact price, oldest first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// The price this level sits at.
    pub price: Decimal,
    /// Order ids in arrival order; the front of the queue is matched first.
    queue: VecDeque<Uuid>,
    /// Sum of the remaining size of every order currently queued here.
    total_size: Decimal,
}

impl PriceLevel {
    /// An empty level at `price`.
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            queue: VecDeque::new(),
            total_size: Decimal::ZERO,
        }
    }

    /// Append an order id to the back of the queue, adding `size` to the
    /// level's total.
    pub fn push(&mut self, order_id: Uuid, size: Decimal) {
        self.queue.push_back(order_id);
        self.total_size += size;
    }

    /// The order id at the front of the queue, without removing it.
    #[must_use]
    pub fn front(&self) -> Option<Uuid> {
        self.queue.front().copied()
    }

    /// Remove `order_id` from the queue wherever it sits (cancellation can
    /// target any position, not just the front) and subtract `size` from
    /// the level's total.
    pub fn remove(&mut self, order_id: Uuid, size: Decimal) {
        if let Some(pos) = self.queue.iter().position(|id| *id == order_id) {
            self.queue.remove(pos);
            self.total_size -= size;
        }
    }

    /// Record a partial or full fill of `order_id`, wherever it sits in the
    /// queue. A partial fill leaves the order in place — its queue position
    /// is its time priority, which a fill never changes. A full fill
    /// removes it. Used by self-trade-prevention matching, which may skip
    /// over (not remove) orders ahead of the one actually filled.
    pub fn fill_at(&mut self, order_id: Uuid, filled: Decimal, fully_filled: bool) {
        self.total_size -= filled;
        if fully_filled {
            if let Some(pos) = self.queue.iter().position(|id| *id == order_id) {
                self.queue.remove(pos);
            }
        }
    }

    /// Total resting size at this level.
    #[must_use]
    pub fn total_size(&self) -> Decimal {
        self.total_size
    }

    /// Number of resting orders at this level.
    #[must_use]
    pub fn count(&self) -> usize {
        self.queue.len()
    }

    /// `true` once every order has been removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Order ids at this level, oldest first.
    pub fn order_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.queue.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn push_and_remove_track_total_size_and_order() {
        let mut level = PriceLevel::new(dec!(100));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        level.push(a, dec!(1));
        level.push(b, dec!(2));
        assert_eq!(level.total_size(), dec!(3));
        assert_eq!(level.front(), Some(a));

        level.remove(a, dec!(1));
        assert_eq!(level.total_size(), dec!(2));
        assert_eq!(level.front(), Some(b));
        assert_eq!(level.count(), 1);
    }

    #[test]
    fn fill_at_leaves_a_partial_fill_in_place() {
        let mut level = PriceLevel::new(dec!(100));
        let a = Uuid::new_v4();
        level.push(a, dec!(5));
        level.fill_at(a, dec!(2), false);
        assert_eq!(level.total_size(), dec!(3));
        assert_eq!(level.front(), Some(a));
    }

    #[test]
    fn fill_at_removes_a_fully_filled_order() {
        let mut level = PriceLevel::new(dec!(100));
        let a = Uuid::new_v4();
        level.push(a, dec!(5));
        level.fill_at(a, dec!(5), true);
        assert!(level.is_empty());
    }
}
