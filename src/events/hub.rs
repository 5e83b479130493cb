//! The subscriber registry and its fan-out paths.

use crate::domain::{Liquidation, Order, Position, Trade};
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Bounded capacity of each subscriber's outbound channel. A subscriber
/// that cannot keep up is dropped rather than allowed to stall the
/// dispatcher (see [`EventHub::broadcast`]).
pub const SUBSCRIBER_BUFFER: usize = 256;

/// One fan-out message. Every variant carries enough to build the wire
/// envelope (`type`, optional `channel`, `data`, `timestamp_ms`); this
/// crate stops at the typed event and leaves envelope serialization to
/// the embedding transport layer.
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A new execution.
    Trade(Trade),
    /// An order's state changed (new rest, partial fill, fill, cancel).
    Order(Order),
    /// A position was opened, adjusted, reduced, or closed.
    Position(Position),
    /// A position was force-closed.
    Liquidation(Liquidation),
    /// A depth snapshot for `orderbook:<instrument>`.
    OrderBook {
        /// The channel name this snapshot is published under.
        channel: String,
        /// Top-of-book levels, `(price, size)`, best first, per side.
        bids: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>,
        /// Top-of-book levels, `(price, size)`, best first, per side.
        asks: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>,
    },
    /// A liveness probe, sent to every subscriber regardless of channel.
    Ping,
}

impl HubEvent {
    /// The wire `type` tag for this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            HubEvent::Trade(_) => "trade",
            HubEvent::Order(_) => "order",
            HubEvent::Position(_) => "position",
            HubEvent::Liquidation(_) => "liquidation",
            HubEvent::OrderBook { .. } => "orderbook",
            HubEvent::Ping => "ping",
        }
    }

    /// The channel this event is scoped to, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            HubEvent::OrderBook { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

struct Subscriber {
    sender: mpsc::Sender<HubEvent>,
    channels: HashSet<String>,
}

/// The subscriber registry. Cheap to clone (an `Arc`-free `DashMap` is
/// itself shareable across threads via a shared reference), so a single
/// instance is constructed once and handed to both the matching engine
/// and the liquidation monitor.
#[derive(Default)]
pub struct EventHub {
    subscribers: DashMap<Uuid, Subscriber>,
}

impl EventHub {
    /// An empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return the receiving half of its
    /// bounded channel; the caller (the transport layer) drains it and
    /// forwards events to the wire.
    pub fn register(&self) -> (Uuid, mpsc::Receiver<HubEvent>) {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.insert(
            id,
            Subscriber {
                sender,
                channels: HashSet::new(),
            },
        );
        (id, receiver)
    }

    /// Remove a subscriber; its receiver will observe the channel close.
    pub fn unregister(&self, subscriber_id: Uuid) {
        self.subscribers.remove(&subscriber_id);
    }

    /// Add `channel` to a subscriber's per-channel interest set.
    pub fn subscribe(&self, subscriber_id: Uuid, channel: impl Into<String>) {
        if let Some(mut sub) = self.subscribers.get_mut(&subscriber_id) {
            sub.channels.insert(channel.into());
        }
    }

    /// Remove `channel` from a subscriber's per-channel interest set.
    pub fn unsubscribe(&self, subscriber_id: Uuid, channel: &str) {
        if let Some(mut sub) = self.subscribers.get_mut(&subscriber_id) {
            sub.channels.remove(channel);
        }
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every subscriber, irrespective of channel
    /// interest. Used for `trade`, `order`, `position`, and `liquidation`
    /// events, which are not channel-scoped.
    pub fn broadcast(&self, event: HubEvent) {
        self.dispatch(|_sub| true, event);
    }

    /// Deliver `event` only to subscribers who have `subscribe`d to
    /// `channel`. Used for per-instrument order-book snapshots.
    pub fn broadcast_channel(&self, channel: &str, event: HubEvent) {
        self.dispatch(|sub| sub.channels.contains(channel), event);
    }

    /// Send a [`HubEvent::Ping`] to every subscriber, through the same
    /// bounded channel their real events flow through — a subscriber that
    /// can't absorb even a ping is as stalled as one that can't absorb a
    /// trade, and is dropped the same way.
    pub fn ping_all(&self) {
        self.broadcast(HubEvent::Ping);
    }

    fn dispatch(&self, interested: impl Fn(&Subscriber) -> bool, event: HubEvent) {
        let mut dead = Vec::new();
        for entry in &self.subscribers {
            if !interested(entry.value()) {
                continue;
            }
            if let Err(mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_)) =
                entry.value().sender.try_send(event.clone())
            {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            warn!(subscriber_id = %id, "dropping subscriber: outbound buffer full or closed");
            self.subscribers.remove(&id);
        }
    }
}
