//! Event fan-out: the matching engine and liquidation monitor publish
//! here; concurrent subscribers (the transport layer, outside this crate)
//! drain their own bounded channel.

pub mod hub;

pub use hub::{EventHub, HubEvent};
