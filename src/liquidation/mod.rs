//! Leverage tiers and the periodic forced-close monitor.

pub mod monitor;
pub mod tiers;

pub use monitor::LiquidationMonitor;
pub use tiers::MaintenanceMargin;
