//! Domain records: the types every other component reads or writes.
//!
//! These are plain data types with no locking and no I/O of their own —
//! concurrency and durability are the matching engine's and the
//! persistence adapter's concerns respectively.

pub mod insurance_fund;
pub mod liquidation;
pub mod order;
pub mod position;
pub mod trade;
pub mod trader;

pub use insurance_fund::{InsuranceFund, InsuranceFundSnapshot};
pub use liquidation::Liquidation;
pub use order::{Order, OrderStatus, OrderType, Side};
pub use position::{Position, PositionEffect};
pub use trade::Trade;
pub use trader::{Trader, TraderType};
