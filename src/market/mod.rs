//! Derived, read-only views over the trade log and open positions:
//! headline stats and OHLCV candles.

pub mod candles;
pub mod stats;

pub use candles::{Candle, CandleInterval};
pub use stats::MarketStats;
