//! OHLCV candle bucketing.

use crate::domain::Trade;
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A supported candle width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleInterval {
    /// 1 minute.
    OneMinute,
    /// 5 minutes.
    FiveMinutes,
    /// 15 minutes.
    FifteenMinutes,
    /// 1 hour.
    OneHour,
    /// 4 hours.
    FourHours,
    /// 1 day, aligned to 00:00 UTC.
    OneDay,
}

impl CandleInterval {
    /// The wall-clock width of one bucket.
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            CandleInterval::OneMinute => Duration::minutes(1),
            CandleInterval::FiveMinutes => Duration::minutes(5),
            CandleInterval::FifteenMinutes => Duration::minutes(15),
            CandleInterval::OneHour => Duration::hours(1),
            CandleInterval::FourHours => Duration::hours(4),
            CandleInterval::OneDay => Duration::days(1),
        }
    }

    /// Truncate `ts` down to the start of the bucket it falls in.
    #[must_use]
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = self.duration().num_seconds();
        if self == CandleInterval::OneDay {
            return Utc
                .with_ymd_and_hms(ts.year(), ts.month(), ts.day(), 0, 0, 0)
                .single()
                .expect("valid calendar date");
        }
        let epoch_secs = ts.timestamp();
        let bucket_start = epoch_secs - epoch_secs.rem_euclid(secs);
        Utc.timestamp_opt(bucket_start, 0)
            .single()
            .expect("bucket boundary is a valid instant")
    }
}

use chrono::Datelike;

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    /// Start of the bucket (the truncation boundary).
    pub open_time: DateTime<Utc>,
    /// `open_time + interval`.
    pub close_time: DateTime<Utc>,
    /// Price of the earliest trade in the bucket.
    pub open: Decimal,
    /// Highest trade price in the bucket.
    pub high: Decimal,
    /// Lowest trade price in the bucket.
    pub low: Decimal,
    /// Price of the latest trade in the bucket.
    pub close: Decimal,
    /// Sum of trade sizes in the bucket.
    pub volume: Decimal,
    /// Number of trades in the bucket.
    pub trade_count: u64,
}

/// Bucket `trades` into candles of the given `interval`, sorted
/// chronologically by `open_time`. `open` is explicitly the price of the
/// minimum-timestamp trade in each bucket (not an iteration-order
/// artifact), and `close` is the price of the maximum-timestamp trade.
#[must_use]
pub fn bucket_trades(trades: &[Trade], interval: CandleInterval) -> Vec<Candle> {
    let mut buckets: std::collections::BTreeMap<DateTime<Utc>, Vec<&Trade>> =
        std::collections::BTreeMap::new();
    for trade in trades {
        buckets
            .entry(interval.truncate(trade.timestamp))
            .or_default()
            .push(trade);
    }

    buckets
        .into_iter()
        .map(|(open_time, mut bucket)| {
            bucket.sort_by_key(|t| t.timestamp);
            let first = bucket.first().expect("bucket is never empty");
            let last = bucket.last().expect("bucket is never empty");
            let high = bucket
                .iter()
                .map(|t| t.price)
                .max()
                .expect("bucket is never empty");
            let low = bucket
                .iter()
                .map(|t| t.price)
                .min()
                .expect("bucket is never empty");
            let volume = bucket.iter().map(|t| t.size).sum();
            Candle {
                open_time,
                close_time: open_time + interval.duration(),
                open: first.price,
                high,
                low,
                close: last.price,
                volume,
                trade_count: bucket.len() as u64,
            }
        })
        .collect()
}
