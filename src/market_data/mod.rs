// =============================================================================
// Market Data Module
// =============================================================================

pub mod ohlc_cache;

pub use ohlc_cache::OhlcCache;

use serde::{Deserialize, Serialize};

/// A single committed OHLC candle as returned by the exchange.
///
/// `time` is the exchange-assigned bucket start in epoch seconds, aligned to
/// the configured interval. Candles are immutable once committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vwap: f64,
    pub volume: f64,
    pub count: u32,
}

/// Column view over a pair's committed candles, oldest first.
///
/// This is the shape strategies and the analyzer consume: parallel slices
/// plus the most recent committed candle.
#[derive(Debug, Clone)]
pub struct OhlcSeries {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
    pub latest: Candle,
}

impl OhlcSeries {
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}
