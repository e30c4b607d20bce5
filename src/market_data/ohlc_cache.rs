// =============================================================================
// OhlcCache — per-pair ring buffer of committed candles
// =============================================================================
//
// The exchange's OHLC endpoint always includes a final candle for the bucket
// that is still open; its values keep changing until the bucket elapses.
// Storing it would poison every indicator, so the merge protocol is:
//
//   1. When a response carries two or more rows, drop the last row.
//   2. Append candles strictly newer than the stored tail.
//   3. A candle with the same timestamp as the tail replaces the tail (the
//      exchange re-sends the bucket once finalized).
//   4. Anything older is ignored, so re-feeding a response is a no-op.
//
// The `since` cursor is the exchange-returned watermark and only ever moves
// forward. The ring is capped at `maxlen` committed candles per pair.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use tracing::debug;

use crate::market_data::{Candle, OhlcSeries};

struct PairSeries {
    candles: VecDeque<Candle>,
    since: Option<i64>,
}

/// Thread-safe per-pair cache of committed candles.
pub struct OhlcCache {
    pairs: RwLock<HashMap<String, PairSeries>>,
    maxlen: usize,
}

impl OhlcCache {
    /// Create a cache retaining at most `maxlen` committed candles per pair.
    pub fn new(maxlen: usize) -> Self {
        Self {
            pairs: RwLock::new(HashMap::new()),
            maxlen,
        }
    }

    /// Merge one parsed OHLC response for `pair` into the ring.
    ///
    /// `candles` are the parsed rows in exchange order (oldest first, the
    /// in-progress bucket last); `last` is the exchange watermark.
    pub fn apply(&self, pair: &str, mut candles: Vec<Candle>, last: Option<i64>) {
        // Drop the exchange's not-yet-committed tail candle when present.
        if candles.len() >= 2 {
            candles.pop();
        }

        let mut pairs = self.pairs.write();
        let series = pairs.entry(pair.to_string()).or_insert_with(|| PairSeries {
            candles: VecDeque::with_capacity(self.maxlen),
            since: None,
        });

        let mut appended = 0usize;
        for candle in candles {
            match series.candles.back().map(|c| c.time) {
                None => {
                    series.candles.push_back(candle);
                    appended += 1;
                }
                Some(tail_time) if candle.time > tail_time => {
                    series.candles.push_back(candle);
                    appended += 1;
                }
                Some(tail_time) if candle.time == tail_time => {
                    // Newer version of the same bucket replaces the tail.
                    series.candles.pop_back();
                    series.candles.push_back(candle);
                }
                Some(_) => {} // Older than the tail — already merged.
            }
        }

        while series.candles.len() > self.maxlen {
            series.candles.pop_front();
        }

        // Watermark is monotone non-decreasing.
        if let Some(watermark) = last {
            series.since = Some(series.since.map_or(watermark, |s| s.max(watermark)));
        }

        if appended > 0 {
            debug!(pair, appended, total = series.candles.len(), "ohlc cache updated");
        }
    }

    /// The `since` watermark to send with the next OHLC request for `pair`.
    pub fn since(&self, pair: &str) -> Option<i64> {
        self.pairs.read().get(pair).and_then(|s| s.since)
    }

    /// Column view over the committed candles, or `None` when empty.
    pub fn get_series(&self, pair: &str) -> Option<OhlcSeries> {
        let pairs = self.pairs.read();
        let series = pairs.get(pair)?;
        let latest = *series.candles.back()?;

        Some(OhlcSeries {
            highs: series.candles.iter().map(|c| c.high).collect(),
            lows: series.candles.iter().map(|c| c.low).collect(),
            closes: series.candles.iter().map(|c| c.close).collect(),
            volumes: series.candles.iter().map(|c| c.volume).collect(),
            latest,
        })
    }

    /// Number of committed candles stored for `pair`.
    pub fn len(&self, pair: &str) -> usize {
        self.pairs.read().get(pair).map_or(0, |s| s.candles.len())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            vwap: close,
            volume: 10.0,
            count: 5,
        }
    }

    #[test]
    fn drops_in_progress_tail() {
        let cache = OhlcCache::new(200);
        cache.apply(
            "XBTUSD",
            vec![candle(100, 1.0), candle(200, 2.0), candle(300, 3.0)],
            Some(300),
        );

        let series = cache.get_series("XBTUSD").unwrap();
        assert_eq!(series.closes, vec![1.0, 2.0]);
        assert_eq!(series.latest.time, 200);
        assert_eq!(cache.since("XBTUSD"), Some(300));
    }

    #[test]
    fn merges_by_timestamp_replacing_tail() {
        let cache = OhlcCache::new(200);
        cache.apply(
            "XBTUSD",
            vec![candle(100, 1.0), candle(200, 2.0), candle(300, 3.0)],
            Some(300),
        );
        // Finalized version of bucket 200 plus two newer rows; 500 is still
        // in progress and must be dropped.
        cache.apply(
            "XBTUSD",
            vec![candle(200, 2.5), candle(400, 4.0), candle(500, 5.0)],
            Some(500),
        );

        let series = cache.get_series("XBTUSD").unwrap();
        assert_eq!(series.closes, vec![1.0, 2.5, 4.0]);
        assert_eq!(series.latest.time, 400);
        assert_eq!(cache.since("XBTUSD"), Some(500));
    }

    #[test]
    fn refeeding_same_response_is_idempotent() {
        let cache = OhlcCache::new(200);
        let rows = vec![candle(100, 1.0), candle(200, 2.0), candle(300, 3.0)];
        cache.apply("XBTUSD", rows.clone(), Some(300));
        let before = cache.get_series("XBTUSD").unwrap();

        cache.apply("XBTUSD", rows, Some(300));
        let after = cache.get_series("XBTUSD").unwrap();

        assert_eq!(before.closes, after.closes);
        assert_eq!(before.latest, after.latest);
        assert_eq!(cache.since("XBTUSD"), Some(300));
    }

    #[test]
    fn never_stores_duplicate_timestamps() {
        let cache = OhlcCache::new(200);
        cache.apply(
            "XBTUSD",
            vec![candle(100, 1.0), candle(100, 1.5), candle(200, 2.0), candle(300, 3.0)],
            Some(300),
        );

        // The duplicate bucket 100 replaced in place rather than stacking.
        let series = cache.get_series("XBTUSD").unwrap();
        assert_eq!(series.closes, vec![1.5, 2.0]);
        assert_eq!(cache.len("XBTUSD"), 2);
    }

    #[test]
    fn ring_is_bounded() {
        let cache = OhlcCache::new(3);
        let rows: Vec<Candle> = (1..=10).map(|i| candle(i * 60, i as f64)).collect();
        cache.apply("XBTUSD", rows, Some(600));

        // 10 rows, last dropped, trimmed to 3.
        assert_eq!(cache.len("XBTUSD"), 3);
        let series = cache.get_series("XBTUSD").unwrap();
        assert_eq!(series.closes, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn single_row_is_kept_and_replaced_on_refresh() {
        // A lone row is not dropped (there is nothing to drop it against);
        // the same-timestamp rule swaps in the finalized version later.
        let cache = OhlcCache::new(200);
        cache.apply("XBTUSD", vec![candle(100, 1.0)], Some(100));
        assert_eq!(cache.len("XBTUSD"), 1);

        cache.apply("XBTUSD", vec![candle(100, 1.2), candle(200, 2.0)], Some(200));
        let series = cache.get_series("XBTUSD").unwrap();
        assert_eq!(series.closes, vec![1.2]);
        assert_eq!(cache.since("XBTUSD"), Some(200));
    }

    #[test]
    fn watermark_never_regresses() {
        let cache = OhlcCache::new(200);
        cache.apply("XBTUSD", vec![candle(100, 1.0), candle(200, 2.0)], Some(200));
        cache.apply("XBTUSD", vec![candle(100, 1.0), candle(200, 2.0)], Some(150));
        assert_eq!(cache.since("XBTUSD"), Some(200));
    }

    #[test]
    fn empty_pair_reads_none() {
        let cache = OhlcCache::new(200);
        assert!(cache.get_series("ETHUSD").is_none());
        assert_eq!(cache.len("ETHUSD"), 0);
        assert_eq!(cache.since("ETHUSD"), None);
    }
}
