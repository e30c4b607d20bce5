// =============================================================================
// Breakout — range escapes confirmed by volume and volatility
// =============================================================================
//
// For volatile markets. Support/resistance levels are maintained from local
// extrema clustering; a close beyond a tracked level only becomes a signal
// when the move is confirmed by:
//
//   - a volume surge: last candle volume >= threshold x the 20-bar average
//   - elevated volatility: current ATR at or above its mean over the last
//     20 windows
//
// With retest confirmation enabled the first qualifying break only arms the
// strategy; the signal fires when price comes back within 2% of the broken
// level and holds.

use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::indicators::atr::calculate_atr;
use crate::indicators::levels::{detect_support_resistance, volume_surge};
use crate::market_data::OhlcSeries;
use crate::strategy::StrategyCore;
use crate::types::Signal;

/// Retest proximity band as a fraction of the broken level.
const RETEST_BAND: f64 = 0.02;

/// Windows considered by the ATR elevation check.
const ATR_LOOKBACK: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BreakDirection {
    Bullish,
    Bearish,
}

#[derive(Debug)]
pub struct Breakout {
    pub core: StrategyCore,

    atr_period: usize,
    volume_threshold: f64,
    lookback: usize,
    require_retest: bool,

    resistance: Option<f64>,
    support: Option<f64>,

    armed: Option<BreakDirection>,
}

impl Breakout {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            core: StrategyCore::default(),
            atr_period: config.atr_period,
            volume_threshold: config.volume_threshold,
            lookback: config.breakout_lookback,
            require_retest: config.require_retest,
            resistance: None,
            support: None,
            armed: None,
        }
    }

    pub fn analyze(&mut self, series: &OhlcSeries) -> Option<Signal> {
        let closes = &series.closes;
        let highs = &series.highs;
        let lows = &series.lows;
        let current_price = series.latest.close;

        let required = (self.lookback + 1).max(self.atr_period + 1).max(ATR_LOOKBACK + 1);
        if closes.len() < required {
            debug!(have = closes.len(), need = required, "collecting data");
            return None;
        }

        // --- Track support/resistance from clustered extrema -----------------
        let (supports, resistances) = detect_support_resistance(closes, 10, 0.02);
        if supports.is_empty() && resistances.is_empty() {
            debug!("no support/resistance structure detected yet");
            return None;
        }

        // Only overwrite a tracked level when a candidate exists on the
        // proper side; a level with no candidate left is the one price just
        // broke through, and forgetting it would erase the breakout.
        if let Some(&r) = resistances
            .iter()
            .filter(|r| **r > current_price)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        {
            self.resistance = Some(r);
        }
        if let Some(&s) = supports
            .iter()
            .filter(|s| **s < current_price)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        {
            self.support = Some(s);
        }

        let atr = calculate_atr(highs, lows, closes, self.atr_period)?;
        let surge = volume_surge(&series.volumes, 20, self.volume_threshold);
        let atr_high = self.atr_elevated(highs, lows, closes, atr);

        debug!(
            price = current_price,
            resistance = ?self.resistance,
            support = ?self.support,
            atr,
            surge,
            atr_high,
            "breakout scan"
        );

        // --- Bullish break ----------------------------------------------------
        if let Some(resistance) = self.resistance {
            if current_price > resistance && surge && atr_high {
                info!(price = current_price, resistance, "bullish breakout confirmed");
                if !self.require_retest {
                    return Some(Signal::Buy);
                }
                if self.armed == Some(BreakDirection::Bullish) {
                    self.armed = None;
                    return Some(Signal::Buy);
                }
                info!("breakout armed — waiting for retest");
                self.armed = Some(BreakDirection::Bullish);
                return None;
            }
        }

        // --- Bearish break ----------------------------------------------------
        if let Some(support) = self.support {
            if current_price < support && surge && atr_high {
                info!(price = current_price, support, "bearish breakout confirmed");
                if !self.require_retest {
                    return Some(Signal::Sell);
                }
                if self.armed == Some(BreakDirection::Bearish) {
                    self.armed = None;
                    return Some(Signal::Sell);
                }
                info!("breakdown armed — waiting for retest");
                self.armed = Some(BreakDirection::Bearish);
                return None;
            }
        }

        // --- Retest of an armed break -----------------------------------------
        match self.armed {
            Some(BreakDirection::Bullish) => {
                if let Some(resistance) = self.resistance {
                    if ((current_price - resistance) / resistance).abs() < RETEST_BAND {
                        info!(price = current_price, resistance, "retest held above old resistance");
                        self.armed = None;
                        return Some(Signal::Buy);
                    }
                }
            }
            Some(BreakDirection::Bearish) => {
                if let Some(support) = self.support {
                    if ((current_price - support) / support).abs() < RETEST_BAND {
                        info!(price = current_price, support, "retest held below old support");
                        self.armed = None;
                        return Some(Signal::Sell);
                    }
                }
            }
            None => {}
        }

        None
    }

    /// Current ATR at or above its mean over the trailing windows.
    fn atr_elevated(&self, highs: &[f64], lows: &[f64], closes: &[f64], current_atr: f64) -> bool {
        let n = closes.len();
        let mut values = Vec::with_capacity(ATR_LOOKBACK);

        // ATR of each window ending before the current bar.
        for back in 1..=ATR_LOOKBACK {
            if n < back + self.atr_period + 1 {
                break;
            }
            let end = n - back;
            if let Some(v) = calculate_atr(&highs[..end], &lows[..end], &closes[..end], self.atr_period)
            {
                values.push(v);
            }
        }

        if values.len() < 3 {
            return false;
        }

        let avg = values.iter().sum::<f64>() / values.len() as f64;
        avg > 0.0 && current_atr >= avg
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.resistance = None;
        self.support = None;
        self.armed = None;
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests_default_strategy_config;
    use crate::market_data::Candle;

    fn series(closes: &[f64], volumes: &[f64]) -> OhlcSeries {
        let latest_close = *closes.last().unwrap();
        OhlcSeries {
            highs: closes.iter().map(|c| c + 1.0).collect(),
            lows: closes.iter().map(|c| c - 1.0).collect(),
            closes: closes.to_vec(),
            volumes: volumes.to_vec(),
            latest: Candle {
                time: closes.len() as i64 * 60,
                open: latest_close,
                high: latest_close + 1.0,
                low: latest_close - 1.0,
                close: latest_close,
                vwap: latest_close,
                volume: *volumes.last().unwrap(),
                count: 1,
            },
        }
    }

    fn strategy(require_retest: bool) -> Breakout {
        let mut config = tests_default_strategy_config();
        config.atr_period = 5;
        config.volume_threshold = 1.5;
        config.breakout_lookback = 20;
        config.require_retest = require_retest;
        Breakout::new(&config)
    }

    /// A range between ~90 and ~110, then an explosive break above with the
    /// final close at `break_close` and final volume `break_volume`.
    fn breakout_closes(break_close: f64) -> Vec<f64> {
        let mut closes = Vec::new();
        for _ in 0..4 {
            for p in [104.0, 100.0, 95.0, 90.0, 90.0, 90.0, 95.0, 100.0, 105.0, 110.0, 110.0, 110.0]
            {
                closes.push(p);
            }
        }
        closes.push(break_close);
        closes
    }

    #[test]
    fn insufficient_data_returns_none() {
        let mut s = strategy(false);
        let closes = vec![100.0; 10];
        let volumes = vec![10.0; 10];
        assert_eq!(s.analyze(&series(&closes, &volumes)), None);
    }

    #[test]
    fn confirmed_bullish_breakout_buys() {
        let mut s = strategy(false);

        // Prime the tracked levels while price is inside the range.
        let closes = breakout_closes(100.0);
        let volumes = vec![10.0; closes.len()];
        assert_eq!(s.analyze(&series(&closes, &volumes)), None);
        assert!(s.resistance.is_some());

        // Break above the ceiling on 3x volume and a violent bar.
        let closes = breakout_closes(125.0);
        let len = closes.len();
        let mut volumes = vec![10.0; len];
        volumes[len - 1] = 30.0;
        // Widen the last bar so ATR is elevated.
        let mut srs = series(&closes, &volumes);
        srs.highs[len - 1] = 126.0;
        srs.lows[len - 1] = 108.0;
        srs.latest.high = 126.0;
        srs.latest.low = 108.0;

        assert_eq!(s.analyze(&srs), Some(Signal::Buy));
    }

    #[test]
    fn breakout_without_volume_surge_is_ignored() {
        let mut s = strategy(false);

        let closes = breakout_closes(100.0);
        let volumes = vec![10.0; closes.len()];
        s.analyze(&series(&closes, &volumes));

        // Same break, flat volume.
        let closes = breakout_closes(125.0);
        let len = closes.len();
        let mut srs = series(&closes, &vec![10.0; len]);
        srs.highs[len - 1] = 126.0;
        srs.lows[len - 1] = 108.0;

        assert_eq!(s.analyze(&srs), None);
    }

    #[test]
    fn retest_arms_then_fires_near_broken_level() {
        let mut s = strategy(true);

        let closes = breakout_closes(100.0);
        let volumes = vec![10.0; closes.len()];
        s.analyze(&series(&closes, &volumes));
        let resistance = s.resistance.expect("resistance tracked");

        // Qualifying break only arms.
        let closes = breakout_closes(125.0);
        let len = closes.len();
        let mut volumes = vec![10.0; len];
        volumes[len - 1] = 30.0;
        let mut srs = series(&closes, &volumes);
        srs.highs[len - 1] = 126.0;
        srs.lows[len - 1] = 108.0;
        assert_eq!(s.analyze(&srs), None);
        assert!(s.armed.is_some());

        // Price drifts back to within 2% of the broken level: fire.
        let retest_price = resistance * 1.01;
        let closes = breakout_closes(retest_price);
        let volumes = vec![10.0; closes.len()];
        assert_eq!(s.analyze(&series(&closes, &volumes)), Some(Signal::Buy));
        assert!(s.armed.is_none());
    }

    #[test]
    fn reset_clears_levels_and_armed_state() {
        let mut s = strategy(true);
        s.resistance = Some(110.0);
        s.armed = Some(BreakDirection::Bullish);
        s.reset();
        assert!(s.resistance.is_none());
        assert!(s.armed.is_none());
    }
}
