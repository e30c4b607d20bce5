// =============================================================================
// MACD Strategy — momentum crossovers for moderate trends
// =============================================================================
//
//   BUY  : MACD line crosses above the signal line
//   SELL : MACD line crosses below the signal line
//
// With histogram confirmation enabled, a cross only counts when the
// histogram already agrees with the cross direction (positive for bullish,
// negative for bearish) — crosses with a lagging histogram wait for the next
// bar. The coordinator layers its own fee-aware exit gate on top of sells
// from this strategy.

use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::indicators::macd::calculate_macd;
use crate::market_data::OhlcSeries;
use crate::strategy::StrategyCore;
use crate::types::Signal;

#[derive(Debug)]
pub struct MacdStrategy {
    pub core: StrategyCore,

    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    histogram_confirm: bool,

    prev_macd: Option<f64>,
    prev_signal: Option<f64>,
}

impl MacdStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            core: StrategyCore::default(),
            fast_period: config.macd_fast,
            slow_period: config.macd_slow,
            signal_period: config.macd_signal,
            histogram_confirm: config.macd_histogram_confirm,
            prev_macd: None,
            prev_signal: None,
        }
    }

    pub fn analyze(&mut self, series: &OhlcSeries) -> Option<Signal> {
        let prices = &series.closes;

        let required = self.slow_period + self.signal_period;
        if prices.len() < required {
            debug!(have = prices.len(), need = required, "collecting data");
            return None;
        }

        let macd = calculate_macd(prices, self.fast_period, self.slow_period, self.signal_period)?;

        let mut signal = None;

        if let (Some(prev_macd), Some(prev_signal)) = (self.prev_macd, self.prev_signal) {
            if prev_macd <= prev_signal && macd.macd > macd.signal {
                if self.histogram_confirm && macd.histogram <= 0.0 {
                    info!(
                        histogram = macd.histogram,
                        "bullish MACD cross waiting for histogram confirmation"
                    );
                } else {
                    info!(macd = macd.macd, signal_line = macd.signal, "bullish MACD crossover");
                    signal = Some(Signal::Buy);
                }
            } else if prev_macd >= prev_signal && macd.macd < macd.signal {
                if self.histogram_confirm && macd.histogram >= 0.0 {
                    info!(
                        histogram = macd.histogram,
                        "bearish MACD cross waiting for histogram confirmation"
                    );
                } else {
                    info!(macd = macd.macd, signal_line = macd.signal, "bearish MACD crossover");
                    signal = Some(Signal::Sell);
                }
            }
        }

        self.prev_macd = Some(macd.macd);
        self.prev_signal = Some(macd.signal);

        signal
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.prev_macd = None;
        self.prev_signal = None;
    }
}
