// =============================================================================
// SMA Crossover — fast/slow moving average trend following
// =============================================================================
//
//   BUY  : fast SMA crosses above slow SMA (prev_fast <= prev_slow, fast > slow)
//   SELL : fast SMA crosses below slow SMA
//
// Sell-side guards, applied in order:
//   - trend filter: in a classified uptrend with no long held, a bearish
//     cross is noise — suppress (spot: there is nothing to sell).
//   - profit target: with a long held, only exit once the move since entry
//     reaches `min_profit_target`.
//   - minimum hold: ignore crosses inside `min_hold_time` of the entry to
//     stop whipsaw round trips.
//
// The trend filter also suppresses buys while the classifier reads a
// downtrend.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::indicators::ema::calculate_sma;
use crate::market_data::OhlcSeries;
use crate::strategy::StrategyCore;
use crate::types::Signal;

#[derive(Debug)]
pub struct SmaCrossover {
    pub core: StrategyCore,

    fast_period: usize,
    slow_period: usize,

    prev_fast: Option<f64>,
    prev_slow: Option<f64>,

    min_profit_target: f64,
    min_hold_time: Duration,
    enable_trend_filter: bool,

    entry_price: Option<f64>,
    entry_time: Option<Instant>,
}

impl SmaCrossover {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            core: StrategyCore::default(),
            fast_period: config.fast_sma_period,
            slow_period: config.slow_sma_period,
            prev_fast: None,
            prev_slow: None,
            min_profit_target: config.min_profit_target,
            min_hold_time: Duration::from_secs(config.min_hold_time_secs),
            enable_trend_filter: config.enable_trend_filter,
            entry_price: None,
            entry_time: None,
        }
    }

    pub fn analyze(&mut self, series: &OhlcSeries) -> Option<Signal> {
        let prices = &series.closes;
        let current_price = series.latest.close;

        if prices.len() < self.slow_period {
            debug!(have = prices.len(), need = self.slow_period, "collecting data");
            return None;
        }

        let fast = calculate_sma(prices, self.fast_period)?;
        let slow = calculate_sma(prices, self.slow_period)?;

        let mut signal = None;

        if let (Some(prev_fast), Some(prev_slow)) = (self.prev_fast, self.prev_slow) {
            if prev_fast <= prev_slow && fast > slow {
                info!(fast, slow, "bullish SMA crossover");

                let in_downtrend = self.enable_trend_filter
                    && self.core.market_state.map_or(false, |s| s.is_downtrend());
                if in_downtrend {
                    info!("buy suppressed: market classified as downtrend");
                } else {
                    signal = Some(Signal::Buy);
                }
            } else if prev_fast >= prev_slow && fast < slow {
                info!(fast, slow, "bearish SMA crossover");
                signal = Some(Signal::Sell);

                // Uptrend with nothing held: a sell would be a short.
                if self.enable_trend_filter
                    && self.core.market_state.map_or(false, |s| s.is_uptrend())
                    && !self.core.is_long()
                {
                    info!("sell suppressed: uptrend with no long position");
                    signal = None;
                }

                // Profit target gate.
                if signal == Some(Signal::Sell) {
                    if let Some(entry) = self.entry_price {
                        let profit_pct = (current_price - entry) / entry;
                        if profit_pct < self.min_profit_target {
                            debug!(
                                profit = format!("{:.2}%", profit_pct * 100.0),
                                target = format!("{:.2}%", self.min_profit_target * 100.0),
                                "sell suppressed: profit below target"
                            );
                            signal = None;
                        }
                    }
                }

                // Minimum hold gate.
                if signal == Some(Signal::Sell) {
                    if let Some(entry_time) = self.entry_time {
                        let held = entry_time.elapsed();
                        if held < self.min_hold_time {
                            info!(
                                held_secs = held.as_secs(),
                                min_secs = self.min_hold_time.as_secs(),
                                "sell suppressed: hold time too short"
                            );
                            signal = None;
                        }
                    }
                }
            }
        }

        match signal {
            Some(Signal::Buy) => {
                self.entry_price = Some(current_price);
                self.entry_time = Some(Instant::now());
            }
            Some(Signal::Sell) => {
                self.entry_price = None;
                self.entry_time = None;
            }
            None => {}
        }

        self.prev_fast = Some(fast);
        self.prev_slow = Some(slow);

        signal
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.prev_fast = None;
        self.prev_slow = None;
        self.entry_price = None;
        self.entry_time = None;
    }
}
