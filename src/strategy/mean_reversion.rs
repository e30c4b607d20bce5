// =============================================================================
// Mean Reversion — range trading between support and resistance
// =============================================================================
//
// For range-bound and choppy markets where price oscillates inside a band.
//
//   BUY  : inside the support zone, RSI oversold, close below the lower
//          Bollinger band, not already long.
//   SELL : inside the resistance zone, RSI overbought, close above the upper
//          band, long, and the move since entry clears the profit target.
//   CUT  : independent profit-cut exit at +2% when RSI has recovered past 50
//          and price sits above the middle band.
//
// Fibonacci proximity loosens the RSI gates by 5 points when price is
// parked on a key retracement level. A close outside the breakout band
// emits nothing — that is the regime classifier's cue to move to a
// trend-following strategy, not this strategy's trade.

use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::fibonacci::{retracement_levels, signal_strength};
use crate::indicators::levels::{detect_support_resistance, swing_high_low};
use crate::indicators::rsi::calculate_rsi;
use crate::market_data::OhlcSeries;
use crate::strategy::StrategyCore;
use crate::types::Signal;

/// Profit fraction at which the unconditional profit-cut exit arms.
const PROFIT_CUT: f64 = 0.02;

/// Fibonacci strength at which the RSI gates are relaxed.
const FIB_RELAX_THRESHOLD: f64 = 1.15;

#[derive(Debug)]
pub struct MeanReversion {
    pub core: StrategyCore,

    symbol: String,

    rsi_period: usize,
    rsi_oversold: f64,
    rsi_overbought: f64,
    bb_period: usize,
    bb_std_dev: f64,

    support_level: f64,
    resistance_level: f64,
    support_zone: f64,
    resistance_zone: f64,
    breakout_lower: f64,
    breakout_upper: f64,
    auto_detect_levels: bool,

    use_fibonacci: bool,
    fib_lookback: usize,
    fib_tolerance: f64,

    min_profit_target: f64,
    entry_price: Option<f64>,
}

impl MeanReversion {
    pub fn new(config: &StrategyConfig, symbol: &str) -> Self {
        let (default_support, default_resistance, default_lower, default_upper) =
            default_levels(symbol);

        let support_level = config.support_level.unwrap_or(default_support);
        let resistance_level = config.resistance_level.unwrap_or(default_resistance);

        Self {
            core: StrategyCore::default(),
            symbol: symbol.to_string(),
            rsi_period: config.rsi_period,
            rsi_oversold: config.rsi_oversold,
            rsi_overbought: config.rsi_overbought,
            bb_period: config.bb_period,
            bb_std_dev: config.bb_std_dev,
            support_level,
            resistance_level,
            support_zone: support_level * 0.03,
            resistance_zone: resistance_level * 0.03,
            breakout_lower: config.breakout_lower.unwrap_or(default_lower),
            breakout_upper: config.breakout_upper.unwrap_or(default_upper),
            auto_detect_levels: config.auto_detect_levels,
            use_fibonacci: config.use_fibonacci,
            fib_lookback: config.fib_lookback_period,
            fib_tolerance: config.fib_tolerance,
            min_profit_target: config.min_profit_target,
            entry_price: None,
        }
    }

    pub fn analyze(&mut self, series: &OhlcSeries) -> Option<Signal> {
        let prices = &series.closes;
        let current_price = series.latest.close;

        let required = self.rsi_period.max(self.bb_period) + 1;
        if prices.len() < required {
            debug!(
                symbol = %self.symbol,
                have = prices.len(),
                need = required,
                "collecting data"
            );
            return None;
        }

        let rsi = calculate_rsi(prices, self.rsi_period)?;
        let bands = calculate_bollinger(prices, self.bb_period, self.bb_std_dev)?;

        if self.auto_detect_levels && prices.len() >= 50 {
            self.refresh_levels(prices);
        }

        // Fibonacci proximity multiplier (1.0 = no bonus).
        let mut fib_strength = 1.0;
        if self.use_fibonacci && prices.len() >= self.fib_lookback {
            if let Some((swing_high, swing_low)) = swing_high_low(prices, self.fib_lookback) {
                let levels = retracement_levels(swing_high, swing_low);
                fib_strength = signal_strength(current_price, &levels, self.fib_tolerance);
                if fib_strength > 1.0 {
                    debug!(
                        symbol = %self.symbol,
                        strength = format!("{fib_strength:.2}"),
                        "price near key fibonacci level"
                    );
                }
            }
        }

        // Range break: stand aside and let the classifier rotate strategies.
        if current_price < self.breakout_lower {
            warn!(
                symbol = %self.symbol,
                price = current_price,
                breakout_lower = self.breakout_lower,
                "range broken below — no mean-reversion trade"
            );
            return None;
        }
        if current_price > self.breakout_upper {
            warn!(
                symbol = %self.symbol,
                price = current_price,
                breakout_upper = self.breakout_upper,
                "range broken above — no mean-reversion trade"
            );
            return None;
        }

        let in_support_zone = (self.support_level - self.support_zone
            ..=self.support_level + self.support_zone)
            .contains(&current_price);
        let in_resistance_zone = (self.resistance_level - self.resistance_zone
            ..=self.resistance_level + self.resistance_zone)
            .contains(&current_price);

        // --- BUY: support + oversold + below lower band ----------------------
        let mut rsi_buy_threshold = self.rsi_oversold;
        if fib_strength >= FIB_RELAX_THRESHOLD {
            rsi_buy_threshold += 5.0;
        }

        if in_support_zone
            && rsi < rsi_buy_threshold
            && current_price < bands.lower
            && !self.core.is_long()
        {
            info!(
                symbol = %self.symbol,
                price = current_price,
                rsi = format!("{rsi:.1}"),
                lower_band = bands.lower,
                fib_strength = format!("{fib_strength:.2}"),
                "mean-reversion buy at support"
            );
            self.entry_price = Some(current_price);
            return Some(Signal::Buy);
        }

        // --- Profit-cut exit: take +2% once momentum has recovered -----------
        if self.core.is_long() {
            if let Some(entry) = self.entry_price {
                let profit_pct = (current_price - entry) / entry;
                if profit_pct >= PROFIT_CUT && rsi > 50.0 && current_price > bands.middle {
                    info!(
                        symbol = %self.symbol,
                        profit = format!("{:.2}%", profit_pct * 100.0),
                        rsi = format!("{rsi:.1}"),
                        "profit-cut exit"
                    );
                    self.entry_price = None;
                    return Some(Signal::Sell);
                }
            }
        }

        // --- SELL: resistance + overbought + above upper band ----------------
        let mut rsi_sell_threshold = self.rsi_overbought;
        if fib_strength >= FIB_RELAX_THRESHOLD {
            rsi_sell_threshold -= 5.0;
        }

        if in_resistance_zone
            && rsi > rsi_sell_threshold
            && current_price > bands.upper
            && self.core.is_long()
        {
            if let Some(entry) = self.entry_price {
                let profit_pct = (current_price - entry) / entry;
                if profit_pct < self.min_profit_target {
                    debug!(
                        symbol = %self.symbol,
                        profit = format!("{:.2}%", profit_pct * 100.0),
                        target = format!("{:.2}%", self.min_profit_target * 100.0),
                        "sell conditions met but profit below target"
                    );
                    return None;
                }
            }

            info!(
                symbol = %self.symbol,
                price = current_price,
                rsi = format!("{rsi:.1}"),
                upper_band = bands.upper,
                "mean-reversion sell at resistance"
            );
            self.entry_price = None;
            return Some(Signal::Sell);
        }

        None
    }

    /// Pull support/resistance towards freshly clustered levels. Only moves
    /// on a meaningful change (>1% of the current level) to avoid jitter.
    fn refresh_levels(&mut self, prices: &[f64]) {
        let (supports, resistances) = detect_support_resistance(prices, 10, 0.02);

        if let Some(&new_support) = supports
            .iter()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        {
            if (new_support - self.support_level).abs() > self.support_level * 0.01 {
                info!(
                    symbol = %self.symbol,
                    old = self.support_level,
                    new = new_support,
                    "support level updated"
                );
                self.support_level = new_support;
                self.support_zone = new_support * 0.03;
            }
        }

        if let Some(&new_resistance) = resistances
            .iter()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        {
            if (new_resistance - self.resistance_level).abs() > self.resistance_level * 0.01 {
                info!(
                    symbol = %self.symbol,
                    old = self.resistance_level,
                    new = new_resistance,
                    "resistance level updated"
                );
                self.resistance_level = new_resistance;
                self.resistance_zone = new_resistance * 0.03;
            }
        }
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.entry_price = None;
    }
}

/// Static per-symbol band defaults used when auto-detection has not kicked in
/// yet and no explicit levels are configured.
fn default_levels(symbol: &str) -> (f64, f64, f64, f64) {
    match symbol {
        "XBTUSD" => (94_000.0, 102_000.0, 93_000.0, 106_000.0),
        "ETHUSD" => (3_000.0, 3_300.0, 2_900.0, 3_400.0),
        "SOLUSD" => (130.0, 150.0, 120.0, 160.0),
        "XRPUSD" => (2.15, 2.35, 2.05, 2.45),
        _ => (94_000.0, 102_000.0, 93_000.0, 106_000.0),
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

    fn series_from_closes(closes: &[f64]) -> OhlcSeries {
        let latest_close = *closes.last().unwrap();
        OhlcSeries {
            highs: closes.iter().map(|c| c + 0.5).collect(),
            lows: closes.iter().map(|c| c - 0.5).collect(),
            closes: closes.to_vec(),
            volumes: vec![10.0; closes.len()],
            latest: Candle {
                time: closes.len() as i64 * 60,
                open: latest_close,
                high: latest_close + 0.5,
                low: latest_close - 0.5,
                close: latest_close,
                vwap: latest_close,
                volume: 10.0,
                count: 1,
            },
        }
    }

    /// Strategy tuned so the literal support-touch scenario triggers:
    /// support 85±5, RSI gate at 80, tiny Bollinger deviation.
    fn support_touch_strategy() -> MeanReversion {
        let mut config = tests_default_strategy_config();
        config.rsi_period = 5;
        config.rsi_oversold = 80.0;
        config.rsi_overbought = 90.0;
        config.bb_period = 5;
        config.bb_std_dev = 0.5;
        config.support_level = Some(85.0);
        config.resistance_level = Some(100.0);
        config.breakout_lower = Some(50.0);
        config.breakout_upper = Some(150.0);
        config.auto_detect_levels = false;
        config.use_fibonacci = false;
        let mut s = MeanReversion::new(&config, "XBTUSD");
        s.support_zone = 5.0;
        s.resistance_zone = 5.0;
        s
    }

    #[test]
    fn insufficient_data_returns_none() {
        let mut strategy = support_touch_strategy();
        let series = series_from_closes(&[100.0, 100.0, 100.0]);
        assert_eq!(strategy.analyze(&series), None);
    }

    #[test]
    fn buys_at_support_when_oversold_below_band() {
        let mut strategy = support_touch_strategy();
        let series = series_from_closes(&[100.0, 100.0, 100.0, 100.0, 85.0, 85.0]);
        assert_eq!(strategy.analyze(&series), Some(Signal::Buy));
        assert_eq!(strategy.entry_price, Some(85.0));
    }

    #[test]
    fn does_not_buy_when_already_long() {
        let mut strategy = support_touch_strategy();
        strategy.core.position = Some(crate::types::PositionSide::Long);
        let series = series_from_closes(&[100.0, 100.0, 100.0, 100.0, 85.0, 85.0]);
        assert_eq!(strategy.analyze(&series), None);
    }

    #[test]
    fn does_not_buy_mid_range() {
        let mut strategy = support_touch_strategy();
        // Price well away from the support zone.
        let series = series_from_closes(&[100.0, 100.0, 100.0, 100.0, 99.0, 98.0]);
        assert_eq!(strategy.analyze(&series), None);
    }

    #[test]
    fn range_break_emits_nothing() {
        let mut strategy = support_touch_strategy();
        strategy.breakout_lower = 90.0;
        let series = series_from_closes(&[100.0, 100.0, 100.0, 100.0, 85.0, 85.0]);
        assert_eq!(strategy.analyze(&series), None);
    }

    #[test]
    fn profit_cut_exit_fires_at_two_percent() {
        let mut strategy = support_touch_strategy();
        strategy.core.position = Some(crate::types::PositionSide::Long);
        strategy.entry_price = Some(90.0);

        // Price climbed to 95 (+5.5%), rising closes keep RSI at 100 and the
        // last close sits above the middle band.
        let series = series_from_closes(&[90.0, 91.0, 92.0, 93.0, 94.0, 95.0]);
        assert_eq!(strategy.analyze(&series), Some(Signal::Sell));
        assert_eq!(strategy.entry_price, None);
    }

    #[test]
    fn resistance_sell_requires_profit_target() {
        let mut strategy = support_touch_strategy();
        strategy.core.position = Some(crate::types::PositionSide::Long);
        strategy.min_profit_target = 0.10;
        // Entry just below the close: inside the resistance zone with RSI and
        // band conditions met, but only ~0.5% in profit — under both the
        // target and the 2% profit-cut.
        strategy.entry_price = Some(100.5);

        let series = series_from_closes(&[100.0, 100.0, 100.0, 100.0, 100.0, 101.0]);
        assert_eq!(strategy.analyze(&series), None);
    }

    #[test]
    fn resistance_sell_fires_once_profitable() {
        let mut strategy = support_touch_strategy();
        strategy.core.position = Some(crate::types::PositionSide::Long);
        strategy.min_profit_target = 0.005;
        strategy.entry_price = Some(95.0);

        let series = series_from_closes(&[100.0, 100.0, 100.0, 100.0, 100.0, 101.0]);
        assert_eq!(strategy.analyze(&series), Some(Signal::Sell));
        assert_eq!(strategy.entry_price, None);
    }

    #[test]
    fn reset_clears_entry_tracking() {
        let mut strategy = support_touch_strategy();
        strategy.entry_price = Some(90.0);
        strategy.core.position = Some(crate::types::PositionSide::Long);
        strategy.reset();
        assert_eq!(strategy.entry_price, None);
        assert!(strategy.core.position.is_none());
    }
}
