// =============================================================================
// Market Analyzer
// =============================================================================
//
// Classifies a market into one of eight states from an indicator snapshot.
//
// Decision tree (first match wins):
//
//   1. ADX > strong           -> STRONG_UPTREND / STRONG_DOWNTREND by slope
//                                sign, MODERATE_TREND when slope is flat.
//   2. ADX < weak:
//        range% < moderate:
//            range% < tight   -> LOW_VOLATILITY
//            chop < choppy    -> RANGE_BOUND, else CHOPPY
//        else (wide range):
//            chop > choppy    -> CHOPPY, else VOLATILE_BREAKOUT
//   3. otherwise (transitioning):
//        chop < trending      -> MODERATE_TREND, else RANGE_BOUND
//
// Missing ADX or range% means UNKNOWN at zero confidence. Results are cached
// per symbol for a short TTL so several strategy evaluations inside one tick
// reuse the same classification.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::analysis::market_state::{MarketCondition, MarketState};
use crate::config::AnalyzerConfig;
use crate::indicators::adx::calculate_adx;
use crate::indicators::atr::calculate_atr;
use crate::indicators::choppiness::calculate_choppiness;
use crate::indicators::regression::{calculate_range_percent, calculate_slope};

/// Stateless classification plus a small per-symbol result cache.
pub struct MarketAnalyzer {
    config: AnalyzerConfig,
    cache: HashMap<String, (MarketCondition, Instant)>,
    cache_ttl: Duration,
}

impl MarketAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let cache_ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            config,
            cache: HashMap::new(),
            cache_ttl,
        }
    }

    /// Minimum number of candles required before any classification.
    pub fn required_data_points(&self) -> usize {
        (self.config.adx_period * 2).max(self.config.range_period)
    }

    /// Classify `symbol` from parallel close/high/low slices.
    ///
    /// A cached condition is returned while it is younger than the TTL, so
    /// callers can invoke this freely within a tick.
    pub fn analyze(
        &mut self,
        symbol: &str,
        closes: &[f64],
        highs: &[f64],
        lows: &[f64],
    ) -> MarketCondition {
        if let Some((condition, stamp)) = self.cache.get(symbol) {
            if stamp.elapsed() < self.cache_ttl {
                debug!(symbol, "using cached market condition");
                return condition.clone();
            }
        }

        let min_required = self.required_data_points();
        if closes.len() < min_required {
            warn!(
                symbol,
                have = closes.len(),
                need = min_required,
                "insufficient data for market analysis"
            );
            return MarketCondition::unknown(format!(
                "Need {min_required} data points, have {}",
                closes.len()
            ));
        }

        let adx = calculate_adx(highs, lows, closes, self.config.adx_period);
        let atr = calculate_atr(highs, lows, closes, self.config.atr_period);
        let choppiness = calculate_choppiness(highs, lows, closes, self.config.chop_period);
        let slope = calculate_slope(closes, self.config.slope_period);
        let range_percent = calculate_range_percent(closes, self.config.range_period);

        let (state, confidence) = classify(&self.config, adx, choppiness, slope, range_percent);
        let description = describe(state, adx, range_percent, choppiness);

        let condition = MarketCondition {
            state,
            adx,
            atr,
            range_percent,
            choppiness,
            slope,
            confidence,
            description,
        };

        debug!(
            symbol,
            state = %condition.state,
            confidence = format!("{:.2}", condition.confidence),
            adx = ?condition.adx.map(|v| (v * 100.0).round() / 100.0),
            "market classified"
        );

        self.cache
            .insert(symbol.to_string(), (condition.clone(), Instant::now()));
        condition
    }
}

// =============================================================================
// Classification logic
// =============================================================================

/// Walk the decision tree. Pure, so the whole matrix is unit-testable.
fn classify(
    config: &AnalyzerConfig,
    adx: Option<f64>,
    choppiness: Option<f64>,
    slope: Option<f64>,
    range_percent: Option<f64>,
) -> (MarketState, f64) {
    let (adx, range_pct) = match (adx, range_percent) {
        (Some(a), Some(r)) => (a, r),
        _ => return (MarketState::Unknown, 0.0),
    };

    // 1. Strong trend — direction from the regression slope.
    if adx > config.adx_strong_trend {
        return match slope {
            Some(s) if s > 0.0 => (MarketState::StrongUptrend, 0.8),
            Some(s) if s < 0.0 => (MarketState::StrongDowntrend, 0.8),
            _ => (MarketState::ModerateTrend, 0.8),
        };
    }

    // 2. Weak trend.
    if adx < config.adx_weak_trend {
        if range_pct < config.range_moderate {
            if range_pct < config.range_tight {
                return (MarketState::LowVolatility, 0.8);
            }
            return match choppiness {
                Some(c) if c < config.choppiness_choppy => (MarketState::RangeBound, 0.75),
                _ => (MarketState::Choppy, 0.6),
            };
        }

        // Wide range without trend strength.
        return match choppiness {
            Some(c) if c > config.choppiness_choppy => (MarketState::Choppy, 0.7),
            _ => (MarketState::VolatileBreakout, 0.6),
        };
    }

    // 3. Transitioning (ADX between weak and strong).
    match choppiness {
        Some(c) if c < config.choppiness_trending => (MarketState::ModerateTrend, 0.65),
        _ => (MarketState::RangeBound, 0.6),
    }
}

fn describe(
    state: MarketState,
    adx: Option<f64>,
    range_percent: Option<f64>,
    choppiness: Option<f64>,
) -> String {
    let adx_str = adx.map_or("N/A".to_string(), |v| format!("{v:.1}"));
    let range_str = range_percent.map_or("N/A".to_string(), |v| format!("{v:.1}"));
    let chop_str = choppiness.map_or("N/A".to_string(), |v| format!("{v:.1}"));

    match state {
        MarketState::StrongUptrend => {
            format!("Strong uptrend detected (ADX {adx_str}, positive momentum)")
        }
        MarketState::StrongDowntrend => {
            format!("Strong downtrend detected (ADX {adx_str}, negative momentum)")
        }
        MarketState::ModerateTrend => format!("Moderate trend (ADX {adx_str}, developing direction)"),
        MarketState::RangeBound => format!("Range-bound market (ADX {adx_str}, {range_str}% range)"),
        MarketState::VolatileBreakout => {
            format!("Volatile breakout condition (wide range {range_str}%)")
        }
        MarketState::Choppy => format!("Choppy market (choppiness {chop_str}, no clear direction)"),
        MarketState::LowVolatility => {
            format!("Low volatility ({range_str}% range, tight consolidation)")
        }
        MarketState::Unknown => "Insufficient data for analysis".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalyzerConfig {
        AnalyzerConfig {
            adx_strong_trend: 25.0,
            adx_weak_trend: 20.0,
            choppiness_choppy: 61.8,
            choppiness_trending: 38.2,
            range_tight: 5.0,
            range_moderate: 15.0,
            adx_period: 14,
            atr_period: 14,
            chop_period: 14,
            slope_period: 14,
            range_period: 50,
            cache_ttl_secs: 30,
        }
    }

    #[test]
    fn required_points_formula() {
        let analyzer = MarketAnalyzer::new(config());
        assert_eq!(analyzer.required_data_points(), 50);

        let mut cfg = config();
        cfg.adx_period = 30;
        let analyzer = MarketAnalyzer::new(cfg);
        assert_eq!(analyzer.required_data_points(), 60);
    }

    #[test]
    fn missing_inputs_are_unknown() {
        let cfg = config();
        let (state, conf) = classify(&cfg, None, Some(50.0), Some(1.0), Some(10.0));
        assert_eq!(state, MarketState::Unknown);
        assert_eq!(conf, 0.0);

        let (state, _) = classify(&cfg, Some(30.0), Some(50.0), Some(1.0), None);
        assert_eq!(state, MarketState::Unknown);
    }

    #[test]
    fn strong_trend_by_slope_sign() {
        let cfg = config();
        let (state, conf) = classify(&cfg, Some(30.0), Some(30.0), Some(2.0), Some(20.0));
        assert_eq!(state, MarketState::StrongUptrend);
        assert!((conf - 0.8).abs() < 1e-12);

        let (state, _) = classify(&cfg, Some(30.0), Some(30.0), Some(-2.0), Some(20.0));
        assert_eq!(state, MarketState::StrongDowntrend);

        let (state, _) = classify(&cfg, Some(30.0), Some(30.0), Some(0.0), Some(20.0));
        assert_eq!(state, MarketState::ModerateTrend);

        let (state, _) = classify(&cfg, Some(30.0), Some(30.0), None, Some(20.0));
        assert_eq!(state, MarketState::ModerateTrend);
    }

    #[test]
    fn weak_trend_tight_range_is_low_volatility() {
        let cfg = config();
        let (state, conf) = classify(&cfg, Some(15.0), Some(50.0), Some(0.1), Some(3.0));
        assert_eq!(state, MarketState::LowVolatility);
        assert!((conf - 0.8).abs() < 1e-12);
    }

    #[test]
    fn weak_trend_moderate_range_splits_on_choppiness() {
        let cfg = config();
        let (state, conf) = classify(&cfg, Some(15.0), Some(50.0), Some(0.1), Some(10.0));
        assert_eq!(state, MarketState::RangeBound);
        assert!((conf - 0.75).abs() < 1e-12);

        let (state, conf) = classify(&cfg, Some(15.0), Some(70.0), Some(0.1), Some(10.0));
        assert_eq!(state, MarketState::Choppy);
        assert!((conf - 0.6).abs() < 1e-12);
    }

    #[test]
    fn weak_trend_wide_range_splits_on_choppiness() {
        let cfg = config();
        let (state, conf) = classify(&cfg, Some(15.0), Some(70.0), Some(0.1), Some(20.0));
        assert_eq!(state, MarketState::Choppy);
        assert!((conf - 0.7).abs() < 1e-12);

        let (state, conf) = classify(&cfg, Some(15.0), Some(40.0), Some(0.1), Some(20.0));
        assert_eq!(state, MarketState::VolatileBreakout);
        assert!((conf - 0.6).abs() < 1e-12);
    }

    #[test]
    fn transitioning_band() {
        let cfg = config();
        let (state, conf) = classify(&cfg, Some(22.0), Some(30.0), Some(0.1), Some(10.0));
        assert_eq!(state, MarketState::ModerateTrend);
        assert!((conf - 0.65).abs() < 1e-12);

        let (state, conf) = classify(&cfg, Some(22.0), Some(50.0), Some(0.1), Some(10.0));
        assert_eq!(state, MarketState::RangeBound);
        assert!((conf - 0.6).abs() < 1e-12);
    }

    #[test]
    fn analyze_reports_unknown_on_short_series() {
        let mut analyzer = MarketAnalyzer::new(config());
        let closes = vec![100.0; 10];
        let condition = analyzer.analyze("XBTUSD", &closes, &closes, &closes);
        assert_eq!(condition.state, MarketState::Unknown);
        assert_eq!(condition.confidence, 0.0);
    }

    #[test]
    fn analyze_caches_per_symbol() {
        let mut analyzer = MarketAnalyzer::new(config());

        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();

        let first = analyzer.analyze("XBTUSD", &closes, &highs, &lows);
        assert_eq!(first.state, MarketState::StrongUptrend);

        // A radically different series within the TTL still returns the
        // cached condition for the same symbol...
        let flat = vec![100.0; 60];
        let cached = analyzer.analyze("XBTUSD", &flat, &flat, &flat);
        assert_eq!(cached.state, MarketState::StrongUptrend);

        // ...but other symbols are classified fresh.
        let other = analyzer.analyze("ETHUSD", &flat, &flat, &flat);
        assert_ne!(other.state, MarketState::StrongUptrend);
    }
}
