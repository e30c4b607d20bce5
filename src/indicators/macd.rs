// =============================================================================
// MACD — Moving Average Convergence Divergence
// =============================================================================
//
//   macd      = EMA(fast) - EMA(slow)
//   signal    = EMA of the macd series over `signal_period`
//   histogram = macd - signal
//
// The signal line needs a macd *series*, so the macd value is recomputed over
// every prefix of the input from `slow_period` onward. Quadratic in the
// window length, which is bounded by the 200-candle history cap.

use crate::indicators::ema::calculate_ema;

/// A MACD reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD over the full series.
///
/// Returns `None` when fewer than `slow_period + signal_period` prices are
/// available or any period is zero.
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<Macd> {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 {
        return None;
    }
    if prices.len() < slow_period + signal_period {
        return None;
    }

    // MACD value at each prefix ending from `slow_period` to the full series.
    let mut macd_series = Vec::with_capacity(prices.len() - slow_period + 1);
    for end in slow_period..=prices.len() {
        let fast = calculate_ema(&prices[..end], fast_period)?;
        let slow = calculate_ema(&prices[..end], slow_period)?;
        macd_series.push(fast - slow);
    }

    let macd = *macd_series.last()?;
    let signal = calculate_ema(&macd_series, signal_period)?;

    Some(Macd {
        macd,
        signal,
        histogram: macd - signal,
    })
}
