// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band: SMA over the window. Upper/lower bands: middle +/- k standard
// deviations, with the population deviation taken over the same window.

use crate::indicators::ema::calculate_sma;

/// The three Bollinger bands for a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands over the last `period` prices with `std_dev` deviations.
///
/// Returns `None` when `period` is zero or there are fewer than `period`
/// prices.
pub fn calculate_bollinger(prices: &[f64], period: usize, std_dev: f64) -> Option<BollingerBands> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let middle = calculate_sma(prices, period)?;

    let window = &prices[prices.len() - period..];
    let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let sigma = variance.sqrt();

    Some(BollingerBands {
        upper: middle + std_dev * sigma,
        middle,
        lower: middle - std_dev * sigma,
    })
}
