// =============================================================================
// Moving Averages — SMA and EMA
// =============================================================================
//
// SMA: arithmetic mean of the last `period` prices.
// EMA: seeded with the SMA of the FIRST `period` prices, then the recurrence
//        ema <- ema + alpha * (x - ema)    with alpha = 2 / (period + 1)
// applied to every remaining price. Seeding from the front of the series
// keeps the value stable as the window slides.

/// Simple moving average of the last `period` prices.
///
/// Returns `None` when `period` is zero or there are fewer than `period`
/// prices.
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let window = &prices[prices.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average over the whole series.
///
/// Returns `None` when `period` is zero or there are fewer than `period`
/// prices.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    // Seed with the SMA of the first `period` prices.
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;

    for &price in &prices[period..] {
        ema += alpha * (price - ema);
    }

    Some(ema)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(calculate_sma(&prices, 5), Some(3.0));
        assert_eq!(calculate_sma(&prices, 2), Some(4.5));
    }

    #[test]
    fn sma_insufficient_data() {
        assert_eq!(calculate_sma(&[1.0, 2.0], 3), None);
        assert_eq!(calculate_sma(&[], 1), None);
    }

    #[test]
    fn sma_period_zero() {
        assert_eq!(calculate_sma(&[1.0, 2.0], 0), None);
    }

    #[test]
    fn ema_equals_sma_at_exact_period() {
        // With exactly `period` prices the EMA is just the seed SMA.
        let prices = [2.0, 4.0, 6.0];
        assert_eq!(calculate_ema(&prices, 3), Some(4.0));
    }

    #[test]
    fn ema_tracks_recent_prices() {
        // A jump at the end must pull the EMA above the plain SMA of the
        // seeding window.
        let mut prices = vec![100.0; 10];
        prices.push(110.0);
        let ema = calculate_ema(&prices, 10).unwrap();
        assert!(ema > 100.0 && ema < 110.0);
    }

    #[test]
    fn ema_flat_series_is_flat() {
        let prices = vec![42.0; 30];
        let ema = calculate_ema(&prices, 10).unwrap();
        assert!((ema - 42.0).abs() < 1e-12);
    }

    #[test]
    fn ema_insufficient_data() {
        assert_eq!(calculate_ema(&[1.0, 2.0], 3), None);
        assert_eq!(calculate_ema(&[], 1), None);
    }

    #[test]
    fn purity() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        assert_eq!(calculate_ema(&prices, 12), calculate_ema(&prices, 12));
        assert_eq!(calculate_sma(&prices, 12), calculate_sma(&prices, 12));
    }
}
