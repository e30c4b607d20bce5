// =============================================================================
// Linear Regression Slope and Range Percent
// =============================================================================
//
// Two small trend/width gauges used by the market analyzer:
//
//   slope  — least-squares slope of price vs. bar index over the window.
//            Positive = uptrend, negative = downtrend, near zero = sideways.
//   range% — (max - min) / min * 100 over the window; how wide the recent
//            trading range is relative to price.

/// Least-squares slope of the last `period` prices against x = 0..period-1.
///
/// Returns `None` when `period` is zero or there are fewer than `period`
/// prices. A degenerate window (period 1) has slope 0.
pub fn calculate_slope(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let n = window.len() as f64;

    let x_mean = (n - 1.0) / 2.0;
    let y_mean = window.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in window.iter().enumerate() {
        let x_diff = i as f64 - x_mean;
        numerator += x_diff * (y - y_mean);
        denominator += x_diff * x_diff;
    }

    if denominator == 0.0 {
        return Some(0.0);
    }
    Some(numerator / denominator)
}

/// Width of the last `period` prices as a percentage of the window minimum.
///
/// Returns `None` when there are fewer than `period` prices or the window
/// minimum is zero.
pub fn calculate_range_percent(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let high = window.iter().cloned().fold(f64::MIN, f64::max);
    let low = window.iter().cloned().fold(f64::MAX, f64::min);

    if low == 0.0 {
        return None;
    }
    Some((high - low) / low * 100.0)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_line_is_exact() {
        // y = 3x + 7
        let prices: Vec<f64> = (0..20).map(|x| 3.0 * x as f64 + 7.0).collect();
        let slope = calculate_slope(&prices, 14).unwrap();
        assert!((slope - 3.0).abs() < 1e-9);
    }

    #[test]
    fn slope_signs() {
        let up: Vec<f64> = (0..20).map(|x| x as f64).collect();
        let down: Vec<f64> = (0..20).rev().map(|x| x as f64).collect();
        assert!(calculate_slope(&up, 14).unwrap() > 0.0);
        assert!(calculate_slope(&down, 14).unwrap() < 0.0);
    }

    #[test]
    fn slope_flat_is_zero() {
        let flat = vec![5.0; 20];
        assert_eq!(calculate_slope(&flat, 14), Some(0.0));
    }

    #[test]
    fn slope_insufficient_data() {
        assert_eq!(calculate_slope(&[1.0, 2.0], 14), None);
        assert_eq!(calculate_slope(&[], 1), None);
    }

    #[test]
    fn range_percent_basic() {
        // min 100, max 110 => 10%.
        let prices = vec![100.0, 104.0, 110.0, 101.0, 100.0];
        let pct = calculate_range_percent(&prices, 5).unwrap();
        assert!((pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn range_percent_flat_is_zero() {
        let prices = vec![100.0; 10];
        assert_eq!(calculate_range_percent(&prices, 10), Some(0.0));
    }

    #[test]
    fn range_percent_zero_min_declines() {
        let prices = vec![0.0, 1.0, 2.0];
        assert_eq!(calculate_range_percent(&prices, 3), None);
    }

    #[test]
    fn range_percent_insufficient_data() {
        assert_eq!(calculate_range_percent(&[1.0], 2), None);
    }
}
