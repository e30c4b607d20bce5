// =============================================================================
// Relative Strength Index (RSI)
// =============================================================================
//
// Measures the speed and magnitude of recent price changes to flag
// overbought/oversold conditions.
//
//   deltas   = differences over the last `period` + 1 closes
//   avg_gain = mean of positive deltas, avg_loss = mean of |negative deltas|
//   RS       = avg_gain / avg_loss
//   RSI      = 100 - 100 / (1 + RS)
//
// The averages here are plain means over the window (not Wilder smoothing),
// so the value responds immediately to the most recent `period` bars.

/// RSI over the last `period` deltas.
///
/// # Edge cases
/// - `period == 0` or fewer than `period + 1` prices => `None`
/// - no losses in the window => 100.0
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let window = &prices[prices.len() - period - 1..];

    let (sum_gain, sum_loss) = window.windows(2).fold((0.0_f64, 0.0_f64), |(g, l), w| {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            (g + delta, l)
        } else {
            (g, l - delta)
        }
    });

    let avg_gain = sum_gain / period as f64;
    let avg_loss = sum_loss / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data() {
        // Need period + 1 closes.
        let prices: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert_eq!(calculate_rsi(&prices, 14), None);
        assert_eq!(calculate_rsi(&[], 14), None);
        assert_eq!(calculate_rsi(&[1.0, 2.0], 0), None);
    }

    #[test]
    fn all_gains_is_100() {
        let prices: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        assert_eq!(calculate_rsi(&prices, 14), Some(100.0));
    }

    #[test]
    fn all_losses_is_0() {
        let prices: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi.abs() < 1e-10, "expected 0.0, got {rsi}");
    }

    #[test]
    fn flat_series_is_100() {
        // No losses at all — the zero-loss branch fires.
        let prices = vec![100.0; 30];
        assert_eq!(calculate_rsi(&prices, 14), Some(100.0));
    }

    #[test]
    fn balanced_moves_near_50() {
        // Alternating +1/-1 deltas: equal gains and losses.
        let mut prices = vec![100.0];
        for i in 0..28 {
            let last = *prices.last().unwrap();
            prices.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!((rsi - 50.0).abs() < 5.0, "expected near 50, got {rsi}");
    }

    #[test]
    fn always_in_range() {
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!((0.0..=100.0).contains(&rsi), "RSI {rsi} out of range");
    }

    #[test]
    fn only_last_window_matters() {
        // A wild prefix must not change the result.
        let tail: Vec<f64> = (0..15).map(|i| 100.0 + i as f64 * 0.5).collect();
        let mut with_prefix = vec![5.0, 500.0, 3.0, 250.0];
        with_prefix.extend_from_slice(&tail);
        assert_eq!(calculate_rsi(&tail, 14), calculate_rsi(&with_prefix, 14));
    }
}
