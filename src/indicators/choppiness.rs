// =============================================================================
// Choppiness Index
// =============================================================================
//
// Distinguishes directionless chop from directional movement:
//
//   CI = 100 * log10( sum(TR over n bars) / (maxH - minL) ) / log10(n)
//
// clamped to [0, 100]. A perfectly flat window (zero range) reads 100 —
// maximum choppiness. Values above ~61.8 mean sideways churn; below ~38.2
// means the market is travelling.

/// Choppiness Index over the last `period` bars, in [0, 100].
///
/// Returns `None` when `period < 2` or any slice is shorter than `period`.
/// The first bar of the window has no prior close, so its true range is just
/// high - low.
pub fn calculate_choppiness(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Option<f64> {
    if period < 2 {
        return None;
    }
    let n = highs.len().min(lows.len()).min(closes.len());
    if n < period {
        return None;
    }

    let start = n - period;

    let mut tr_sum = 0.0;
    for i in start..n {
        let tr = if i == start {
            highs[i] - lows[i]
        } else {
            (highs[i] - lows[i])
                .max((highs[i] - closes[i - 1]).abs())
                .max((lows[i] - closes[i - 1]).abs())
        };
        tr_sum += tr;
    }

    let period_high = highs[start..n].iter().cloned().fold(f64::MIN, f64::max);
    let period_low = lows[start..n].iter().cloned().fold(f64::MAX, f64::min);
    let range = period_high - period_low;

    if range <= 0.0 {
        return Some(100.0);
    }

    let ci = 100.0 * (tr_sum / range).log10() / (period as f64).log10();
    Some(ci.clamp(0.0, 100.0))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data() {
        let xs = vec![1.0; 5];
        assert_eq!(calculate_choppiness(&xs, &xs, &xs, 14), None);
        assert_eq!(calculate_choppiness(&xs, &xs, &xs, 1), None);
    }

    #[test]
    fn flat_window_is_max_choppy() {
        let highs = vec![100.0; 20];
        let lows = vec![100.0; 20];
        let closes = vec![100.0; 20];
        assert_eq!(calculate_choppiness(&highs, &lows, &closes, 14), Some(100.0));
    }

    #[test]
    fn straight_trend_reads_low() {
        // Monotone climb: the window range swallows the TR sum.
        let highs: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 3.0 + 0.5).collect();
        let lows: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 3.0 - 0.5).collect();
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 3.0).collect();
        let ci = calculate_choppiness(&highs, &lows, &closes, 14).unwrap();
        assert!(ci < 38.2, "expected trending CI, got {ci}");
    }

    #[test]
    fn oscillation_reads_high() {
        // Price ping-pongs inside a fixed band: TRs accumulate, range does not.
        let closes: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 102.0 })
            .collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();
        let ci = calculate_choppiness(&highs, &lows, &closes, 14).unwrap();
        assert!(ci > 61.8, "expected choppy CI, got {ci}");
    }

    #[test]
    fn always_clamped() {
        let highs: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 1.1).sin() * 5.0 + 1.0).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 2.0).collect();
        let closes: Vec<f64> = highs.iter().map(|h| h - 1.0).collect();
        let ci = calculate_choppiness(&highs, &lows, &closes, 14).unwrap();
        assert!((0.0..=100.0).contains(&ci));
    }
}
