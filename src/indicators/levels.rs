// =============================================================================
// Support / Resistance Detection and Volume Surge
// =============================================================================
//
// Support and resistance come from local extrema: a point is a local minimum
// (support candidate) iff it equals the minimum of the surrounding
// [i - window, i + window] slice, and symmetrically for maxima. Nearby
// candidates are clustered — a level joins a cluster while its distance to
// the running cluster mean stays within `threshold * mean` — and each cluster
// collapses to its average.

/// Detect clustered support and resistance levels.
///
/// Returns `(support_levels, resistance_levels)`; both empty when fewer than
/// `2 * window` prices are available.
pub fn detect_support_resistance(
    prices: &[f64],
    window: usize,
    threshold: f64,
) -> (Vec<f64>, Vec<f64>) {
    if window == 0 || prices.len() < window * 2 {
        return (Vec::new(), Vec::new());
    }

    let mut supports = Vec::new();
    let mut resistances = Vec::new();

    for i in window..prices.len() - window {
        let neighborhood = &prices[i - window..=(i + window)];
        let price = prices[i];

        let lo = neighborhood.iter().cloned().fold(f64::MAX, f64::min);
        let hi = neighborhood.iter().cloned().fold(f64::MIN, f64::max);

        if price == lo {
            supports.push(price);
        }
        if price == hi {
            resistances.push(price);
        }
    }

    (
        cluster_levels(supports, threshold),
        cluster_levels(resistances, threshold),
    )
}

/// Collapse nearby levels into their cluster averages.
fn cluster_levels(mut levels: Vec<f64>, threshold: f64) -> Vec<f64> {
    if levels.is_empty() {
        return levels;
    }

    levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut clustered = Vec::new();
    let mut current: Vec<f64> = vec![levels[0]];

    for &level in &levels[1..] {
        let mean = current.iter().sum::<f64>() / current.len() as f64;
        if mean != 0.0 && ((level - mean) / mean).abs() <= threshold {
            current.push(level);
        } else {
            clustered.push(mean);
            current = vec![level];
        }
    }
    clustered.push(current.iter().sum::<f64>() / current.len() as f64);

    clustered
}

/// Whether the latest volume is at least `threshold` times the average of the
/// preceding `period` volumes.
pub fn volume_surge(volumes: &[f64], period: usize, threshold: f64) -> bool {
    if period == 0 || volumes.len() < period + 1 {
        return false;
    }

    let n = volumes.len();
    let avg = volumes[n - period - 1..n - 1].iter().sum::<f64>() / period as f64;
    if avg == 0.0 {
        return false;
    }

    volumes[n - 1] >= avg * threshold
}

/// Highest and lowest price over the last `period` entries, for Fibonacci
/// swing anchoring.
pub fn swing_high_low(prices: &[f64], period: usize) -> Option<(f64, f64)> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let window = &prices[prices.len() - period..];
    let high = window.iter().cloned().fold(f64::MIN, f64::max);
    let low = window.iter().cloned().fold(f64::MAX, f64::min);
    Some((high, low))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// A price path with a flat floor at 90 and ceiling at 110.
    fn ranging_prices() -> Vec<f64> {
        let mut prices = Vec::new();
        for _ in 0..4 {
            // Descend to the floor, sit on it, climb to the ceiling, sit.
            for p in [104.0, 100.0, 95.0, 90.0, 90.0, 90.0, 95.0, 100.0, 105.0, 110.0, 110.0, 110.0]
            {
                prices.push(p);
            }
        }
        prices
    }

    #[test]
    fn too_short_yields_nothing() {
        let (s, r) = detect_support_resistance(&[1.0; 10], 10, 0.02);
        assert!(s.is_empty() && r.is_empty());
    }

    #[test]
    fn finds_floor_and_ceiling() {
        let prices = ranging_prices();
        let (supports, resistances) = detect_support_resistance(&prices, 5, 0.02);

        assert!(!supports.is_empty(), "expected at least one support");
        assert!(!resistances.is_empty(), "expected at least one resistance");
        assert!(supports.iter().all(|s| (*s - 90.0).abs() < 1.0));
        assert!(resistances.iter().all(|r| (*r - 110.0).abs() < 1.0));
    }

    #[test]
    fn clustering_merges_nearby_levels() {
        let clustered = cluster_levels(vec![100.0, 100.5, 101.0, 150.0, 151.0], 0.02);
        assert_eq!(clustered.len(), 2);
        assert!((clustered[0] - 100.5).abs() < 0.5);
        assert!((clustered[1] - 150.5).abs() < 0.5);
    }

    #[test]
    fn clustering_keeps_distant_levels_apart() {
        let clustered = cluster_levels(vec![100.0, 200.0, 300.0], 0.02);
        assert_eq!(clustered, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn volume_surge_detection() {
        let mut volumes = vec![100.0; 20];
        volumes.push(200.0);
        assert!(volume_surge(&volumes, 20, 1.5));

        let mut quiet = vec![100.0; 20];
        quiet.push(120.0);
        assert!(!volume_surge(&quiet, 20, 1.5));
    }

    #[test]
    fn volume_surge_needs_history() {
        assert!(!volume_surge(&[100.0, 200.0], 20, 1.5));
        assert!(!volume_surge(&[], 20, 1.5));
    }

    #[test]
    fn volume_surge_zero_average() {
        let mut volumes = vec![0.0; 20];
        volumes.push(50.0);
        assert!(!volume_surge(&volumes, 20, 1.5));
    }

    #[test]
    fn swing_points() {
        let prices = vec![5.0, 1.0, 9.0, 4.0];
        assert_eq!(swing_high_low(&prices, 4), Some((9.0, 1.0)));
        assert_eq!(swing_high_low(&prices, 2), Some((9.0, 4.0)));
        assert_eq!(swing_high_low(&prices, 5), None);
    }
}
