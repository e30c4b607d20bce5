// =============================================================================
// Fibonacci Retracement / Extension Levels
// =============================================================================
//
// Linear levels anchored to a (swing_high, swing_low) pair.
//
// Retracements walk down from the swing high: 23.6 / 38.2 / 50 / 61.8 / 78.6
// percent of the swing span. Extensions project beyond the high for breakout
// targets: 127.2 / 161.8 / 200 / 261.8 percent.
//
// Proximity weighting turns "price is sitting on a level" into a confidence
// multiplier: 1.3 within 0.2% of any key level, otherwise the per-level
// weights below. 1.0 means no bonus.

/// A single Fibonacci level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibLevel {
    pub label: &'static str,
    pub price: f64,
}

/// Retracement levels from swing high down to swing low.
pub fn retracement_levels(swing_high: f64, swing_low: f64) -> Vec<FibLevel> {
    let diff = swing_high - swing_low;
    vec![
        FibLevel { label: "0.0%", price: swing_high },
        FibLevel { label: "23.6%", price: swing_high - diff * 0.236 },
        FibLevel { label: "38.2%", price: swing_high - diff * 0.382 },
        FibLevel { label: "50.0%", price: swing_high - diff * 0.500 },
        FibLevel { label: "61.8%", price: swing_high - diff * 0.618 },
        FibLevel { label: "78.6%", price: swing_high - diff * 0.786 },
        FibLevel { label: "100.0%", price: swing_low },
    ]
}

/// Extension levels projected above the swing high.
pub fn extension_levels(swing_high: f64, swing_low: f64) -> Vec<FibLevel> {
    let diff = swing_high - swing_low;
    vec![
        FibLevel { label: "0.0%", price: swing_high },
        FibLevel { label: "127.2%", price: swing_high + diff * 0.272 },
        FibLevel { label: "161.8%", price: swing_high + diff * 0.618 },
        FibLevel { label: "200.0%", price: swing_high + diff },
        FibLevel { label: "261.8%", price: swing_high + diff * 1.618 },
    ]
}

/// First level within `tolerance_percent` of `current_price`, if any.
pub fn nearest_level(
    current_price: f64,
    levels: &[FibLevel],
    tolerance_percent: f64,
) -> Option<FibLevel> {
    levels
        .iter()
        .find(|level| {
            level.price != 0.0
                && ((current_price - level.price) / level.price * 100.0).abs() <= tolerance_percent
        })
        .copied()
}

/// The retracement levels whose proximity strengthens a signal, with the
/// golden ratio weighted highest.
const KEY_LEVELS: &[&str] = &["38.2%", "50.0%", "61.8%"];

fn level_weight(label: &str) -> f64 {
    match label {
        "38.2%" | "50.0%" => 1.1,
        "61.8%" => 1.2,
        "78.6%" => 1.15,
        _ => 1.1,
    }
}

/// Confidence multiplier in [1.0, 1.3] from proximity to key retracement
/// levels. 1.3 when within 0.2% of a level; the per-level weight when merely
/// within `tolerance_percent`; 1.0 otherwise.
pub fn signal_strength(current_price: f64, levels: &[FibLevel], tolerance_percent: f64) -> f64 {
    let mut best = 1.0_f64;

    for level in levels {
        if !KEY_LEVELS.contains(&level.label) || level.price == 0.0 {
            continue;
        }

        let diff_percent = ((current_price - level.price) / level.price * 100.0).abs();
        if diff_percent <= tolerance_percent {
            let strength = if diff_percent <= 0.2 {
                1.3
            } else {
                level_weight(level.label)
            };
            best = best.max(strength);
        }
    }

    best
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn find(levels: &[FibLevel], label: &str) -> f64 {
        levels.iter().find(|l| l.label == label).unwrap().price
    }

    #[test]
    fn retracement_values() {
        let levels = retracement_levels(110_000.0, 100_000.0);
        assert!((find(&levels, "0.0%") - 110_000.0).abs() < 1e-6);
        assert!((find(&levels, "23.6%") - 107_640.0).abs() < 1e-6);
        assert!((find(&levels, "50.0%") - 105_000.0).abs() < 1e-6);
        assert!((find(&levels, "61.8%") - 103_820.0).abs() < 1e-6);
        assert!((find(&levels, "100.0%") - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn extension_values() {
        let levels = extension_levels(110_000.0, 100_000.0);
        assert!((find(&levels, "127.2%") - 112_720.0).abs() < 1e-6);
        assert!((find(&levels, "161.8%") - 116_180.0).abs() < 1e-6);
        assert!((find(&levels, "200.0%") - 120_000.0).abs() < 1e-6);
        assert!((find(&levels, "261.8%") - 126_180.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_level_lookup() {
        let levels = retracement_levels(110_000.0, 100_000.0);
        let near = nearest_level(103_820.0, &levels, 0.5).unwrap();
        assert_eq!(near.label, "61.8%");

        assert!(nearest_level(130_000.0, &levels, 0.5).is_none());
    }

    #[test]
    fn strength_at_exact_level() {
        let levels = retracement_levels(110_000.0, 100_000.0);
        // Sitting on the golden ratio: exact-level bonus.
        let strength = signal_strength(103_820.0, &levels, 1.0);
        assert!((strength - 1.3).abs() < 1e-12);
    }

    #[test]
    fn strength_near_but_not_exact() {
        let levels = retracement_levels(110_000.0, 100_000.0);
        // ~0.5% away from 61.8%: inside tolerance, outside the 0.2% band.
        let strength = signal_strength(104_340.0, &levels, 1.0);
        assert!((strength - 1.2).abs() < 1e-12);
    }

    #[test]
    fn strength_away_from_levels_is_neutral() {
        let levels = retracement_levels(110_000.0, 100_000.0);
        let strength = signal_strength(101_500.0, &levels, 1.0);
        assert!((strength - 1.0).abs() < 1e-12);
    }

    #[test]
    fn strength_only_counts_key_levels() {
        let levels = retracement_levels(110_000.0, 100_000.0);
        // 23.6% is not a key level, so proximity to it earns nothing.
        let strength = signal_strength(107_640.0, &levels, 1.0);
        assert!((strength - 1.0).abs() < 1e-12);
    }
}
