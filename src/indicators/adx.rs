// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// Quantifies trend strength regardless of direction.
//
//   1. Per bar: +DM = max(H_i - H_{i-1}, 0) only when the up-move exceeds the
//      down-move; -DM symmetric. True Range as for ATR.
//   2. Window means of +DM / -DM / TR over `period` bars.
//   3. +DI = 100 * mean(+DM) / mean(TR), -DI symmetric.
//   4. DX = 100 * |+DI - -DI| / (+DI + -DI).
//   5. ADX = mean of the last `period` DX values.
//
// Interpretation: ADX > 25 trending, ADX < 20 ranging.

/// ADX over parallel high/low/close slices.
///
/// Returns `None` when `period` is zero, fewer than `2 * period` bars are
/// available, or the true range collapses to zero across a window.
pub fn calculate_adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let n = highs.len().min(lows.len()).min(closes.len());
    if n < period * 2 {
        return None;
    }

    // --- Per-transition directional movement and true range ------------------
    let transitions = n - 1;
    let mut plus_dm = Vec::with_capacity(transitions);
    let mut minus_dm = Vec::with_capacity(transitions);
    let mut tr = Vec::with_capacity(transitions);

    for i in 1..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];

        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });

        let range = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        tr.push(range);
    }

    // --- DI / DX per window ending at each transition ------------------------
    let window_mean = |xs: &[f64], end: usize| -> f64 {
        xs[end + 1 - period..=end].iter().sum::<f64>() / period as f64
    };

    let mut dx_values = Vec::with_capacity(transitions - period + 1);
    for end in period - 1..transitions {
        let atr = window_mean(&tr, end);
        if atr <= 0.0 {
            continue;
        }

        let plus_di = window_mean(&plus_dm, end) / atr * 100.0;
        let minus_di = window_mean(&minus_dm, end) / atr * 100.0;

        let di_sum = plus_di + minus_di;
        if di_sum > 0.0 {
            dx_values.push((plus_di - minus_di).abs() / di_sum * 100.0);
        }
    }

    if dx_values.len() < period {
        return None;
    }

    let adx = dx_values[dx_values.len() - period..].iter().sum::<f64>() / period as f64;
    Some(adx)
}
