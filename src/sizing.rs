// =============================================================================
// Portfolio Sizing — pure quote-allocation math
// =============================================================================
//
// No API calls, no shared state: these functions take a balance snapshot by
// value so the coordinator can reason about one consistent number per tick.
//
//   per_coin = balance * exposure/100 * (1 - fee_buffer/100) / num_coins
//
// The multi-coin coordinator further caps each allocation by `max_per_coin`
// percent of the balance, and converts quote value to base volume at the
// current price.

/// Equal-split allocation of a quote balance across `num_coins` instruments.
///
/// Percentages are clamped to [0, 100]. Returns 0 when the balance or coin
/// count is non-positive, the exposure is zero, or the fee buffer consumes
/// everything.
pub fn equal_split_quote_allocation(
    quote_balance: f64,
    num_coins: usize,
    fee_buffer_pct: f64,
    exposure_pct: f64,
) -> f64 {
    if quote_balance <= 0.0 || num_coins == 0 {
        return 0.0;
    }

    let exposure_pct = exposure_pct.clamp(0.0, 100.0);
    let fee_buffer_pct = fee_buffer_pct.clamp(0.0, 100.0);

    if exposure_pct <= 0.0 || fee_buffer_pct >= 100.0 {
        return 0.0;
    }

    let usable = quote_balance * (exposure_pct / 100.0) * (1.0 - fee_buffer_pct / 100.0);
    if usable <= 0.0 {
        return 0.0;
    }

    usable / num_coins as f64
}

/// Cap a per-coin quote allocation by `max_per_coin_pct` of the balance.
pub fn cap_per_coin(quote_value: f64, balance: f64, max_per_coin_pct: f64) -> f64 {
    let cap = balance * max_per_coin_pct.clamp(0.0, 100.0) / 100.0;
    quote_value.min(cap).max(0.0)
}

/// Convert a quote-currency value into base volume at `price`.
pub fn quote_to_volume(quote_value: f64, price: f64) -> f64 {
    if price > 0.0 {
        quote_value / price
    } else {
        0.0
    }
}
