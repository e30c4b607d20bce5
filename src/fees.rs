// =============================================================================
// Fee Calculator — maker/taker fee math and profitability checks
// =============================================================================
//
// Kraken's default spot tiers: 0.16% maker (resting limit orders) and 0.26%
// taker (market orders). A round trip at taker rates therefore needs a 0.52%
// move just to break even, which is what the exit gates in the coordinator
// and strategies are protecting against.

use crate::types::PositionSide;

/// Computes trading fees and fee-aware P&L.
#[derive(Debug, Clone, Copy)]
pub struct FeeCalculator {
    maker_fee: f64,
    taker_fee: f64,
}

/// Result of a fee-aware P&L computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetPnl {
    pub gross: f64,
    pub total_fees: f64,
    pub net: f64,
}

impl FeeCalculator {
    /// `maker_fee` / `taker_fee` are decimals (0.0016 == 0.16%).
    pub fn new(maker_fee: f64, taker_fee: f64) -> Self {
        Self { maker_fee, taker_fee }
    }

    fn rate(&self, is_maker: bool) -> f64 {
        if is_maker {
            self.maker_fee
        } else {
            self.taker_fee
        }
    }

    /// Fee for a single fill of `trade_value` (price × volume) quote units.
    pub fn calculate_fee(&self, trade_value: f64, is_maker: bool) -> f64 {
        trade_value * self.rate(is_maker)
    }

    /// Total fee for a buy + sell round trip of the same value.
    pub fn roundtrip_fee(&self, trade_value: f64, is_maker: bool) -> f64 {
        2.0 * self.calculate_fee(trade_value, is_maker)
    }

    /// Minimum price move (as a decimal) needed to break even after a round
    /// trip of fees.
    pub fn breakeven_percent(&self, is_maker: bool) -> f64 {
        2.0 * self.rate(is_maker)
    }

    /// Whether exiting at `exit_price` clears fees plus `min_profit_threshold`.
    /// Returns the net profit fraction alongside the verdict.
    pub fn is_profitable(
        &self,
        entry_price: f64,
        exit_price: f64,
        side: PositionSide,
        is_maker: bool,
        min_profit_threshold: f64,
    ) -> (bool, f64) {
        let gross_pct = match side {
            PositionSide::Long => (exit_price - entry_price) / entry_price,
            PositionSide::Short => (entry_price - exit_price) / entry_price,
        };
        let net_pct = gross_pct - self.breakeven_percent(is_maker);
        (net_pct > min_profit_threshold, net_pct)
    }

    /// Fee-aware P&L for a closed position. Actual fees are used when known;
    /// otherwise both legs are estimated at taker rates.
    pub fn net_pnl(
        &self,
        entry_price: f64,
        exit_price: f64,
        volume: f64,
        side: PositionSide,
        entry_fee: Option<f64>,
        exit_fee: Option<f64>,
    ) -> NetPnl {
        let gross = match side {
            PositionSide::Long => (exit_price - entry_price) * volume,
            PositionSide::Short => (entry_price - exit_price) * volume,
        };

        let entry_fee = entry_fee.unwrap_or_else(|| self.calculate_fee(entry_price * volume, false));
        let exit_fee = exit_fee.unwrap_or_else(|| self.calculate_fee(exit_price * volume, false));
        let total_fees = entry_fee + exit_fee;

        NetPnl {
            gross,
            total_fees,
            net: gross - total_fees,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn calc() -> FeeCalculator {
        FeeCalculator::new(0.0016, 0.0026)
    }

    #[test]
    fn single_fill_fee() {
        let c = calc();
        assert!((c.calculate_fee(10_000.0, false) - 26.0).abs() < 1e-9);
        assert!((c.calculate_fee(10_000.0, true) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn roundtrip_is_double() {
        let c = calc();
        assert!((c.roundtrip_fee(10_000.0, false) - 52.0).abs() < 1e-9);
    }

    #[test]
    fn breakeven_percent() {
        let c = calc();
        assert!((c.breakeven_percent(false) - 0.0052).abs() < 1e-12);
        assert!((c.breakeven_percent(true) - 0.0032).abs() < 1e-12);
    }

    #[test]
    fn profitability_gate() {
        let c = calc();
        // +1% move at taker rates nets 0.48% — profitable with no threshold.
        let (ok, net) = c.is_profitable(100.0, 101.0, PositionSide::Long, false, 0.0);
        assert!(ok);
        assert!((net - 0.0048).abs() < 1e-9);

        // Same move fails a 0.5% threshold.
        let (ok, _) = c.is_profitable(100.0, 101.0, PositionSide::Long, false, 0.005);
        assert!(!ok);

        // Shorts profit on the way down.
        let (ok, _) = c.is_profitable(100.0, 98.0, PositionSide::Short, false, 0.0);
        assert!(ok);
    }

    #[test]
    fn net_pnl_with_actual_fees() {
        let c = calc();
        let pnl = c.net_pnl(100.0, 110.0, 2.0, PositionSide::Long, Some(0.5), Some(0.6));
        assert!((pnl.gross - 20.0).abs() < 1e-9);
        assert!((pnl.total_fees - 1.1).abs() < 1e-9);
        assert!((pnl.net - 18.9).abs() < 1e-9);
    }

    #[test]
    fn net_pnl_estimates_missing_fees_at_taker() {
        let c = calc();
        let pnl = c.net_pnl(100.0, 100.0, 1.0, PositionSide::Long, None, None);
        assert!((pnl.gross - 0.0).abs() < 1e-9);
        // 0.26% of 100 on both legs.
        assert!((pnl.total_fees - 0.52).abs() < 1e-9);
        assert!((pnl.net + 0.52).abs() < 1e-9);
    }

    #[test]
    fn net_pnl_short_sign() {
        let c = calc();
        let pnl = c.net_pnl(100.0, 110.0, 1.0, PositionSide::Short, Some(0.0), Some(0.0));
        assert!((pnl.gross + 10.0).abs() < 1e-9);
    }
}
