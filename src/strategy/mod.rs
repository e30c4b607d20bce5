// =============================================================================
// Strategy Family
// =============================================================================
//
// Five strategies behind one tagged variant. Each converts a committed OHLC
// series into an optional buy/sell signal and owns nothing beyond its own
// memory (previous indicator values, entry tracking, grid bookkeeping).
// Account state, order placement, and persistence all live with the
// coordinator — a strategy can be dropped and rebuilt at any time.

pub mod breakout;
pub mod grid;
pub mod macd;
pub mod mean_reversion;
pub mod selector;
pub mod sma_crossover;

pub use selector::{recommended_strategy, StrategySelector};

use serde::{Deserialize, Serialize};

use crate::analysis::MarketState;
use crate::market_data::OhlcSeries;
use crate::types::{PositionSide, Signal};

use breakout::Breakout;
use grid::GridTrading;
use macd::MacdStrategy;
use mean_reversion::MeanReversion;
use sma_crossover::SmaCrossover;

// =============================================================================
// StrategyKind — the single name table
// =============================================================================

/// Identifies a strategy family member. The `as_str` forms are the only
/// strategy names that ever reach logs or the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    MeanReversion,
    SmaCrossover,
    Macd,
    Breakout,
    Grid,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MeanReversion => "mean_reversion",
            Self::SmaCrossover => "sma_crossover",
            Self::Macd => "macd",
            Self::Breakout => "breakout",
            Self::Grid => "grid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mean_reversion" => Some(Self::MeanReversion),
            "sma_crossover" => Some(Self::SmaCrossover),
            "macd" => Some(Self::Macd),
            "breakout" => Some(Self::Breakout),
            "grid" => Some(Self::Grid),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Shared strategy memory
// =============================================================================

/// State every strategy carries: the position it believes it holds, the last
/// signal it emitted, and the regime the controller last told it about.
#[derive(Debug, Clone, Default)]
pub struct StrategyCore {
    pub position: Option<PositionSide>,
    pub last_signal: Option<Signal>,
    pub market_state: Option<MarketState>,
}

impl StrategyCore {
    pub fn is_long(&self) -> bool {
        self.position == Some(PositionSide::Long)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// Strategy — tagged variant with shared capability surface
// =============================================================================

/// A strategy instance. Built by [`StrategySelector`], driven by the
/// per-instrument controller.
#[derive(Debug)]
pub enum Strategy {
    MeanReversion(MeanReversion),
    SmaCrossover(SmaCrossover),
    Macd(MacdStrategy),
    Breakout(Breakout),
    Grid(GridTrading),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::MeanReversion(_) => StrategyKind::MeanReversion,
            Self::SmaCrossover(_) => StrategyKind::SmaCrossover,
            Self::Macd(_) => StrategyKind::Macd,
            Self::Breakout(_) => StrategyKind::Breakout,
            Self::Grid(_) => StrategyKind::Grid,
        }
    }

    /// Run the strategy over the committed series. Returns `None` on
    /// insufficient data or when no entry/exit condition is met.
    pub fn analyze(&mut self, series: &OhlcSeries) -> Option<Signal> {
        match self {
            Self::MeanReversion(s) => s.analyze(series),
            Self::SmaCrossover(s) => s.analyze(series),
            Self::Macd(s) => s.analyze(series),
            Self::Breakout(s) => s.analyze(series),
            Self::Grid(s) => s.analyze(series),
        }
    }

    /// Clear all strategy-local memory.
    pub fn reset(&mut self) {
        match self {
            Self::MeanReversion(s) => s.reset(),
            Self::SmaCrossover(s) => s.reset(),
            Self::Macd(s) => s.reset(),
            Self::Breakout(s) => s.reset(),
            Self::Grid(s) => s.reset(),
        }
    }

    fn core(&self) -> &StrategyCore {
        match self {
            Self::MeanReversion(s) => &s.core,
            Self::SmaCrossover(s) => &s.core,
            Self::Macd(s) => &s.core,
            Self::Breakout(s) => &s.core,
            Self::Grid(s) => &s.core,
        }
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        match self {
            Self::MeanReversion(s) => &mut s.core,
            Self::SmaCrossover(s) => &mut s.core,
            Self::Macd(s) => &mut s.core,
            Self::Breakout(s) => &mut s.core,
            Self::Grid(s) => &mut s.core,
        }
    }

    pub fn position(&self) -> Option<PositionSide> {
        self.core().position
    }

    pub fn update_position(&mut self, position: Option<PositionSide>) {
        self.core_mut().position = position;
    }

    pub fn last_signal(&self) -> Option<Signal> {
        self.core().last_signal
    }

    pub fn update_signal(&mut self, signal: Signal) {
        self.core_mut().last_signal = Some(signal);
    }

    pub fn update_market_state(&mut self, state: MarketState) {
        self.core_mut().market_state = Some(state);
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_string_roundtrip() {
        for kind in [
            StrategyKind::MeanReversion,
            StrategyKind::SmaCrossover,
            StrategyKind::Macd,
            StrategyKind::Breakout,
            StrategyKind::Grid,
        ] {
            assert_eq!(StrategyKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(StrategyKind::parse("momentum"), None);
    }

    #[test]
    fn core_position_helpers() {
        let mut core = StrategyCore::default();
        assert!(!core.is_long());

        core.position = Some(PositionSide::Long);
        assert!(core.is_long());

        core.reset();
        assert!(core.position.is_none());
        assert!(core.last_signal.is_none());
    }
}
