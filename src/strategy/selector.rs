// =============================================================================
// Strategy Selector
// =============================================================================
//
// The canonical regime -> strategy mapping, and the factory that builds a
// fresh strategy instance for a symbol. Instances are never shared between
// symbols; switching always constructs a new one so no stale entry tracking
// or grid levels survive a regime change.

use tracing::info;

use crate::analysis::{MarketCondition, MarketState};
use crate::config::StrategyConfig;
use crate::strategy::breakout::Breakout;
use crate::strategy::grid::GridTrading;
use crate::strategy::macd::MacdStrategy;
use crate::strategy::mean_reversion::MeanReversion;
use crate::strategy::sma_crossover::SmaCrossover;
use crate::strategy::{Strategy, StrategyKind};

/// The fixed mapping from market state to strategy.
pub fn recommended_strategy(state: MarketState) -> StrategyKind {
    match state {
        MarketState::StrongUptrend | MarketState::StrongDowntrend => StrategyKind::SmaCrossover,
        MarketState::ModerateTrend => StrategyKind::Macd,
        MarketState::RangeBound | MarketState::Choppy => StrategyKind::MeanReversion,
        MarketState::VolatileBreakout => StrategyKind::Breakout,
        MarketState::LowVolatility => StrategyKind::Grid,
        MarketState::Unknown => StrategyKind::MeanReversion,
    }
}

/// Builds strategy instances from shared configuration.
pub struct StrategySelector {
    config: StrategyConfig,
}

impl StrategySelector {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Build the recommended strategy for a classified market.
    pub fn select(&self, condition: &MarketCondition, symbol: &str) -> Strategy {
        let kind = recommended_strategy(condition.state);
        info!(
            symbol,
            state = %condition.state,
            strategy = %kind,
            confidence = format!("{:.0}%", condition.confidence * 100.0),
            "strategy selected"
        );
        self.build(kind, symbol)
    }

    /// Construct a fresh instance of `kind` for `symbol`.
    pub fn build(&self, kind: StrategyKind, symbol: &str) -> Strategy {
        match kind {
            StrategyKind::MeanReversion => {
                Strategy::MeanReversion(MeanReversion::new(&self.config, symbol))
            }
            StrategyKind::SmaCrossover => Strategy::SmaCrossover(SmaCrossover::new(&self.config)),
            StrategyKind::Macd => Strategy::Macd(MacdStrategy::new(&self.config)),
            StrategyKind::Breakout => Strategy::Breakout(Breakout::new(&self.config)),
            StrategyKind::Grid => Strategy::Grid(GridTrading::new(&self.config)),
        }
    }
}
