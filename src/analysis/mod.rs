// =============================================================================
// Market Analysis Module
// =============================================================================

pub mod analyzer;
pub mod market_state;

pub use analyzer::MarketAnalyzer;
pub use market_state::{MarketCondition, MarketState};
