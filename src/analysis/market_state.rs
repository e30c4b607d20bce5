// =============================================================================
// Market State and Condition
// =============================================================================
//
// The eight regimes the classifier can emit, plus the immutable snapshot
// (indicator values + confidence) that produced each classification. The
// string forms are persisted to the store, so they are the single source of
// truth for naming.

use serde::{Deserialize, Serialize};

/// High-level market regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketState {
    StrongUptrend,
    StrongDowntrend,
    ModerateTrend,
    RangeBound,
    VolatileBreakout,
    Choppy,
    LowVolatility,
    Unknown,
}

impl MarketState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrongUptrend => "strong_uptrend",
            Self::StrongDowntrend => "strong_downtrend",
            Self::ModerateTrend => "moderate_trend",
            Self::RangeBound => "range_bound",
            Self::VolatileBreakout => "volatile_breakout",
            Self::Choppy => "choppy",
            Self::LowVolatility => "low_volatility",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this regime has a directional component.
    pub fn is_trending(self) -> bool {
        matches!(
            self,
            Self::StrongUptrend | Self::StrongDowntrend | Self::ModerateTrend
        )
    }

    pub fn is_uptrend(self) -> bool {
        matches!(self, Self::StrongUptrend)
    }

    pub fn is_downtrend(self) -> bool {
        matches!(self, Self::StrongDowntrend)
    }
}

impl std::fmt::Display for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable snapshot of one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    pub state: MarketState,
    pub adx: Option<f64>,
    pub atr: Option<f64>,
    pub range_percent: Option<f64>,
    pub choppiness: Option<f64>,
    pub slope: Option<f64>,
    /// Confidence in the classification, in [0, 1].
    pub confidence: f64,
    pub description: String,
}

impl MarketCondition {
    /// An UNKNOWN condition carrying only a description.
    pub fn unknown(description: impl Into<String>) -> Self {
        Self {
            state: MarketState::Unknown,
            adx: None,
            atr: None,
            range_percent: None,
            choppiness: None,
            slope: None,
            confidence: 0.0,
            description: description.into(),
        }
    }
}

impl std::fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(adx) = self.adx {
            write!(f, " | ADX {adx:.1}")?;
        }
        if let Some(range) = self.range_percent {
            write!(f, " | range {range:.1}%")?;
        }
        if let Some(chop) = self.choppiness {
            write!(f, " | chop {chop:.1}")?;
        }
        write!(f, " | confidence {:.0}%", self.confidence * 100.0)
    }
}
