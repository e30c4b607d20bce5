// =============================================================================
// Shared types used across the Saffron trading engine
// =============================================================================
//
// One enum per concept, one string table per enum. The string forms are what
// the store persists and what the dashboard reads, so they never change shape
// based on context.

use serde::{Deserialize, Serialize};

/// A directional trading signal emitted by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order side sent to the exchange. Mirrors [`Signal`] but kept separate so
/// the order path never accidentally consumes an unvetted strategy signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of an open position. Spot mode only ever opens longs, but the
/// store and P&L math handle both so the schema stays honest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "long" => Some(Self::Long),
            "short" => Some(Self::Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a trade record opens or closes a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Entry,
    Exit,
}

impl TradeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a stored position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
    Cancelled,
}

impl PositionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_strings() {
        assert_eq!(Signal::Buy.as_str(), "buy");
        assert_eq!(Signal::Sell.as_str(), "sell");
        assert_eq!(format!("{}", Signal::Buy), "buy");
    }

    #[test]
    fn position_side_roundtrip() {
        assert_eq!(PositionSide::parse("long"), Some(PositionSide::Long));
        assert_eq!(PositionSide::parse("short"), Some(PositionSide::Short));
        assert_eq!(PositionSide::parse("sideways"), None);
        assert_eq!(
            PositionSide::parse(PositionSide::Long.as_str()),
            Some(PositionSide::Long)
        );
    }

    #[test]
    fn position_status_roundtrip() {
        for status in [
            PositionStatus::Open,
            PositionStatus::Closed,
            PositionStatus::Cancelled,
        ] {
            assert_eq!(PositionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PositionStatus::parse("pending"), None);
    }

    #[test]
    fn trade_type_strings() {
        assert_eq!(TradeType::Entry.as_str(), "entry");
        assert_eq!(TradeType::Exit.as_str(), "exit");
    }
}
