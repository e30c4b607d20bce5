// =============================================================================
// Error taxonomy
// =============================================================================
//
// Expected conditions are values, not panics:
//   - ConfigError      halts startup (the only unrecoverable besides losing
//                      the store file).
//   - ExchangeError    transient variants are retried by the client with
//                      backoff; auth/api surface immediately and the tick
//                      moves on to the next instrument.
//   - OrderRejection   normalization failures; the order is skipped with no
//                      state change.
//
// Store failures travel as rusqlite errors wrapped in anyhow at the
// coordinator boundary, where they are logged and the loop continues.

use thiserror::Error;

/// Missing or unparseable configuration. Halts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config key: {0} (set it in .env or the environment)")]
    MissingKey(&'static str),

    #[error("config key {key} must be a {expected}, got {value:?}")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Typed failures from the exchange client.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Timeout / connection reset. Retried with backoff; surfaces as this
    /// variant once retries are exhausted.
    #[error("transport failed after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    /// Signature or permission rejection. Never retried.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Exchange-level error payload (EGeneral, EOrder, ...). Never retried.
    #[error("exchange API error: {0}")]
    Api(String),

    /// The requested pair does not exist in the exchange response.
    #[error("unknown trading pair: {0}")]
    InvalidPair(String),

    /// Response body did not match the expected shape.
    #[error("malformed exchange response: {0}")]
    Malformed(String),
}

impl ExchangeError {
    /// Whether the error class is worth retrying at the transport layer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Order normalization rejections. Callers skip the order; nothing crashes.
#[derive(Debug, Error, PartialEq)]
pub enum OrderRejection {
    #[error("order volume {volume} below exchange minimum {ordermin}")]
    VolumeBelowMin { volume: f64, ordermin: f64 },

    #[error("order cost {cost} below exchange minimum {costmin}")]
    CostBelowMin { cost: f64, costmin: f64 },

    #[error("order price rounds to zero")]
    PriceRoundsToZero,

    #[error("order volume rounds to zero")]
    VolumeRoundsToZero,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let e = ExchangeError::Transient {
            attempts: 3,
            message: "timed out".into(),
        };
        assert!(e.is_transient());
        assert!(!ExchangeError::Auth("bad key".into()).is_transient());
        assert!(!ExchangeError::Api("EOrder:Insufficient funds".into()).is_transient());
        assert!(!ExchangeError::InvalidPair("NOPEUSD".into()).is_transient());
    }

    #[test]
    fn config_error_messages_name_the_key() {
        let e = ConfigError::MissingKey("TRADING_PAIRS");
        assert!(e.to_string().contains("TRADING_PAIRS"));

        let e = ConfigError::InvalidValue {
            key: "OHLC_INTERVAL",
            expected: "integer",
            value: "abc".into(),
        };
        assert!(e.to_string().contains("OHLC_INTERVAL"));
        assert!(e.to_string().contains("abc"));
    }

    #[test]
    fn rejection_equality() {
        assert_eq!(
            OrderRejection::PriceRoundsToZero,
            OrderRejection::PriceRoundsToZero
        );
        assert_ne!(
            OrderRejection::PriceRoundsToZero,
            OrderRejection::VolumeRoundsToZero
        );
    }
}
