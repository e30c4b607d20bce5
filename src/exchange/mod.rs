// =============================================================================
// Exchange Module — the narrow seam between the engine and the wire
// =============================================================================
//
// The core only ever talks to [`ExchangeClient`]. The concrete Kraken client
// owns HTTP, signing, retries, and pair-name normalization; everything it
// hands back is already keyed by the engine's own symbols and typed. Tests
// drive the coordinator with a scripted implementation of the same trait.

pub mod client;
pub mod normalize;

pub use client::KrakenClient;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ExchangeError;
use crate::market_data::Candle;
use crate::types::OrderSide;

/// Order execution style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of one pair's ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerInfo {
    pub last: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
}

/// Exchange-imposed order constraints for a pair. Cached by the client and
/// refreshed only on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetPairRules {
    pub lot_decimals: u32,
    pub pair_decimals: u32,
    pub tick_size: Option<f64>,
    pub ordermin: Option<f64>,
    pub costmin: Option<f64>,
}

/// Result of an accepted order submission.
#[derive(Debug, Clone, Default)]
pub struct OrderResult {
    pub txid: Option<String>,
    pub description: Option<String>,
}

/// Everything the engine needs from an exchange.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Server wall clock, epoch seconds. Used as a connectivity probe.
    async fn get_server_time(&self) -> Result<i64, ExchangeError>;

    /// Equivalent balance (`eb`) for `asset` — the quote buying power.
    async fn get_trade_balance(&self, asset: &str) -> Result<f64, ExchangeError>;

    /// Batched ticker for several pairs, keyed by the *requested* symbols.
    /// Pairs missing from the response are absent from the map.
    async fn get_ticker(
        &self,
        pairs: &[String],
    ) -> Result<HashMap<String, TickerInfo>, ExchangeError>;

    /// OHLC rows for one pair plus the exchange's `last` watermark. Rows are
    /// in exchange order; committed-candle filtering is the cache's job.
    async fn get_ohlc(
        &self,
        pair: &str,
        interval_min: u32,
        since: Option<i64>,
    ) -> Result<(Vec<Candle>, Option<i64>), ExchangeError>;

    /// Order constraints for a pair (cached).
    async fn get_asset_pair_rules(&self, pair: &str) -> Result<AssetPairRules, ExchangeError>;

    /// Submit an order. `validate` submits for validation only.
    async fn add_order(
        &self,
        pair: &str,
        side: OrderSide,
        ordertype: OrderType,
        volume: f64,
        price: Option<f64>,
        validate: bool,
    ) -> Result<OrderResult, ExchangeError>;

    /// Resolve the actual fee for a settled trade from the ledger, polling
    /// until `max_wait` elapses. Returns 0.0 when the entry never appears.
    async fn get_trade_actual_fee(
        &self,
        txid: &str,
        max_wait: Duration,
    ) -> Result<f64, ExchangeError>;
}
