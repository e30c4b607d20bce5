// =============================================================================
// Kraken REST API Client — HMAC-SHA512 signed requests
// =============================================================================
//
// SECURITY: the secret is held only long enough to key the HMAC and is never
// logged or serialized; the Debug impl redacts both credentials.
//
// Signature scheme (private endpoints):
//   API-Sign = base64( HMAC-SHA512( path + SHA256(nonce + postdata),
//                                   base64decode(secret) ) )
//
// Transport policy: one reqwest client with a 45 s timeout; transient
// failures (timeout, connection reset, 5xx) retry up to 3 times with 2/4/8 s
// backoff; exchange-level errors surface immediately as Auth or Api.
//
// Pair-name normalization: Kraken responses key pairs as XXBTZUSD where the
// engine says XBTUSD. All resolution happens here — results are re-keyed by
// the requested symbols and the core never sees a raw exchange key.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha2::{Digest, Sha256, Sha512};
use tracing::{debug, info, warn};

use crate::errors::ExchangeError;
use crate::exchange::{AssetPairRules, ExchangeClient, OrderResult, OrderType, TickerInfo};
use crate::market_data::Candle;
use crate::types::OrderSide;

type HmacSha512 = Hmac<Sha512>;

const BASE_URL: &str = "https://api.kraken.com";
const API_VERSION: &str = "0";

/// Request timeout. Kraken can be slow under load.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Transient-failure retries and their backoff schedule (2s, 4s, 8s).
const MAX_RETRIES: u32 = 3;

/// Ledger polling cadence inside `get_trade_actual_fee`.
const LEDGER_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct KrakenClient {
    api_key: String,
    api_secret: String,
    base_url: String,
    client: reqwest::Client,
    /// AssetPairs metadata cache, keyed by the requested pair name.
    pair_rules: RwLock<HashMap<String, AssetPairRules>>,
}

impl KrakenClient {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("SaffronBot/1.0")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");

        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: BASE_URL.to_string(),
            client,
            pair_rules: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    // -------------------------------------------------------------------------
    // Signing
    // -------------------------------------------------------------------------

    /// Kraken API-Sign for `path` and an already-encoded post body.
    fn sign(&self, path: &str, nonce: &str, postdata: &str) -> Result<String, ExchangeError> {
        let secret = BASE64
            .decode(&self.api_secret)
            .map_err(|_| ExchangeError::Auth("API secret is not valid base64".into()))?;

        let mut sha = Sha256::new();
        sha.update(nonce.as_bytes());
        sha.update(postdata.as_bytes());
        let digest = sha.finalize();

        let mut mac = HmacSha512::new_from_slice(&secret)
            .map_err(|_| ExchangeError::Auth("API secret has invalid length".into()))?;
        mac.update(path.as_bytes());
        mac.update(&digest);

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn nonce() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().to_string())
            .unwrap_or_else(|_| "0".to_string())
    }

    // -------------------------------------------------------------------------
    // Transport with retry
    // -------------------------------------------------------------------------

    /// Issue one public (GET) or private (signed POST) request and unwrap
    /// Kraken's `{error: [...], result: {...}}` envelope.
    async fn request(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        private: bool,
    ) -> Result<serde_json::Value, ExchangeError> {
        let path = if private {
            format!("/{API_VERSION}/private/{endpoint}")
        } else {
            format!("/{API_VERSION}/public/{endpoint}")
        };
        let url = format!("{}{}", self.base_url, path);

        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            let outcome = if private {
                if self.api_key.is_empty() || self.api_secret.is_empty() {
                    return Err(ExchangeError::Auth(
                        "API key and secret required for private endpoints".into(),
                    ));
                }

                let nonce = Self::nonce();
                let mut body = format!("nonce={nonce}");
                for (key, value) in params {
                    body.push_str(&format!("&{key}={value}"));
                }
                let signature = self.sign(&path, &nonce, &body)?;

                self.client
                    .post(&url)
                    .header("API-Key", &self.api_key)
                    .header("API-Sign", signature)
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(body)
                    .send()
                    .await
            } else {
                let query: Vec<(String, String)> = params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect();
                self.client.get(&url).query(&query).send().await
            };

            let response = match outcome {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_error = Some(format!("{e}"));
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_secs(2u64.pow(attempt));
                        warn!(
                            endpoint,
                            attempt,
                            backoff_secs = backoff.as_secs(),
                            "transient transport failure — retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    return Err(ExchangeError::Api(format!("request failed: {e}")));
                }
            };

            let status = response.status();
            if status.is_server_error() {
                last_error = Some(format!("HTTP {status}"));
                if attempt < MAX_RETRIES {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    warn!(endpoint, %status, attempt, "server error — retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ExchangeError::Malformed(format!("invalid JSON from {endpoint}: {e}")))?;

            if let Some(errors) = body.get("error").and_then(|e| e.as_array()) {
                if !errors.is_empty() {
                    let message = errors
                        .iter()
                        .filter_map(|e| e.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(classify_api_error(&message));
                }
            }

            return body
                .get("result")
                .cloned()
                .ok_or_else(|| ExchangeError::Malformed(format!("{endpoint}: missing result")));
        }

        Err(ExchangeError::Transient {
            attempts: MAX_RETRIES,
            message: last_error.unwrap_or_else(|| "unknown transport failure".into()),
        })
    }

    // -------------------------------------------------------------------------
    // Pair-name resolution
    // -------------------------------------------------------------------------

    /// Kraken's historical X/Z-prefixed aliases for a requested pair.
    fn pair_variations(pair: &str) -> Vec<String> {
        vec![
            pair.to_string(),
            pair.replace("XBT", "XXBT").replace("USD", "ZUSD"),
            pair.replace("ETH", "XETH").replace("USD", "ZUSD"),
            pair.replace("XRP", "XXRP").replace("USD", "ZUSD"),
            pair.replace("XMR", "XXMR").replace("USD", "ZUSD"),
        ]
    }

    /// Find the response key corresponding to `pair`.
    fn resolve_pair_key<'a>(
        pair: &str,
        result: &'a serde_json::Map<String, serde_json::Value>,
    ) -> Option<&'a str> {
        for variation in Self::pair_variations(pair) {
            if let Some(key) = result.keys().find(|k| **k == variation) {
                return Some(key.as_str());
            }
        }

        // AssetPairs-style responses carry the requested name as `altname`.
        result
            .iter()
            .find(|(_, info)| info.get("altname").and_then(|a| a.as_str()) == Some(pair))
            .map(|(key, _)| key.as_str())
    }
}

/// Auth-shaped exchange errors never retry and should read differently in
/// the logs than ordinary order rejections.
fn classify_api_error(message: &str) -> ExchangeError {
    if message.starts_with("EAPI")
        || message.starts_with("EAuth")
        || message.contains("Permission denied")
        || message.contains("Invalid key")
        || message.contains("Invalid signature")
        || message.contains("Invalid nonce")
    {
        ExchangeError::Auth(message.to_string())
    } else if message.contains("Unknown asset pair") {
        ExchangeError::InvalidPair(message.to_string())
    } else {
        ExchangeError::Api(message.to_string())
    }
}

// =============================================================================
// Payload parsing helpers
// =============================================================================

/// Kraken encodes numbers as strings in most payloads; accept both.
fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// First element of an array field like `c: ["97123.4", "0.01"]`.
fn array_head_f64(info: &serde_json::Value, field: &str) -> Option<f64> {
    info.get(field)
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(value_to_f64)
}

fn array_nth_f64(info: &serde_json::Value, field: &str, index: usize) -> Option<f64> {
    info.get(field)
        .and_then(|v| v.as_array())
        .and_then(|a| a.get(index))
        .and_then(value_to_f64)
}

/// Parse one OHLC row: `[time, open, high, low, close, vwap, volume, count]`.
fn parse_ohlc_row(row: &serde_json::Value) -> Option<Candle> {
    let row = row.as_array()?;
    if row.len() < 8 {
        return None;
    }

    Some(Candle {
        time: row[0].as_i64()?,
        open: value_to_f64(&row[1])?,
        high: value_to_f64(&row[2])?,
        low: value_to_f64(&row[3])?,
        close: value_to_f64(&row[4])?,
        vwap: value_to_f64(&row[5])?,
        volume: value_to_f64(&row[6])?,
        count: row[7].as_u64().unwrap_or(0) as u32,
    })
}

fn parse_ticker_info(info: &serde_json::Value) -> Option<TickerInfo> {
    Some(TickerInfo {
        last: array_head_f64(info, "c")?,
        high_24h: array_nth_f64(info, "h", 1).or_else(|| array_head_f64(info, "h"))?,
        low_24h: array_nth_f64(info, "l", 1).or_else(|| array_head_f64(info, "l"))?,
        volume_24h: array_nth_f64(info, "v", 1).or_else(|| array_head_f64(info, "v"))?,
    })
}

fn parse_pair_rules(info: &serde_json::Value) -> AssetPairRules {
    AssetPairRules {
        lot_decimals: info.get("lot_decimals").and_then(|v| v.as_u64()).unwrap_or(8) as u32,
        pair_decimals: info.get("pair_decimals").and_then(|v| v.as_u64()).unwrap_or(5) as u32,
        tick_size: info.get("tick_size").and_then(value_to_f64),
        ordermin: info.get("ordermin").and_then(value_to_f64),
        costmin: info.get("costmin").and_then(value_to_f64),
    }
}

// =============================================================================
// ExchangeClient implementation
// =============================================================================

#[async_trait]
impl ExchangeClient for KrakenClient {
    async fn get_server_time(&self) -> Result<i64, ExchangeError> {
        let result = self.request("Time", &[], false).await?;
        result
            .get("unixtime")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ExchangeError::Malformed("Time: missing unixtime".into()))
    }

    async fn get_trade_balance(&self, asset: &str) -> Result<f64, ExchangeError> {
        let result = self
            .request("TradeBalance", &[("asset", asset.to_string())], true)
            .await?;
        result
            .get("eb")
            .and_then(value_to_f64)
            .ok_or_else(|| ExchangeError::Malformed("TradeBalance: missing eb".into()))
    }

    async fn get_ticker(
        &self,
        pairs: &[String],
    ) -> Result<HashMap<String, TickerInfo>, ExchangeError> {
        let result = self
            .request("Ticker", &[("pair", pairs.join(","))], false)
            .await?;
        let map = result
            .as_object()
            .ok_or_else(|| ExchangeError::Malformed("Ticker: result is not an object".into()))?;

        let mut tickers = HashMap::new();
        for pair in pairs {
            match Self::resolve_pair_key(pair, map).and_then(|key| map.get(key)) {
                Some(info) => {
                    if let Some(ticker) = parse_ticker_info(info) {
                        tickers.insert(pair.clone(), ticker);
                    } else {
                        warn!(pair, "ticker entry could not be parsed");
                    }
                }
                None => warn!(pair, "pair missing from ticker response"),
            }
        }

        if tickers.is_empty() && !pairs.is_empty() {
            return Err(ExchangeError::InvalidPair(pairs.join(",")));
        }

        debug!(count = tickers.len(), "ticker batch fetched");
        Ok(tickers)
    }

    async fn get_ohlc(
        &self,
        pair: &str,
        interval_min: u32,
        since: Option<i64>,
    ) -> Result<(Vec<Candle>, Option<i64>), ExchangeError> {
        let mut params = vec![
            ("pair", pair.to_string()),
            ("interval", interval_min.to_string()),
        ];
        if let Some(since) = since {
            params.push(("since", since.to_string()));
        }

        let result = self.request("OHLC", &params, false).await?;
        let map = result
            .as_object()
            .ok_or_else(|| ExchangeError::Malformed("OHLC: result is not an object".into()))?;

        let last = map.get("last").and_then(|v| v.as_i64());

        // The pair key is whatever isn't `last`.
        let rows = map
            .iter()
            .find(|(key, _)| key.as_str() != "last")
            .and_then(|(_, v)| v.as_array())
            .ok_or_else(|| ExchangeError::InvalidPair(pair.to_string()))?;

        let candles: Vec<Candle> = rows.iter().filter_map(parse_ohlc_row).collect();
        debug!(pair, count = candles.len(), "ohlc fetched");
        Ok((candles, last))
    }

    async fn get_asset_pair_rules(&self, pair: &str) -> Result<AssetPairRules, ExchangeError> {
        if let Some(rules) = self.pair_rules.read().get(pair) {
            return Ok(*rules);
        }

        let result = self
            .request("AssetPairs", &[("pair", pair.to_string())], false)
            .await?;
        let map = result
            .as_object()
            .ok_or_else(|| ExchangeError::Malformed("AssetPairs: result is not an object".into()))?;

        let key = Self::resolve_pair_key(pair, map)
            .or_else(|| map.keys().next().map(|k| k.as_str()))
            .ok_or_else(|| ExchangeError::InvalidPair(pair.to_string()))?;
        let rules = parse_pair_rules(&map[key]);

        self.pair_rules.write().insert(pair.to_string(), rules);
        info!(pair, ?rules, "asset pair rules cached");
        Ok(rules)
    }

    async fn add_order(
        &self,
        pair: &str,
        side: OrderSide,
        ordertype: OrderType,
        volume: f64,
        price: Option<f64>,
        validate: bool,
    ) -> Result<OrderResult, ExchangeError> {
        let mut params = vec![
            ("pair", pair.to_string()),
            ("type", side.as_str().to_string()),
            ("ordertype", ordertype.as_str().to_string()),
            ("volume", volume.to_string()),
        ];
        if let Some(price) = price {
            params.push(("price", price.to_string()));
        }
        if validate {
            params.push(("validate", "true".to_string()));
        }

        info!(pair, side = %side, %ordertype, volume, ?price, validate, "submitting order");
        let result = self.request("AddOrder", &params, true).await?;

        let txid = result
            .get("txid")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let description = result
            .pointer("/descr/order")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        info!(pair, ?txid, "order accepted");
        Ok(OrderResult { txid, description })
    }

    async fn get_trade_actual_fee(
        &self,
        txid: &str,
        max_wait: Duration,
    ) -> Result<f64, ExchangeError> {
        let deadline = Instant::now() + max_wait;

        while Instant::now() < deadline {
            let ledger = match self
                .request("QueryLedgers", &[("type", "trade".to_string())], true)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(txid, error = %e, "ledger query failed while resolving fee");
                    break;
                }
            };

            if let Some(entries) = ledger.get("ledger").and_then(|v| v.as_object()) {
                for entry in entries.values() {
                    if entry.get("refid").and_then(|v| v.as_str()) == Some(txid) {
                        let fee = entry.get("fee").and_then(value_to_f64).unwrap_or(0.0);
                        info!(txid, fee, "actual fee resolved from ledger");
                        return Ok(fee);
                    }
                }
            }

            tokio::time::sleep(LEDGER_POLL_INTERVAL).await;
        }

        warn!(txid, waited_secs = max_wait.as_secs(), "fee not found in ledger — recording 0.0");
        Ok(0.0)
    }
}

impl std::fmt::Debug for KrakenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenClient")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_variations_cover_kraken_aliases() {
        let variations = KrakenClient::pair_variations("XBTUSD");
        assert!(variations.contains(&"XBTUSD".to_string()));
        assert!(variations.contains(&"XXBTZUSD".to_string()));

        let variations = KrakenClient::pair_variations("ETHUSD");
        assert!(variations.contains(&"XETHZUSD".to_string()));
    }

    #[test]
    fn resolve_prefers_exact_then_alias_then_altname() {
        let payload: serde_json::Value = serde_json::json!({
            "XXBTZUSD": {"altname": "XBTUSD"},
        });
        let map = payload.as_object().unwrap();
        assert_eq!(KrakenClient::resolve_pair_key("XBTUSD", map), Some("XXBTZUSD"));

        let payload: serde_json::Value = serde_json::json!({
            "SOLUSD": {"altname": "SOLUSD"},
        });
        let map = payload.as_object().unwrap();
        assert_eq!(KrakenClient::resolve_pair_key("SOLUSD", map), Some("SOLUSD"));

        // Only the altname matches.
        let payload: serde_json::Value = serde_json::json!({
            "WEIRDKEY": {"altname": "DOGEUSD"},
        });
        let map = payload.as_object().unwrap();
        assert_eq!(KrakenClient::resolve_pair_key("DOGEUSD", map), Some("WEIRDKEY"));
    }

    #[test]
    fn error_classification() {
        assert!(matches!(
            classify_api_error("EAPI:Invalid key"),
            ExchangeError::Auth(_)
        ));
        assert!(matches!(
            classify_api_error("EGeneral:Permission denied"),
            ExchangeError::Auth(_)
        ));
        assert!(matches!(
            classify_api_error("EQuery:Unknown asset pair"),
            ExchangeError::InvalidPair(_)
        ));
        assert!(matches!(
            classify_api_error("EOrder:Insufficient funds"),
            ExchangeError::Api(_)
        ));
    }

    #[test]
    fn parses_ohlc_rows_with_string_numbers() {
        let row = serde_json::json!([
            1700000000_i64, "97000.1", "97100.2", "96900.3", "97050.4", "97010.5", "12.345", 42
        ]);
        let candle = parse_ohlc_row(&row).unwrap();
        assert_eq!(candle.time, 1700000000);
        assert!((candle.open - 97000.1).abs() < 1e-9);
        assert!((candle.close - 97050.4).abs() < 1e-9);
        assert!((candle.volume - 12.345).abs() < 1e-9);
        assert_eq!(candle.count, 42);

        // Malformed rows are skipped, not fatal.
        assert!(parse_ohlc_row(&serde_json::json!([1, 2, 3])).is_none());
    }

    #[test]
    fn parses_ticker_entry() {
        let info = serde_json::json!({
            "c": ["97123.4", "0.01"],
            "h": ["97500.0", "98000.0"],
            "l": ["96000.0", "95500.0"],
            "v": ["100.0", "250.0"],
        });
        let ticker = parse_ticker_info(&info).unwrap();
        assert!((ticker.last - 97123.4).abs() < 1e-9);
        assert!((ticker.high_24h - 98000.0).abs() < 1e-9);
        assert!((ticker.low_24h - 95500.0).abs() < 1e-9);
        assert!((ticker.volume_24h - 250.0).abs() < 1e-9);
    }

    #[test]
    fn parses_pair_rules_with_defaults() {
        let info = serde_json::json!({
            "altname": "XBTUSD",
            "lot_decimals": 8,
            "pair_decimals": 1,
            "tick_size": "0.1",
            "ordermin": "0.0001",
            "costmin": "0.5",
        });
        let rules = parse_pair_rules(&info);
        assert_eq!(rules.lot_decimals, 8);
        assert_eq!(rules.pair_decimals, 1);
        assert_eq!(rules.tick_size, Some(0.1));
        assert_eq!(rules.ordermin, Some(0.0001));
        assert_eq!(rules.costmin, Some(0.5));

        let empty = parse_pair_rules(&serde_json::json!({}));
        assert_eq!(empty.lot_decimals, 8);
        assert_eq!(empty.pair_decimals, 5);
        assert_eq!(empty.tick_size, None);
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let secret = BASE64.encode(b"super secret signing key material");
        let client = KrakenClient::new("key", secret).with_base_url("http://localhost:1");

        let a = client
            .sign("/0/private/AddOrder", "1700000000000", "nonce=1700000000000&pair=XBTUSD")
            .unwrap();
        let b = client
            .sign("/0/private/AddOrder", "1700000000000", "nonce=1700000000000&pair=XBTUSD")
            .unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());

        // A different nonce must change the signature.
        let c = client
            .sign("/0/private/AddOrder", "1700000000001", "nonce=1700000000001&pair=XBTUSD")
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn invalid_secret_is_an_auth_error() {
        let client = KrakenClient::new("key", "not-base64!!!").with_base_url("http://localhost:1");
        let err = client.sign("/0/private/Balance", "1", "nonce=1").unwrap_err();
        assert!(matches!(err, ExchangeError::Auth(_)));
    }

    #[test]
    fn debug_redacts_credentials() {
        let client = KrakenClient::new("real-key", "real-secret");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("real-key"));
        assert!(!rendered.contains("real-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
