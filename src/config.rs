// =============================================================================
// Configuration — env-driven engine settings with typed validation
// =============================================================================
//
// Every tunable lives here. Values come from the process environment (seeded
// from .env via dotenv in main). A present-but-unparseable value is a
// ConfigError and halts startup; so is a missing required key. Everything
// else carries its documented default.
//
// Required:
//   TRADING_PAIRS                     comma-separated, e.g. "XBTUSD,ETHUSD"
//   KRAKEN_API_KEY / KRAKEN_API_SECRET  only when DRY_RUN=false (checked in
//                                       main, not here — credentials never
//                                       enter this struct)

use std::collections::HashMap;

use crate::errors::ConfigError;

// =============================================================================
// Sizing mode
// =============================================================================

/// How the shared quote balance is apportioned across instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    /// Equal split of (balance × exposure × fee buffer) across all pairs.
    Equal,
    /// Percentage-based: each pair draws up to `max_per_coin`, capped by the
    /// remaining total exposure.
    Pct,
}

impl SizingMode {
    fn parse(key: &'static str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "pct" => Ok(Self::Pct),
            other => Err(ConfigError::InvalidValue {
                key,
                expected: "one of: equal, pct",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Config sections
// =============================================================================

/// Market analyzer thresholds and indicator periods.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub adx_strong_trend: f64,
    pub adx_weak_trend: f64,
    pub choppiness_choppy: f64,
    pub choppiness_trending: f64,
    pub range_tight: f64,
    pub range_moderate: f64,

    pub adx_period: usize,
    pub atr_period: usize,
    pub chop_period: usize,
    pub slope_period: usize,
    pub range_period: usize,

    /// Seconds a cached per-symbol classification stays valid.
    pub cache_ttl_secs: u64,
}

/// Parameters shared by the strategy family.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub history_size: usize,

    // Mean reversion
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub auto_detect_levels: bool,
    pub support_level: Option<f64>,
    pub resistance_level: Option<f64>,
    pub breakout_lower: Option<f64>,
    pub breakout_upper: Option<f64>,

    // SMA crossover
    pub fast_sma_period: usize,
    pub slow_sma_period: usize,
    pub enable_trend_filter: bool,

    // MACD
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub macd_histogram_confirm: bool,

    // Breakout
    pub atr_period: usize,
    pub volume_threshold: f64,
    pub breakout_lookback: usize,
    pub require_retest: bool,

    // Grid
    pub grid_size: usize,
    pub grid_spacing_pct: f64,

    // Fibonacci
    pub use_fibonacci: bool,
    pub fib_lookback_period: usize,
    pub fib_tolerance: f64,

    // Exit behavior shared across strategies
    pub min_profit_target: f64,
    pub min_hold_time_secs: u64,
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub trading_pairs: Vec<String>,
    pub ohlc_interval_min: u32,

    pub api_call_delay_secs: f64,
    pub reanalysis_interval_secs: u64,
    pub switch_cooldown_secs: u64,
    pub confirmations_required: u32,
    pub max_switches_per_day: u32,

    pub sizing_mode: SizingMode,
    pub max_total_exposure_pct: f64,
    pub max_per_coin_pct: f64,
    pub fee_buffer_pct: f64,

    pub analyzer: AnalyzerConfig,
    pub strategy: StrategyConfig,

    pub maker_fee: f64,
    pub taker_fee: f64,
    pub track_fees: bool,

    pub dry_run: bool,
    pub balance_asset: String,
    pub db_path: String,
}

impl Config {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    /// Build configuration from an explicit key/value map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let pairs_raw = require(vars, "TRADING_PAIRS")?;
        let trading_pairs: Vec<String> = pairs_raw
            .split(',')
            .map(|p| p.trim().to_uppercase())
            .filter(|p| !p.is_empty())
            .collect();
        if trading_pairs.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "TRADING_PAIRS",
                expected: "comma-separated list of pairs",
                value: pairs_raw,
            });
        }

        let analyzer = AnalyzerConfig {
            adx_strong_trend: f64_or(vars, "ADX_STRONG_TREND", 25.0)?,
            adx_weak_trend: f64_or(vars, "ADX_WEAK_TREND", 20.0)?,
            choppiness_choppy: f64_or(vars, "CHOPPINESS_CHOPPY", 61.8)?,
            choppiness_trending: f64_or(vars, "CHOPPINESS_TRENDING", 38.2)?,
            range_tight: f64_or(vars, "RANGE_TIGHT", 5.0)?,
            range_moderate: f64_or(vars, "RANGE_MODERATE", 15.0)?,
            adx_period: usize_or(vars, "ADX_PERIOD", 14)?,
            atr_period: usize_or(vars, "ATR_PERIOD", 14)?,
            chop_period: usize_or(vars, "CHOP_PERIOD", 14)?,
            slope_period: usize_or(vars, "SLOPE_PERIOD", 14)?,
            range_period: usize_or(vars, "RANGE_PERIOD", 50)?,
            cache_ttl_secs: u64_or(vars, "ANALYSIS_CACHE_TTL", 30)?,
        };

        let strategy = StrategyConfig {
            history_size: usize_or(vars, "HISTORY_SIZE", 200)?,
            rsi_period: usize_or(vars, "RSI_PERIOD", 14)?,
            rsi_oversold: f64_or(vars, "RSI_OVERSOLD", 40.0)?,
            rsi_overbought: f64_or(vars, "RSI_OVERBOUGHT", 60.0)?,
            bb_period: usize_or(vars, "BB_PERIOD", 20)?,
            bb_std_dev: f64_or(vars, "BB_STD_DEV", 2.0)?,
            auto_detect_levels: bool_or(vars, "AUTO_DETECT_LEVELS", true)?,
            support_level: f64_opt(vars, "SUPPORT_LEVEL")?,
            resistance_level: f64_opt(vars, "RESISTANCE_LEVEL")?,
            breakout_lower: f64_opt(vars, "BREAKOUT_LOWER")?,
            breakout_upper: f64_opt(vars, "BREAKOUT_UPPER")?,
            fast_sma_period: usize_or(vars, "FAST_SMA_PERIOD", 10)?,
            slow_sma_period: usize_or(vars, "SLOW_SMA_PERIOD", 30)?,
            enable_trend_filter: bool_or(vars, "ENABLE_TREND_FILTER", true)?,
            macd_fast: usize_or(vars, "MACD_FAST", 12)?,
            macd_slow: usize_or(vars, "MACD_SLOW", 26)?,
            macd_signal: usize_or(vars, "MACD_SIGNAL", 9)?,
            macd_histogram_confirm: bool_or(vars, "MACD_HISTOGRAM_CONFIRM", true)?,
            atr_period: usize_or(vars, "ATR_PERIOD", 14)?,
            volume_threshold: f64_or(vars, "VOLUME_THRESHOLD", 1.5)?,
            breakout_lookback: usize_or(vars, "BREAKOUT_LOOKBACK", 20)?,
            require_retest: bool_or(vars, "REQUIRE_RETEST", false)?,
            grid_size: usize_or(vars, "GRID_SIZE", 10)?,
            grid_spacing_pct: f64_or(vars, "GRID_SPACING_PCT", 0.5)?,
            use_fibonacci: bool_or(vars, "USE_FIBONACCI", true)?,
            fib_lookback_period: usize_or(vars, "FIB_LOOKBACK_PERIOD", 50)?,
            fib_tolerance: f64_or(vars, "FIB_TOLERANCE", 1.0)?,
            min_profit_target: f64_or(vars, "MIN_PROFIT_TARGET", 0.010)?,
            min_hold_time_secs: u64_or(vars, "MIN_HOLD_TIME", 900)?,
        };

        Ok(Self {
            trading_pairs,
            ohlc_interval_min: u32_or(vars, "OHLC_INTERVAL", 1)?,
            api_call_delay_secs: f64_or(vars, "API_CALL_DELAY", 3.0)?,
            reanalysis_interval_secs: u64_or(vars, "REANALYSIS_INTERVAL", 1800)?,
            switch_cooldown_secs: u64_or(vars, "SWITCH_COOLDOWN", 3600)?,
            confirmations_required: u32_or(vars, "CONFIRMATIONS_REQUIRED", 3)?,
            max_switches_per_day: u32_or(vars, "MAX_SWITCHES_PER_DAY", 4)?,
            sizing_mode: match get(vars, "POSITION_SIZING_MODE") {
                Some(raw) => SizingMode::parse("POSITION_SIZING_MODE", &raw)?,
                None => SizingMode::Equal,
            },
            max_total_exposure_pct: f64_or(vars, "MAX_TOTAL_EXPOSURE", 75.0)?,
            max_per_coin_pct: f64_or(vars, "MAX_PER_COIN", 25.0)?,
            fee_buffer_pct: f64_or(vars, "FEE_BUFFER_PCT", 1.0)?,
            analyzer,
            strategy,
            maker_fee: f64_or(vars, "MAKER_FEE", 0.0016)?,
            taker_fee: f64_or(vars, "TAKER_FEE", 0.0026)?,
            track_fees: bool_or(vars, "TRACK_FEES", true)?,
            dry_run: bool_or(vars, "DRY_RUN", true)?,
            balance_asset: get(vars, "BALANCE_ASSET").unwrap_or_else(|| "ZUSD".to_string()),
            db_path: get(vars, "DB_PATH").unwrap_or_else(|| "data/trading.db".to_string()),
        })
    }
}

// =============================================================================
// Env parsing helpers
// =============================================================================

/// Fetch a key, treating empty / whitespace-only values as absent.
fn get(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(vars: &HashMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    get(vars, key).ok_or(ConfigError::MissingKey(key))
}

fn f64_or(vars: &HashMap<String, String>, key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match get(vars, key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            expected: "number",
            value: raw,
        }),
        None => Ok(default),
    }
}

fn f64_opt(vars: &HashMap<String, String>, key: &'static str) -> Result<Option<f64>, ConfigError> {
    match get(vars, key) {
        Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            key,
            expected: "number",
            value: raw,
        }),
        None => Ok(None),
    }
}

fn u32_or(vars: &HashMap<String, String>, key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match get(vars, key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            expected: "integer",
            value: raw,
        }),
        None => Ok(default),
    }
}

fn u64_or(vars: &HashMap<String, String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match get(vars, key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            expected: "integer",
            value: raw,
        }),
        None => Ok(default),
    }
}

fn usize_or(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match get(vars, key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            expected: "integer",
            value: raw,
        }),
        None => Ok(default),
    }
}

fn bool_or(vars: &HashMap<String, String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match get(vars, key) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Ok(true),
            "false" | "0" | "no" | "n" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key,
                expected: "boolean",
                value: raw,
            }),
        },
        None => Ok(default),
    }
}

/// Default strategy parameters for unit tests across the crate.
#[cfg(test)]
pub fn tests_default_strategy_config() -> StrategyConfig {
    let mut vars = HashMap::new();
    vars.insert("TRADING_PAIRS".to_string(), "XBTUSD".to_string());
    Config::from_map(&vars).expect("defaults are valid").strategy
}
