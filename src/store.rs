// =============================================================================
// TradingStore — durable SQLite record of everything the engine does
// =============================================================================
//
// Four tables: trades (immutable fills), positions (open/close lifecycle
// with derived P&L), strategy_switches, and market_conditions. The engine is
// the single writer; the analytics service opens the same file read-only,
// so a 2 s busy timeout keeps both sides polite.
//
// P&L derivation happens here, in one transaction with the close, so a
// closed row is always internally consistent:
//
//   gross      = (exit - entry) * volume      (long; sign flips for short)
//   total_fees = entry_fee + exit_fee
//   net        = gross - total_fees
//   pnl%       = net / (entry * entry_volume) * 100

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::analysis::MarketCondition;
use crate::fees::NetPnl;
use crate::strategy::StrategyKind;
use crate::trader::SwitchRecord;
use crate::types::{OrderSide, PositionSide, TradeType};

/// A trade row to insert.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub market_state: Option<String>,
    pub trade_type: TradeType,
    pub position_type: PositionSide,
    pub side: OrderSide,
    pub price: f64,
    pub volume: f64,
    pub fee: f64,
    pub position_id: Option<i64>,
    pub txid: Option<String>,
    pub dry_run: bool,
    pub notes: Option<String>,
}

/// The open position row the coordinator consults before acting on signals.
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub id: i64,
    pub symbol: String,
    pub strategy: String,
    pub position_type: PositionSide,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_volume: f64,
    pub entry_fee: f64,
    pub dry_run: bool,
}

/// Aggregates over closed positions for one local date.
#[derive(Debug, Clone, Default)]
pub struct DailyStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub gross_pnl: f64,
    pub total_fees: f64,
    pub net_pnl: f64,
    pub strategy_switches: u32,
}

/// Aggregates over closed positions for one (symbol, strategy).
#[derive(Debug, Clone, Default)]
pub struct StrategyPerformance {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub net_pnl: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
}

pub struct TradingStore {
    conn: Connection,
}

impl TradingStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open trading database {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(2000))?;

        let store = Self { conn };
        store.init_schema()?;
        info!(path = %path.display(), "trading store ready");
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Raw connection access for test assertions.
    #[cfg(test)]
    pub fn conn_for_tests(&self) -> &Connection {
        &self.conn
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS trades (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                    symbol TEXT NOT NULL,
                    strategy TEXT NOT NULL,
                    market_state TEXT,
                    trade_type TEXT NOT NULL,
                    position_type TEXT,
                    side TEXT NOT NULL,
                    price REAL NOT NULL,
                    volume REAL NOT NULL,
                    value REAL NOT NULL,
                    fee REAL DEFAULT 0.0,
                    fee_currency TEXT DEFAULT 'USD',
                    position_id INTEGER,
                    txid TEXT,
                    dry_run BOOLEAN DEFAULT 1,
                    notes TEXT
                );

                CREATE TABLE IF NOT EXISTS positions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol TEXT NOT NULL,
                    strategy TEXT NOT NULL,
                    market_state TEXT,
                    position_type TEXT NOT NULL,
                    entry_time DATETIME NOT NULL,
                    entry_price REAL NOT NULL,
                    entry_volume REAL NOT NULL,
                    entry_fee REAL DEFAULT 0.0,
                    exit_time DATETIME,
                    exit_price REAL,
                    exit_volume REAL,
                    exit_fee REAL DEFAULT 0.0,
                    gross_pnl REAL,
                    total_fees REAL,
                    net_pnl REAL,
                    pnl_percent REAL,
                    status TEXT DEFAULT 'open',
                    dry_run BOOLEAN DEFAULT 1,
                    closed_time DATETIME
                );

                CREATE TABLE IF NOT EXISTS strategy_switches (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                    symbol TEXT NOT NULL,
                    from_strategy TEXT NOT NULL,
                    to_strategy TEXT NOT NULL,
                    reason TEXT,
                    market_state TEXT,
                    confidence REAL,
                    confirmations_received INTEGER,
                    switches_today INTEGER,
                    trades_with_old_strategy INTEGER,
                    pnl_with_old_strategy REAL
                );

                CREATE TABLE IF NOT EXISTS market_conditions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                    symbol TEXT NOT NULL,
                    state TEXT NOT NULL,
                    adx REAL,
                    atr REAL,
                    range_percent REAL,
                    choppiness REAL,
                    slope REAL,
                    confidence REAL,
                    price REAL,
                    volume REAL,
                    recommended_strategy TEXT,
                    active_strategy TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_trades_symbol_timestamp
                    ON trades(symbol, timestamp);
                CREATE INDEX IF NOT EXISTS idx_positions_symbol_status
                    ON positions(symbol, status);
                CREATE INDEX IF NOT EXISTS idx_positions_symbol_strategy
                    ON positions(symbol, strategy);
                CREATE INDEX IF NOT EXISTS idx_market_conditions_symbol_timestamp
                    ON market_conditions(symbol, timestamp);",
            )
            .context("failed to create schema")?;

        debug!("database schema created/verified");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Trades
    // -------------------------------------------------------------------------

    /// Insert an immutable trade row. Returns its id.
    pub fn record_trade(&self, trade: &TradeRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO trades (
                    timestamp, symbol, strategy, market_state, trade_type,
                    position_type, side, price, volume, value, fee,
                    fee_currency, position_id, txid, dry_run, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    Utc::now().to_rfc3339(),
                    trade.symbol,
                    trade.strategy.as_str(),
                    trade.market_state,
                    trade.trade_type.as_str(),
                    trade.position_type.as_str(),
                    trade.side.as_str(),
                    trade.price,
                    trade.volume,
                    trade.price * trade.volume,
                    trade.fee,
                    "USD",
                    trade.position_id,
                    trade.txid,
                    trade.dry_run,
                    trade.notes,
                ],
            )
            .context("failed to record trade")?;

        let id = self.conn.last_insert_rowid();
        debug!(
            id,
            symbol = %trade.symbol,
            trade_type = %trade.trade_type,
            side = %trade.side,
            dry_run = trade.dry_run,
            "trade recorded"
        );
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Positions
    // -------------------------------------------------------------------------

    /// Open a new position. Returns its id.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &self,
        symbol: &str,
        strategy: StrategyKind,
        position_type: PositionSide,
        entry_price: f64,
        entry_volume: f64,
        entry_fee: f64,
        market_state: Option<&str>,
        dry_run: bool,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO positions (
                    symbol, strategy, market_state, position_type,
                    entry_time, entry_price, entry_volume, entry_fee,
                    status, dry_run
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'open', ?9)",
                params![
                    symbol,
                    strategy.as_str(),
                    market_state,
                    position_type.as_str(),
                    Utc::now().to_rfc3339(),
                    entry_price,
                    entry_volume,
                    entry_fee,
                    dry_run,
                ],
            )
            .context("failed to open position")?;

        let id = self.conn.last_insert_rowid();
        info!(
            id,
            symbol,
            strategy = %strategy,
            position_type = %position_type,
            entry_price,
            dry_run,
            "position opened"
        );
        Ok(id)
    }

    /// Close a position and derive its P&L, atomically. Returns the realized
    /// P&L.
    pub fn close_position(
        &mut self,
        position_id: i64,
        exit_price: f64,
        exit_volume: f64,
        exit_fee: f64,
    ) -> Result<NetPnl> {
        let tx = self.conn.transaction().context("failed to begin close transaction")?;

        let (position_type, entry_price, entry_volume, entry_fee): (String, f64, f64, f64) = tx
            .query_row(
                "SELECT position_type, entry_price, entry_volume, entry_fee
                 FROM positions WHERE id = ?1 AND status = 'open'",
                params![position_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .with_context(|| format!("open position {position_id} not found"))?;

        let gross = match PositionSide::parse(&position_type) {
            Some(PositionSide::Short) => (entry_price - exit_price) * exit_volume,
            _ => (exit_price - entry_price) * exit_volume,
        };
        let total_fees = entry_fee + exit_fee;
        let net = gross - total_fees;
        let pnl_percent = if entry_price * entry_volume != 0.0 {
            net / (entry_price * entry_volume) * 100.0
        } else {
            0.0
        };

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE positions SET
                exit_time = ?1, exit_price = ?2, exit_volume = ?3, exit_fee = ?4,
                gross_pnl = ?5, total_fees = ?6, net_pnl = ?7, pnl_percent = ?8,
                status = 'closed', closed_time = ?9
             WHERE id = ?10",
            params![
                now, exit_price, exit_volume, exit_fee, gross, total_fees, net, pnl_percent, now,
                position_id,
            ],
        )
        .context("failed to close position")?;

        tx.commit().context("failed to commit close transaction")?;

        info!(
            position_id,
            gross = format!("{gross:.2}"),
            fees = format!("{total_fees:.2}"),
            net = format!("{net:.2}"),
            "position closed"
        );

        Ok(NetPnl {
            gross,
            total_fees,
            net,
        })
    }

    /// Total entry value (quote units) committed to open positions across
    /// all symbols. Feeds the global exposure cap.
    pub fn total_open_value(&self) -> Result<f64> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(entry_price * entry_volume), 0)
                 FROM positions WHERE status = 'open'",
                [],
                |row| row.get(0),
            )
            .context("failed to sum open position value")
    }

    /// Most recent open position for `symbol`, if any.
    pub fn get_open_position(&self, symbol: &str) -> Result<Option<OpenPosition>> {
        self.conn
            .query_row(
                "SELECT id, symbol, strategy, position_type, entry_time,
                        entry_price, entry_volume, entry_fee, dry_run
                 FROM positions
                 WHERE symbol = ?1 AND status = 'open'
                 ORDER BY entry_time DESC
                 LIMIT 1",
                params![symbol],
                |row| {
                    let position_type: String = row.get(3)?;
                    let entry_time: String = row.get(4)?;
                    Ok(OpenPosition {
                        id: row.get(0)?,
                        symbol: row.get(1)?,
                        strategy: row.get(2)?,
                        position_type: PositionSide::parse(&position_type)
                            .unwrap_or(PositionSide::Long),
                        entry_time: DateTime::parse_from_rfc3339(&entry_time)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                        entry_price: row.get(5)?,
                        entry_volume: row.get(6)?,
                        entry_fee: row.get(7)?,
                        dry_run: row.get(8)?,
                    })
                },
            )
            .optional()
            .context("failed to query open position")
    }

    // -------------------------------------------------------------------------
    // Strategy switches and market conditions
    // -------------------------------------------------------------------------

    pub fn record_strategy_switch(&self, switch: &SwitchRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO strategy_switches (
                    timestamp, symbol, from_strategy, to_strategy, reason,
                    market_state, confidence, confirmations_received, switches_today
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    Utc::now().to_rfc3339(),
                    switch.symbol,
                    switch.from_strategy.as_str(),
                    switch.to_strategy.as_str(),
                    switch.reason,
                    switch.market_state.as_str(),
                    switch.confidence,
                    switch.confirmations_received,
                    switch.switches_today,
                ],
            )
            .context("failed to record strategy switch")?;

        info!(
            symbol = %switch.symbol,
            from = %switch.from_strategy,
            to = %switch.to_strategy,
            "strategy switch recorded"
        );
        Ok(self.conn.last_insert_rowid())
    }

    pub fn record_market_condition(
        &self,
        symbol: &str,
        condition: &MarketCondition,
        price: f64,
        volume: f64,
        recommended_strategy: StrategyKind,
        active_strategy: Option<StrategyKind>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO market_conditions (
                    timestamp, symbol, state, adx, atr, range_percent,
                    choppiness, slope, confidence, price, volume,
                    recommended_strategy, active_strategy
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    Utc::now().to_rfc3339(),
                    symbol,
                    condition.state.as_str(),
                    condition.adx,
                    condition.atr,
                    condition.range_percent,
                    condition.choppiness,
                    condition.slope,
                    condition.confidence,
                    price,
                    volume,
                    recommended_strategy.as_str(),
                    active_strategy.map(|s| s.as_str()),
                ],
            )
            .context("failed to record market condition")?;
        Ok(self.conn.last_insert_rowid())
    }

    // -------------------------------------------------------------------------
    // Analytics helpers (same tables the dashboard reads)
    // -------------------------------------------------------------------------

    /// Closed-position aggregates for one local date.
    pub fn daily_stats(&self, date: NaiveDate) -> Result<DailyStats> {
        let date_str = date.format("%Y-%m-%d").to_string();

        let mut stats: DailyStats = self
            .conn
            .query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN net_pnl > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(gross_pnl), 0),
                    COALESCE(SUM(total_fees), 0),
                    COALESCE(SUM(net_pnl), 0)
                 FROM positions
                 WHERE DATE(closed_time) = ?1 AND status = 'closed'",
                params![date_str],
                |row| {
                    Ok(DailyStats {
                        total_trades: row.get(0)?,
                        winning_trades: row.get(1)?,
                        gross_pnl: row.get(2)?,
                        total_fees: row.get(3)?,
                        net_pnl: row.get(4)?,
                        strategy_switches: 0,
                    })
                },
            )
            .context("failed to query daily stats")?;

        stats.strategy_switches = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM strategy_switches WHERE DATE(timestamp) = ?1",
                params![date_str],
                |row| row.get(0),
            )
            .context("failed to count strategy switches")?;

        Ok(stats)
    }

    /// Closed-position aggregates for one (symbol, strategy).
    pub fn strategy_performance(
        &self,
        symbol: &str,
        strategy: StrategyKind,
    ) -> Result<StrategyPerformance> {
        let (total, winning, losing, net, avg_win, avg_loss): (u32, u32, u32, f64, f64, f64) =
            self.conn
                .query_row(
                    "SELECT
                        COUNT(*),
                        COALESCE(SUM(CASE WHEN net_pnl > 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN net_pnl <= 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(net_pnl), 0),
                        COALESCE(AVG(CASE WHEN net_pnl > 0 THEN net_pnl END), 0),
                        COALESCE(AVG(CASE WHEN net_pnl <= 0 THEN ABS(net_pnl) END), 0)
                     FROM positions
                     WHERE symbol = ?1 AND strategy = ?2 AND status = 'closed'",
                    params![symbol, strategy.as_str()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .context("failed to query strategy performance")?;

        Ok(StrategyPerformance {
            total_trades: total,
            winning_trades: winning,
            losing_trades: losing,
            net_pnl: net,
            win_rate: if total > 0 {
                winning as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            profit_factor: if avg_loss > 0.0 { avg_win / avg_loss } else { 0.0 },
        })
    }
}
