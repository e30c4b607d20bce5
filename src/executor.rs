// =============================================================================
// Execution Coordinator — the multi-instrument tick loop
// =============================================================================
//
// One logical scheduler per process. Every tick:
//
//   1. refresh the balance snapshot (logged at most once per minute),
//   2. batch-fetch the ticker for all pairs, then update each pair's OHLC
//      cache (one call per pair — OHLC has no batch endpoint),
//   3. run every CoinTrader over its committed series, persisting fresh
//      classifications and completed strategy switches,
//   4. act on signals: enforce the spot invariants against the store (the
//      source of truth across restarts), gate MACD exits on fees, size,
//      normalize, submit, resolve the actual fee, and record the fill.
//
// All shared state (trader map, balance, cache, store) is owned here and
// touched only from this loop. Component failures are logged with their
// symbol and stage, and the tick moves on; the only aborts are ConfigError
// at startup and losing the store file.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{Config, SizingMode};
use crate::exchange::{ExchangeClient, OrderType, TickerInfo};
use crate::fees::FeeCalculator;
use crate::market_data::OhlcCache;
use crate::sizing::{cap_per_coin, equal_split_quote_allocation, quote_to_volume};
use crate::store::{OpenPosition, TradeRecord, TradingStore};
use crate::strategy::recommended_strategy;
use crate::trader::CoinTrader;
use crate::types::{OrderSide, PositionSide, Signal, TradeType};

/// How long `get_trade_actual_fee` may poll the ledger after a live fill.
const FEE_RESOLUTION_WAIT: Duration = Duration::from_secs(10);

/// Minimum spacing between balance log lines.
const BALANCE_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct ExecutionCoordinator<C: ExchangeClient> {
    client: Arc<C>,
    store: TradingStore,
    cache: OhlcCache,
    traders: HashMap<String, CoinTrader>,
    config: Config,
    fee_calc: FeeCalculator,

    /// Balance snapshot taken at the top of each tick and passed by value to
    /// sizing.
    balance: f64,
    last_balance_log: Option<Instant>,

    running: Arc<AtomicBool>,
}

impl<C: ExchangeClient> ExecutionCoordinator<C> {
    pub fn new(client: Arc<C>, store: TradingStore, config: Config) -> Self {
        let traders = config
            .trading_pairs
            .iter()
            .map(|pair| (pair.clone(), CoinTrader::new(pair, &config)))
            .collect();

        Self {
            client,
            store,
            cache: OhlcCache::new(config.strategy.history_size),
            traders,
            fee_calc: FeeCalculator::new(config.maker_fee, config.taker_fee),
            config,
            balance: 0.0,
            last_balance_log: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle used by the shutdown signal handler: clearing it lets the
    /// current iteration finish and the loop exit.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Drive the tick loop until the running flag clears.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        match self.client.get_server_time().await {
            Ok(time) => info!(server_time = time, "exchange connection verified"),
            Err(e) => {
                error!(error = %e, "cannot reach exchange — refusing to start");
                return Err(e.into());
            }
        }

        if !self.refresh_balance().await {
            anyhow::bail!("failed to fetch initial account balance");
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            pairs = ?self.config.trading_pairs,
            dry_run = self.config.dry_run,
            "coordinator running"
        );

        while self.running.load(Ordering::SeqCst) {
            self.iteration().await;
            tokio::time::sleep(Duration::from_secs_f64(self.config.api_call_delay_secs)).await;
        }

        info!("coordinator stopped");
        self.log_summary();
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    // -------------------------------------------------------------------------
    // One tick
    // -------------------------------------------------------------------------

    pub async fn iteration(&mut self) {
        self.refresh_balance().await;

        // Batched ticker: one call for every pair.
        let tickers = match self.client.get_ticker(&self.config.trading_pairs).await {
            Ok(tickers) => tickers,
            Err(e) => {
                warn!(stage = "ticker", error = %e, "failed to fetch market data — skipping tick");
                return;
            }
        };

        // Per-pair OHLC refresh into the committed-candle cache.
        let pairs = self.config.trading_pairs.clone();
        for pair in &pairs {
            let since = self.cache.since(pair);
            match self
                .client
                .get_ohlc(pair, self.config.ohlc_interval_min, since)
                .await
            {
                Ok((candles, last)) => self.cache.apply(pair, candles, last),
                Err(e) => warn!(symbol = %pair, stage = "ohlc", error = %e, "ohlc update failed"),
            }
        }

        // Analysis phase: collect signals before touching the order path.
        let mut signals: Vec<(String, Signal)> = Vec::new();
        for pair in pairs {
            let Some(series) = self.cache.get_series(&pair) else {
                continue;
            };
            let Some(trader) = self.traders.get_mut(&pair) else {
                continue;
            };

            let update = trader.analyze(&series);

            if let Some(condition) = &update.fresh_condition {
                let recommended = recommended_strategy(condition.state);
                let active = trader.current_strategy_kind();
                if let Err(e) = self.store.record_market_condition(
                    &pair,
                    condition,
                    series.latest.close,
                    series.latest.volume,
                    recommended,
                    active,
                ) {
                    error!(symbol = %pair, stage = "store", error = %e, "failed to record market condition");
                }
            }

            if let Some(switch) = &update.switch {
                if let Err(e) = self.store.record_strategy_switch(switch) {
                    error!(symbol = %pair, stage = "store", error = %e, "failed to record strategy switch");
                }
            }

            if let Some(signal) = update.signal {
                info!(symbol = %pair, signal = %signal, "signal emitted");
                signals.push((pair, signal));
            }
        }

        // Execution phase.
        for (symbol, signal) in signals {
            let Some(ticker) = tickers.get(&symbol).copied() else {
                warn!(symbol = %symbol, "no ticker for signal — skipping");
                continue;
            };
            self.handle_signal(&symbol, signal, &ticker).await;
        }

        self.log_summary();
    }

    /// Refresh the shared balance snapshot. Logs at most once per minute.
    async fn refresh_balance(&mut self) -> bool {
        match self
            .client
            .get_trade_balance(&self.config.balance_asset)
            .await
        {
            Ok(balance) => {
                self.balance = balance;
                let should_log = self
                    .last_balance_log
                    .map_or(true, |t| t.elapsed() >= BALANCE_LOG_INTERVAL);
                if should_log {
                    info!(balance = format!("{balance:.2}"), "account balance");
                    self.last_balance_log = Some(Instant::now());
                }
                true
            }
            Err(e) => {
                warn!(stage = "balance", error = %e, "failed to refresh balance");
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Signal handling
    // -------------------------------------------------------------------------

    async fn handle_signal(&mut self, symbol: &str, signal: Signal, ticker: &TickerInfo) {
        let current_price = ticker.last;
        if current_price <= 0.0 {
            warn!(symbol, "non-positive ticker price — skipping signal");
            return;
        }

        // Debounce: one action per strategy signal edge.
        if let Some(trader) = self.traders.get(symbol) {
            if let Some(strategy) = &trader.current_strategy {
                if strategy.last_signal() == Some(signal) {
                    info!(symbol, signal = %signal, "signal already acted upon — skipping");
                    return;
                }
            }
        }

        // The store is the source of truth for open positions, so restarts
        // cannot double-open or strand a position.
        let open_position = match self.store.get_open_position(symbol) {
            Ok(open) => open,
            Err(e) => {
                error!(symbol, stage = "store", error = %e, "failed to query open position");
                return;
            }
        };

        // Spot invariants: one open long per symbol, never short.
        match (signal, &open_position) {
            (Signal::Buy, Some(open)) => {
                info!(symbol, position_id = open.id, "skipping buy — position already open");
                return;
            }
            (Signal::Sell, None) => {
                info!(symbol, "skipping sell — no open position (spot mode, not shorting)");
                return;
            }
            _ => {}
        }

        // MACD positions only give up profits that clear fees and the target.
        if signal == Signal::Sell {
            if let Some(open) = &open_position {
                if open.strategy == "macd"
                    && !macd_exit_allowed(
                        open.entry_price,
                        open.entry_time,
                        Utc::now(),
                        current_price,
                        self.config.taker_fee,
                        self.config.strategy.min_hold_time_secs,
                        self.config.strategy.min_profit_target,
                    )
                {
                    return;
                }
            }
        }

        let volume = self.position_volume(symbol, current_price);
        if volume <= 0.0 {
            info!(symbol, "computed position size is zero — skipping signal");
            return;
        }

        // Exchange rule normalization. Orders are limit orders at the last
        // traded price.
        let rules = match self.client.get_asset_pair_rules(symbol).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(symbol, stage = "rules", error = %e, "failed to fetch pair rules");
                return;
            }
        };

        let (volume, price) = match crate::exchange::normalize::normalize_order(
            &rules,
            OrderType::Limit,
            volume,
            Some(current_price),
            Some(current_price),
        ) {
            Ok(normalized) => normalized,
            Err(rejection) => {
                info!(symbol, %rejection, "order rejected by exchange rules — skipping");
                return;
            }
        };
        let execution_price = price.unwrap_or(current_price);

        // Submit (or simulate).
        let txid = if self.config.dry_run {
            let sim_id = format!("SIM-{}", Uuid::new_v4());
            info!(
                symbol,
                signal = %signal,
                volume,
                price = execution_price,
                sim_id = %sim_id,
                "[DRY RUN] order simulated (dry_run=true)"
            );
            None
        } else {
            warn!(
                symbol,
                signal = %signal,
                volume,
                price = execution_price,
                "[LIVE] placing order (dry_run=false)"
            );
            let side = match signal {
                Signal::Buy => OrderSide::Buy,
                Signal::Sell => OrderSide::Sell,
            };
            match self
                .client
                .add_order(symbol, side, OrderType::Limit, volume, price, false)
                .await
            {
                Ok(result) => {
                    info!(symbol, txid = ?result.txid, "order placed");
                    result.txid
                }
                Err(e) => {
                    error!(symbol, stage = "order", error = %e, "order placement failed");
                    return;
                }
            }
        };

        // Resolve the actual fee from the ledger for live fills; estimate at
        // taker rates otherwise. A ledger timeout records 0.0.
        let mut actual_fee = 0.0;
        if let Some(txid) = &txid {
            actual_fee = self
                .client
                .get_trade_actual_fee(txid, FEE_RESOLUTION_WAIT)
                .await
                .unwrap_or(0.0);
        }
        let fee = if actual_fee > 0.0 {
            actual_fee
        } else if txid.is_none() {
            self.fee_calc
                .calculate_fee(execution_price * volume, false)
        } else {
            actual_fee
        };

        match signal {
            Signal::Buy => {
                self.record_entry(symbol, execution_price, volume, fee, txid);
            }
            Signal::Sell => {
                if let Some(open) = open_position {
                    self.record_exit(symbol, &open, execution_price, volume, fee, txid);
                }
            }
        }
    }

    /// Quote allocation for one instrument, converted to base volume.
    fn position_volume(&mut self, symbol: &str, current_price: f64) -> f64 {
        let num_coins = self.config.trading_pairs.len();

        let quote_value = match self.config.sizing_mode {
            SizingMode::Equal => {
                let per_coin = equal_split_quote_allocation(
                    self.balance,
                    num_coins,
                    self.config.fee_buffer_pct,
                    self.config.max_total_exposure_pct,
                );
                cap_per_coin(per_coin, self.balance, self.config.max_per_coin_pct)
            }
            SizingMode::Pct => {
                let open_value = self.store.total_open_value().unwrap_or_else(|e| {
                    warn!(symbol, stage = "store", error = %e, "exposure query failed — assuming zero");
                    0.0
                });
                let current_exposure_pct = if self.balance > 0.0 {
                    open_value / self.balance * 100.0
                } else {
                    return 0.0;
                };

                let remaining = self.config.max_total_exposure_pct - current_exposure_pct;
                if remaining <= 0.0 {
                    warn!(
                        symbol,
                        exposure = format!("{current_exposure_pct:.1}%"),
                        "max total exposure reached"
                    );
                    return 0.0;
                }

                let available_pct = self.config.max_per_coin_pct.min(remaining);
                self.balance * available_pct / 100.0
            }
        };

        quote_to_volume(quote_value, current_price)
    }

    // -------------------------------------------------------------------------
    // Fill recording
    // -------------------------------------------------------------------------

    fn record_entry(
        &mut self,
        symbol: &str,
        price: f64,
        volume: f64,
        fee: f64,
        txid: Option<String>,
    ) {
        let Some(trader) = self.traders.get_mut(symbol) else {
            return;
        };
        let Some(strategy_kind) = trader.current_strategy_kind() else {
            return;
        };
        let market_state = trader
            .current_condition
            .as_ref()
            .map(|c| c.state.as_str().to_string());

        let position_id = match self.store.open_position(
            symbol,
            strategy_kind,
            PositionSide::Long,
            price,
            volume,
            fee,
            market_state.as_deref(),
            self.config.dry_run,
        ) {
            Ok(id) => id,
            Err(e) => {
                error!(symbol, stage = "store", error = %e, "failed to persist position open");
                return;
            }
        };

        if let Err(e) = self.store.record_trade(&TradeRecord {
            symbol: symbol.to_string(),
            strategy: strategy_kind,
            market_state,
            trade_type: TradeType::Entry,
            position_type: PositionSide::Long,
            side: OrderSide::Buy,
            price,
            volume,
            fee,
            position_id: Some(position_id),
            txid,
            dry_run: self.config.dry_run,
            notes: None,
        }) {
            error!(symbol, stage = "store", error = %e, "failed to persist entry trade");
        }

        trader.note_entry(price, volume, fee);
        if let Some(strategy) = trader.current_strategy.as_mut() {
            strategy.update_position(Some(PositionSide::Long));
            strategy.update_signal(Signal::Buy);
        }

        info!(
            symbol,
            position_id,
            price,
            volume,
            fee = format!("{fee:.4}"),
            dry_run = self.config.dry_run,
            "entry executed"
        );
    }

    fn record_exit(
        &mut self,
        symbol: &str,
        open: &OpenPosition,
        price: f64,
        volume: f64,
        fee: f64,
        txid: Option<String>,
    ) {
        let pnl = match self.store.close_position(open.id, price, volume, fee) {
            Ok(pnl) => pnl,
            Err(e) => {
                error!(symbol, stage = "store", error = %e, "failed to persist position close");
                return;
            }
        };

        let Some(trader) = self.traders.get_mut(symbol) else {
            return;
        };
        let strategy_kind = trader
            .current_strategy_kind()
            .unwrap_or(crate::strategy::StrategyKind::MeanReversion);
        let market_state = trader
            .current_condition
            .as_ref()
            .map(|c| c.state.as_str().to_string());

        if let Err(e) = self.store.record_trade(&TradeRecord {
            symbol: symbol.to_string(),
            strategy: strategy_kind,
            market_state,
            trade_type: TradeType::Exit,
            position_type: open.position_type,
            side: OrderSide::Sell,
            price,
            volume,
            fee,
            position_id: Some(open.id),
            txid,
            dry_run: self.config.dry_run,
            notes: None,
        }) {
            error!(symbol, stage = "store", error = %e, "failed to persist exit trade");
        }

        trader.note_exit(price, volume, fee, pnl);
        if let Some(strategy) = trader.current_strategy.as_mut() {
            strategy.update_position(None);
            strategy.update_signal(Signal::Sell);
        }

        info!(
            symbol,
            position_id = open.id,
            price,
            volume,
            gross = format!("{:.2}", pnl.gross),
            net = format!("{:.2}", pnl.net),
            dry_run = self.config.dry_run,
            "exit executed"
        );
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------

    fn log_summary(&self) {
        let mut total_fees = 0.0;
        let mut total_net = 0.0;

        for (symbol, trader) in &self.traders {
            let stats = trader.stats();
            info!(
                symbol = %symbol,
                strategy = trader
                    .current_strategy_kind()
                    .map(|k| k.as_str())
                    .unwrap_or("none"),
                state = trader
                    .current_condition
                    .as_ref()
                    .map(|c| c.state.as_str())
                    .unwrap_or("unknown"),
                trades = stats.total_trades,
                switches_today = trader.switches_today(),
                net_pnl = format!("{:.2}", stats.net_pnl),
                "portfolio entry"
            );
            total_fees += stats.cumulative_fees;
            total_net += stats.net_pnl;
        }

        info!(
            total_fees = format!("{total_fees:.2}"),
            total_net_pnl = format!("{total_net:.2}"),
            "portfolio summary"
        );
    }
}

// =============================================================================
// MACD exit gate
// =============================================================================

/// Whether a sell of an open `macd` position may proceed.
///
/// Losing exits (net of round-trip taker fees) always pass — cutting losses
/// must never be delayed. Profitable exits must satisfy both the minimum
/// hold time and the minimum net profit target, which stops fee-churn exits
/// on tiny moves.
#[allow(clippy::too_many_arguments)]
pub fn macd_exit_allowed(
    entry_price: f64,
    entry_time: DateTime<Utc>,
    now: DateTime<Utc>,
    current_price: f64,
    taker_fee: f64,
    min_hold_secs: u64,
    min_profit_target: f64,
) -> bool {
    let gross_profit_pct = (current_price - entry_price) / entry_price;
    let net_profit_pct = gross_profit_pct - 2.0 * taker_fee;

    if net_profit_pct <= 0.0 {
        return true;
    }

    let held_secs = (now - entry_time).num_seconds().max(0) as u64;
    if held_secs < min_hold_secs {
        info!(
            held_secs,
            min_hold_secs,
            net = format!("{:.2}%", net_profit_pct * 100.0),
            "macd sell gated: hold time too short"
        );
        return false;
    }

    if net_profit_pct < min_profit_target {
        info!(
            net = format!("{:.2}%", net_profit_pct * 100.0),
            target = format!("{:.2}%", min_profit_target * 100.0),
            "macd sell gated: net profit below target"
        );
        return false;
    }

    true
}
