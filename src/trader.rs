// =============================================================================
// CoinTrader — per-instrument adaptive controller
// =============================================================================
//
// One CoinTrader per trading pair. It owns the pair's price history rings,
// the active strategy, and the regime-confirmation machinery:
//
//   - classification runs at most once per `reanalysis_interval` once enough
//     data has accumulated (the data-collection phase never advances the
//     analysis clock),
//   - a recommendation that differs from the active strategy must repeat for
//     `confirmations_required` consecutive classifications; seeing the
//     current strategy's own state again resets the counter,
//   - an approved switch is still subject to the cooldown and the daily cap,
//     which resets when the local date rolls over.
//
// The trader never touches the exchange or the store. Switch events and
// fresh classifications are returned to the coordinator, which persists
// them.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::analysis::{MarketAnalyzer, MarketCondition, MarketState};
use crate::config::Config;
use crate::fees::NetPnl;
use crate::market_data::OhlcSeries;
use crate::strategy::{recommended_strategy, Strategy, StrategyKind, StrategySelector};
use crate::types::Signal;

/// A completed strategy switch, ready to be persisted.
#[derive(Debug, Clone)]
pub struct SwitchRecord {
    pub symbol: String,
    pub from_strategy: StrategyKind,
    pub to_strategy: StrategyKind,
    pub reason: String,
    pub market_state: MarketState,
    pub confidence: f64,
    pub confirmations_received: u32,
    pub switches_today: u32,
}

/// Everything one analysis pass produced.
#[derive(Debug, Default)]
pub struct TraderUpdate {
    pub signal: Option<Signal>,
    pub switch: Option<SwitchRecord>,
    /// Present only when a fresh (non-cached, non-skipped) classification
    /// happened this pass.
    pub fresh_condition: Option<MarketCondition>,
}

impl TraderUpdate {
    fn none() -> Self {
        Self::default()
    }
}

/// Per-trader performance counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraderStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub cumulative_fees: f64,
    pub total_volume: f64,
}

pub struct CoinTrader {
    pub symbol: String,

    analyzer: MarketAnalyzer,
    selector: StrategySelector,

    pub current_strategy: Option<Strategy>,
    pub current_condition: Option<MarketCondition>,

    closes: VecDeque<f64>,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    history_size: usize,

    last_analysis_at: Option<Instant>,
    last_switch_at: Option<Instant>,
    pending_state: Option<MarketState>,
    pending_confirmations: u32,
    switches_today: u32,
    current_day: NaiveDate,

    reanalysis_interval: Duration,
    switch_cooldown: Duration,
    confirmations_required: u32,
    max_switches_per_day: u32,

    track_fees: bool,
    stats: TraderStats,
}

impl CoinTrader {
    pub fn new(symbol: &str, config: &Config) -> Self {
        let history_size = config.strategy.history_size;
        info!(
            symbol,
            reanalysis_interval = config.reanalysis_interval_secs,
            switch_cooldown = config.switch_cooldown_secs,
            confirmations_required = config.confirmations_required,
            max_switches_per_day = config.max_switches_per_day,
            "coin trader initialized"
        );

        Self {
            symbol: symbol.to_string(),
            analyzer: MarketAnalyzer::new(config.analyzer.clone()),
            selector: StrategySelector::new(config.strategy.clone()),
            current_strategy: None,
            current_condition: None,
            closes: VecDeque::with_capacity(history_size),
            highs: VecDeque::with_capacity(history_size),
            lows: VecDeque::with_capacity(history_size),
            history_size,
            last_analysis_at: None,
            last_switch_at: None,
            pending_state: None,
            pending_confirmations: 0,
            switches_today: 0,
            current_day: chrono::Local::now().date_naive(),
            reanalysis_interval: Duration::from_secs(config.reanalysis_interval_secs),
            switch_cooldown: Duration::from_secs(config.switch_cooldown_secs),
            confirmations_required: config.confirmations_required,
            max_switches_per_day: config.max_switches_per_day,
            track_fees: config.track_fees,
            stats: TraderStats::default(),
        }
    }

    /// One controller pass over the committed series for this pair.
    pub fn analyze(&mut self, series: &OhlcSeries) -> TraderUpdate {
        self.push_history(series.latest.close, series.latest.high, series.latest.low);

        let today = chrono::Local::now().date_naive();
        let mut update = self.analyze_and_update_strategy(today);

        let strategy = match self.current_strategy.as_mut() {
            Some(s) => s,
            None => return update,
        };

        if let Some(condition) = &self.current_condition {
            strategy.update_market_state(condition.state);
        }

        update.signal = strategy.analyze(series);
        update
    }

    fn push_history(&mut self, close: f64, high: f64, low: f64) {
        if self.closes.len() == self.history_size {
            self.closes.pop_front();
            self.highs.pop_front();
            self.lows.pop_front();
        }
        self.closes.push_back(close);
        self.highs.push_back(high);
        self.lows.push_back(low);
    }

    /// Classify the market (subject to the reanalysis clock) and drive the
    /// confirmation state machine.
    fn analyze_and_update_strategy(&mut self, today: NaiveDate) -> TraderUpdate {
        let min_required = self.analyzer.required_data_points();
        if self.closes.len() < min_required {
            // Still collecting: check again every iteration, do not advance
            // the analysis clock.
            debug!(
                symbol = %self.symbol,
                have = self.closes.len(),
                need = min_required,
                "collecting data"
            );
            return TraderUpdate::none();
        }

        if let Some(last) = self.last_analysis_at {
            if last.elapsed() < self.reanalysis_interval {
                return TraderUpdate::none();
            }
        }

        let closes: Vec<f64> = self.closes.iter().copied().collect();
        let highs: Vec<f64> = self.highs.iter().copied().collect();
        let lows: Vec<f64> = self.lows.iter().copied().collect();

        let condition = self.analyzer.analyze(&self.symbol, &closes, &highs, &lows);
        self.last_analysis_at = Some(Instant::now());

        info!(
            symbol = %self.symbol,
            state = %condition.state,
            confidence = format!("{:.0}%", condition.confidence * 100.0),
            "market classified"
        );

        self.current_condition = Some(condition.clone());
        let switch = self.apply_condition(&condition, today);

        TraderUpdate {
            signal: None,
            switch,
            fresh_condition: Some(condition),
        }
    }

    /// Confirmation-gated strategy selection. Returns a [`SwitchRecord`]
    /// when a switch actually happened.
    fn apply_condition(
        &mut self,
        condition: &MarketCondition,
        today: NaiveDate,
    ) -> Option<SwitchRecord> {
        let recommended = recommended_strategy(condition.state);

        // First classification: adopt the recommendation silently.
        let current_kind = match &self.current_strategy {
            Some(strategy) => strategy.kind(),
            None => {
                info!(symbol = %self.symbol, strategy = %recommended, "initial strategy");
                self.current_strategy = Some(self.selector.build(recommended, &self.symbol));
                return None;
            }
        };

        if recommended == current_kind {
            if self.pending_confirmations > 0 {
                debug!(symbol = %self.symbol, "strategy confirmation reset");
            }
            self.pending_state = None;
            self.pending_confirmations = 0;
            return None;
        }

        if self.pending_state == Some(condition.state) {
            self.pending_confirmations += 1;
        } else {
            self.pending_state = Some(condition.state);
            self.pending_confirmations = 1;
        }
        info!(
            symbol = %self.symbol,
            recommended = %recommended,
            current = %current_kind,
            confirmations = format!("{}/{}", self.pending_confirmations, self.confirmations_required),
            "new strategy recommended"
        );

        if self.pending_confirmations >= self.confirmations_required && self.can_switch(today) {
            return Some(self.switch_strategy(condition, recommended, current_kind));
        }

        None
    }

    fn switch_strategy(
        &mut self,
        condition: &MarketCondition,
        to: StrategyKind,
        from: StrategyKind,
    ) -> SwitchRecord {
        info!(
            symbol = %self.symbol,
            from = %from,
            to = %to,
            reason = %condition.description,
            "switching strategy"
        );

        // Drop the strategy-local position marker; the broker-level exit (if
        // any) travels through the normal signal path.
        if let Some(strategy) = self.current_strategy.as_mut() {
            if strategy.position().is_some() {
                info!(symbol = %self.symbol, "clearing strategy-local position on switch");
                strategy.update_position(None);
            }
        }

        let confirmations = self.pending_confirmations;
        self.current_strategy = Some(self.selector.build(to, &self.symbol));
        self.last_switch_at = Some(Instant::now());
        self.switches_today += 1;
        self.pending_state = None;
        self.pending_confirmations = 0;

        info!(
            symbol = %self.symbol,
            switches_today = format!("{}/{}", self.switches_today, self.max_switches_per_day),
            "strategy switched"
        );

        SwitchRecord {
            symbol: self.symbol.clone(),
            from_strategy: from,
            to_strategy: to,
            reason: condition.description.clone(),
            market_state: condition.state,
            confidence: condition.confidence,
            confirmations_received: confirmations,
            switches_today: self.switches_today,
        }
    }

    /// Daily-cap and cooldown gate. Rolls the daily counter when the local
    /// date changes.
    fn can_switch(&mut self, today: NaiveDate) -> bool {
        if today != self.current_day {
            self.current_day = today;
            self.switches_today = 0;
        }

        if self.switches_today >= self.max_switches_per_day {
            warn!(
                symbol = %self.symbol,
                switches_today = self.switches_today,
                max = self.max_switches_per_day,
                "daily switch limit reached"
            );
            return false;
        }

        match self.last_switch_at {
            Some(last) => last.elapsed() >= self.switch_cooldown,
            None => true,
        }
    }

    // -------------------------------------------------------------------------
    // Fill accounting (driven by the coordinator after each execution)
    // -------------------------------------------------------------------------

    /// Record a filled entry against this trader's counters.
    pub fn note_entry(&mut self, price: f64, volume: f64, fee: f64) {
        self.stats.total_trades += 1;
        if self.track_fees {
            self.stats.cumulative_fees += fee;
            self.stats.total_volume += price * volume;
        }
    }

    /// Record a filled exit and its realized P&L.
    pub fn note_exit(&mut self, price: f64, volume: f64, fee: f64, pnl: NetPnl) {
        self.stats.total_trades += 1;
        self.stats.gross_pnl += pnl.gross;
        self.stats.net_pnl += pnl.net;
        if pnl.net > 0.0 {
            self.stats.winning_trades += 1;
        }
        if self.track_fees {
            self.stats.cumulative_fees += fee;
            self.stats.total_volume += price * volume;
        }
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    pub fn current_strategy_kind(&self) -> Option<StrategyKind> {
        self.current_strategy.as_ref().map(|s| s.kind())
    }

    pub fn stats(&self) -> TraderStats {
        self.stats
    }

    pub fn switches_today(&self) -> u32 {
        self.switches_today
    }

    pub fn history_len(&self) -> usize {
        self.closes.len()
    }
}
