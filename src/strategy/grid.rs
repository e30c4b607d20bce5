// =============================================================================
// Grid Trading — fixed ladder for low-volatility ranges
// =============================================================================
//
// A symmetric ladder of buy levels below and sell levels above a center
// price, spaced `grid_spacing_pct` apart. A signal fires when price comes
// within 0.1% of an unfilled level; the level is then marked filled so the
// same rung cannot fire twice. If price escapes the ladder entirely, the
// grid re-centers on the current price and all fill marks clear.

use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::market_data::OhlcSeries;
use crate::strategy::StrategyCore;
use crate::types::Signal;

/// Proximity to a rung required to fire, as a fraction of the rung price.
const LEVEL_PROXIMITY: f64 = 0.001;

/// Closes needed before the grid centers itself.
const WARMUP_POINTS: usize = 10;

#[derive(Debug, Clone, Copy)]
struct GridLevel {
    price: f64,
    filled: bool,
}

#[derive(Debug)]
pub struct GridTrading {
    pub core: StrategyCore,

    grid_size: usize,
    spacing_pct: f64,

    center: Option<f64>,
    buy_levels: Vec<GridLevel>,
    sell_levels: Vec<GridLevel>,
    lower_bound: f64,
    upper_bound: f64,
}

impl GridTrading {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            core: StrategyCore::default(),
            grid_size: config.grid_size,
            spacing_pct: config.grid_spacing_pct,
            center: None,
            buy_levels: Vec::new(),
            sell_levels: Vec::new(),
            lower_bound: 0.0,
            upper_bound: 0.0,
        }
    }

    pub fn analyze(&mut self, series: &OhlcSeries) -> Option<Signal> {
        let current_price = series.latest.close;

        if series.closes.len() < WARMUP_POINTS {
            debug!(have = series.closes.len(), need = WARMUP_POINTS, "collecting data");
            return None;
        }

        if self.center.is_none() {
            self.initialize(current_price);
            info!(
                center = current_price,
                lower = self.lower_bound,
                upper = self.upper_bound,
                "grid initialized"
            );
            return None;
        }

        // Escape from the band: re-center rather than chase.
        if current_price > self.upper_bound || current_price < self.lower_bound {
            warn!(
                price = current_price,
                lower = self.lower_bound,
                upper = self.upper_bound,
                "price left the grid — re-centering"
            );
            self.initialize(current_price);
            return None;
        }

        // Nearest unfilled buy rung below price.
        if let Some(level) = self
            .buy_levels
            .iter_mut()
            .filter(|l| !l.filled && l.price < current_price)
            .max_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
        {
            if (current_price - level.price) / level.price < LEVEL_PROXIMITY {
                info!(level = level.price, price = current_price, "grid buy rung hit");
                level.filled = true;
                return Some(Signal::Buy);
            }
        }

        // Nearest unfilled sell rung above price.
        if let Some(level) = self
            .sell_levels
            .iter_mut()
            .filter(|l| !l.filled && l.price > current_price)
            .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
        {
            if (level.price - current_price) / level.price < LEVEL_PROXIMITY {
                info!(level = level.price, price = current_price, "grid sell rung hit");
                level.filled = true;
                return Some(Signal::Sell);
            }
        }

        None
    }

    fn initialize(&mut self, center: f64) {
        self.center = Some(center);
        self.buy_levels.clear();
        self.sell_levels.clear();

        let half = self.grid_size / 2;
        for i in 1..=half {
            let offset = (self.spacing_pct / 100.0) * i as f64;
            self.buy_levels.push(GridLevel {
                price: center * (1.0 - offset),
                filled: false,
            });
            self.sell_levels.push(GridLevel {
                price: center * (1.0 + offset),
                filled: false,
            });
        }

        self.lower_bound = self
            .buy_levels
            .iter()
            .map(|l| l.price)
            .fold(f64::MAX, f64::min);
        self.upper_bound = self
            .sell_levels
            .iter()
            .map(|l| l.price)
            .fold(f64::MIN, f64::max);
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.center = None;
        self.buy_levels.clear();
        self.sell_levels.clear();
        self.lower_bound = 0.0;
        self.upper_bound = 0.0;
    }
}
