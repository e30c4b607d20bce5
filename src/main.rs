// =============================================================================
// Saffron — Adaptive Multi-Coin Spot Trader — Main Entry Point
// =============================================================================
//
// Startup order matters: configuration is validated first (a missing or
// unparseable key aborts before anything touches the network), then the
// live-mode safety pause, then store + client + coordinator. The engine
// defaults to DRY_RUN=true; real orders require an explicit opt-out.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod config;
mod errors;
mod exchange;
mod executor;
mod fees;
mod indicators;
mod market_data;
mod sizing;
mod store;
mod strategy;
mod trader;
mod types;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::exchange::KrakenClient;
use crate::executor::ExecutionCoordinator;
use crate::store::TradingStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Saffron — Adaptive Multi-Coin Spot Trader        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    // ── 2. Configuration (typed; any bad key aborts here) ────────────────
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error — refusing to start");
            return Err(e.into());
        }
    };

    info!(
        pairs = ?config.trading_pairs,
        interval_min = config.ohlc_interval_min,
        sizing = ?config.sizing_mode,
        max_total_exposure = config.max_total_exposure_pct,
        max_per_coin = config.max_per_coin_pct,
        "configuration loaded"
    );

    // ── 3. Safety gate ───────────────────────────────────────────────────
    if config.dry_run {
        info!("mode: DRY RUN — no real orders will be placed (dry_run=true)");
    } else {
        warn!("mode: ⚠ LIVE TRADING — real money at risk (dry_run=false)");
        warn!("you have 5 seconds to cancel (Ctrl+C)...");
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }

    // ── 4. Credentials ───────────────────────────────────────────────────
    let api_key = std::env::var("KRAKEN_API_KEY").unwrap_or_default();
    let api_secret = std::env::var("KRAKEN_API_SECRET").unwrap_or_default();
    if !config.dry_run && (api_key.is_empty() || api_secret.is_empty()) {
        error!("KRAKEN_API_KEY / KRAKEN_API_SECRET are required for live trading");
        anyhow::bail!("missing exchange credentials for live mode");
    }

    // ── 5. Store, client, coordinator ────────────────────────────────────
    let store = TradingStore::open(&config.db_path)?;
    let client = Arc::new(KrakenClient::new(api_key, api_secret));
    let mut coordinator = ExecutionCoordinator::new(client, store, config);

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    let running = coordinator.running_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown signal received — finishing current iteration");
            running.store(false, Ordering::SeqCst);
        }
    });

    // ── 7. Run until stopped ─────────────────────────────────────────────
    coordinator.run().await?;

    info!("Saffron shut down complete.");
    Ok(())
}
