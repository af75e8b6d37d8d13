// =============================================================================
// Regime Watch — Main Entry Point
// =============================================================================
//
// Watches one instrument, classifies its market regime every refresh interval,
// shows the result on the dashboard and sends a Telegram alert whenever the
// regime changes. Runs until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod cycle;
mod error;
mod indicators;
mod market_data;
mod notify;
mod regime;
mod runtime_config;
mod session;
mod types;

use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::cycle::{RegimeCycle, Scheduler};
use crate::notify::TelegramNotifier;
use crate::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};

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
    info!("║        Regime Watch — Starting Up                        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    // ── 2. Config ────────────────────────────────────────────────────────
    let config_path =
        std::env::var("REGIME_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();
    config.validate().context("invalid runtime config")?;

    info!(
        instrument = %config.instrument,
        interval = %config.interval,
        source = %config.source,
        refresh_secs = config.refresh_interval_secs,
        bull_threshold = config.thresholds.bull_threshold,
        volatility_threshold = config.thresholds.volatility_threshold,
        "Configuration ready"
    );

    // ── 3. Secrets & collaborators ───────────────────────────────────────
    let notifier = Arc::new(TelegramNotifier::from_env()?);
    let admin_token = std::env::var("REGIME_ADMIN_TOKEN").ok();
    if admin_token.as_deref().map_or(true, str::is_empty) {
        warn!("REGIME_ADMIN_TOKEN is not set, threshold updates via API are disabled");
    }

    let source = market_data::build_source(&config)?;
    let bind_addr = config.bind_addr.clone();

    let config = Arc::new(RwLock::new(config));
    let state = Arc::new(AppState::new(config.clone(), &config_path, admin_token));

    // ── 4. Dashboard server ──────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind dashboard server on {bind_addr}"))?;
    info!(addr = %bind_addr, "Dashboard server listening");

    let app = api::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server stopped");
        }
    });

    // ── 5. Regime loop ───────────────────────────────────────────────────
    let cycle = RegimeCycle::new(source, notifier, state.clone(), config.clone());
    let scheduler = Scheduler::new(cycle, config);

    info!("All subsystems running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = scheduler.run() => {}
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl+C")?;
            warn!("Shutdown signal received, stopping");
        }
    }

    info!("Regime Watch shut down complete.");
    Ok(())
}
