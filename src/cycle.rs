// =============================================================================
// Classification Cycle & Scheduler
// =============================================================================
//
// One cycle:
//
//   FETCHING ──► CLASSIFYING ──► RENDERING ──► (NOTIFYING) ──► done
//
// `RegimeCycle::run` performs exactly one pass and returns either a report or
// a `CycleError`. It never sleeps and never loops. `Scheduler` owns the
// session state, calls the cycle forever and picks the pause that follows:
// the refresh interval after a success, the shorter cool-down after a failure.
//
// Session state only advances once the frame has been rendered. A failed
// notification is surfaced but does not fail the cycle.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::app_state::{DisplaySurface, RenderFrame};
use crate::error::CycleError;
use crate::indicators::{chart_points, compute_snapshot, IndicatorSnapshot};
use crate::market_data::MarketDataSource;
use crate::notify::{transition_message, NotificationSink};
use crate::regime::{classify, resolve, Regime, StrategyRecommendation};
use crate::runtime_config::RuntimeConfig;
use crate::session::SessionState;
use crate::types::CyclePhase;

/// Outcome of one successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub regime: Regime,
    pub previous: Option<Regime>,
    pub snapshot: IndicatorSnapshot,
    pub recommendation: StrategyRecommendation,
    /// A transition alert was delivered.
    pub notified: bool,
    /// A transition alert was due but the sink refused it.
    pub notification_failed: bool,
}

/// Collaborators of one cycle, injected at construction.
pub struct RegimeCycle {
    source: Arc<dyn MarketDataSource>,
    notifier: Arc<dyn NotificationSink>,
    display: Arc<dyn DisplaySurface>,
    config: Arc<RwLock<RuntimeConfig>>,
}

impl RegimeCycle {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        notifier: Arc<dyn NotificationSink>,
        display: Arc<dyn DisplaySurface>,
        config: Arc<RwLock<RuntimeConfig>>,
    ) -> Self {
        Self {
            source,
            notifier,
            display,
            config,
        }
    }

    pub fn display(&self) -> &Arc<dyn DisplaySurface> {
        &self.display
    }

    /// Run one fetch/classify/render/notify pass.
    #[instrument(skip_all, name = "cycle")]
    pub async fn run(&self, session: &mut SessionState) -> Result<CycleReport, CycleError> {
        // Thresholds may change between cycles through the API; take one
        // consistent copy per cycle.
        let (instrument, interval, lookback, thresholds, params, chart_len) = {
            let c = self.config.read();
            (
                c.instrument.clone(),
                c.interval.clone(),
                c.lookback_bars,
                c.thresholds,
                c.indicators,
                c.chart_points,
            )
        };

        // ── FETCHING ────────────────────────────────────────────────────
        self.display.set_phase(CyclePhase::Fetching);
        let series = self
            .source
            .fetch_bars(&instrument, &interval, lookback)
            .await
            .map_err(|e| CycleError::DataUnavailable(format!("{}: {e:#}", self.source.name())))?;

        if series.is_empty() {
            return Err(CycleError::DataUnavailable(format!(
                "{} returned no {interval} bars for {instrument}",
                self.source.name()
            )));
        }
        debug!(
            source = self.source.name(),
            instrument = series.instrument(),
            interval = series.interval(),
            bars = series.len(),
            "Bars fetched"
        );

        // ── CLASSIFYING ─────────────────────────────────────────────────
        self.display.set_phase(CyclePhase::Classifying);
        let snapshot = compute_snapshot(&series, &params)?;
        let regime = classify(&snapshot, &thresholds);
        let recommendation = resolve(regime);

        // ── RENDERING ───────────────────────────────────────────────────
        self.display.set_phase(CyclePhase::Rendering);
        let now = Utc::now();
        let chart = chart_points(&series, &params, chart_len);
        self.display
            .render(&RenderFrame {
                regime,
                snapshot: &snapshot,
                recommendation: &recommendation,
                updated_at: now,
                chart: &chart,
            })
            .map_err(|e| CycleError::Render(format!("{e:#}")))?;

        // ── NOTIFYING ───────────────────────────────────────────────────
        let previous = session.last_regime;
        let mut notified = false;
        let mut notification_failed = false;

        if let Some(message) = transition_message(previous, regime) {
            self.display.set_phase(CyclePhase::Notifying);
            self.display.announce(&message);
            match self.notifier.send(&message).await {
                Ok(()) => {
                    notified = true;
                    info!(%message, "Regime change alert sent");
                }
                Err(e) => {
                    notification_failed = true;
                    warn!(error = %e, "Regime change alert failed");
                    self.display
                        .report_error(format!("notification failed: {e:#}"), None);
                }
            }
        }

        session.record(regime, now);

        info!(
            %instrument,
            %regime,
            adx = snapshot.adx,
            sma_ratio = snapshot.sma_ratio(),
            volatility_ratio = snapshot.volatility_ratio,
            strategy = recommendation.strategy,
            "Cycle complete"
        );

        Ok(CycleReport {
            regime,
            previous,
            snapshot,
            recommendation,
            notified,
            notification_failed,
        })
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Pause before the next cycle.
pub fn next_delay<T>(outcome: &Result<T, CycleError>, config: &RuntimeConfig) -> Duration {
    match outcome {
        Ok(_) => Duration::from_secs(config.refresh_interval_secs),
        Err(_) => Duration::from_secs(config.error_cooldown_secs),
    }
}

/// Drives `RegimeCycle` forever and owns the session state.
pub struct Scheduler {
    cycle: RegimeCycle,
    session: SessionState,
    config: Arc<RwLock<RuntimeConfig>>,
}

impl Scheduler {
    pub fn new(cycle: RegimeCycle, config: Arc<RwLock<RuntimeConfig>>) -> Self {
        Self {
            cycle,
            session: SessionState::new(),
            config,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Run one cycle, surface any failure and return how long to wait.
    pub async fn tick(&mut self) -> Duration {
        let outcome = self.cycle.run(&mut self.session).await;

        match &outcome {
            Ok(report) => debug!(
                regime = %report.regime,
                previous = ?report.previous,
                adx = report.snapshot.adx,
                allocation = report.recommendation.allocation_pct,
                notified = report.notified,
                notification_failed = report.notification_failed,
                "Cycle report"
            ),
            Err(e) => {
                error!(error = %e, code = e.code(), "Cycle failed");
                self.cycle
                    .display()
                    .report_error(e.to_string(), Some(e.code().to_string()));
            }
        }

        let delay = next_delay(&outcome, &self.config.read());
        self.cycle.display().set_phase(CyclePhase::Waiting);
        delay
    }

    /// Loop until the task is dropped.
    pub async fn run(mut self) {
        info!("Regime loop started");
        loop {
            let delay = self.tick().await;
            tokio::time::sleep(delay).await;
        }
    }
}
