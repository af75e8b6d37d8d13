// =============================================================================
// Central Application State — the live dashboard surface
// =============================================================================
//
// The classification loop pushes each finished cycle here through the
// `DisplaySurface` trait; the REST API and the WebSocket feed read it back as
// a serialisable `StateSnapshot`.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared fields.
//   - The runtime config is shared with the loop, which reads the thresholds
//     once per cycle.
// =============================================================================

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::indicators::{ChartPoint, IndicatorSnapshot};
use crate::regime::{Regime, RegimeThresholds, StrategyRecommendation};
use crate::runtime_config::RuntimeConfig;
use crate::types::CyclePhase;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Display surface seam
// =============================================================================

/// Everything one successful cycle wants shown.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    pub regime: Regime,
    pub snapshot: &'a IndicatorSnapshot,
    pub recommendation: &'a StrategyRecommendation,
    pub updated_at: DateTime<Utc>,
    /// Most recent chart points, oldest first.
    pub chart: &'a [ChartPoint],
}

/// Where the loop shows its results.
pub trait DisplaySurface: Send + Sync {
    /// Show current values and append to the rolling chart.
    fn render(&self, frame: &RenderFrame<'_>) -> Result<()>;

    /// Track which phase the loop is in.
    fn set_phase(&self, phase: CyclePhase);

    /// Show a transient regime-change banner.
    fn announce(&self, message: &str);

    /// Append to the operator-visible error log.
    fn report_error(&self, message: String, code: Option<String>);
}

// =============================================================================
// Records
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Machine-readable error code (e.g. `DATA_UNAVAILABLE`).
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Last regime-change banner.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub message: String,
    pub at: String,
}

/// The current classification as shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RegimeView {
    pub regime: Regime,
    pub adx: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub sma_ratio: f64,
    pub atr: f64,
    pub volatility_ratio: f64,
    pub last_close: f64,
    pub strategy: String,
    pub allocation: String,
    pub action_plan: Vec<String>,
    pub updated_at: String,
}

impl RegimeView {
    fn from_frame(frame: &RenderFrame<'_>) -> Self {
        let s = frame.snapshot;
        Self {
            regime: frame.regime,
            adx: s.adx,
            sma_short: s.sma_short,
            sma_long: s.sma_long,
            sma_ratio: s.sma_ratio(),
            atr: s.atr,
            volatility_ratio: s.volatility_ratio,
            last_close: s.last_close,
            strategy: frame.recommendation.strategy.to_string(),
            allocation: frame.recommendation.allocation_label(),
            action_plan: frame
                .recommendation
                .action_plan
                .iter()
                .map(|step| step.to_string())
                .collect(),
            updated_at: frame.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// =============================================================================
// AppState
// =============================================================================

/// Central application state shared between the loop and the API via
/// `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every meaningful mutation. The WebSocket feed uses this
    /// to detect changes and push updates.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    /// Where threshold changes made through the API are saved.
    pub config_path: PathBuf,
    /// Bearer token for mutating endpoints; `None` disables them.
    admin_token: Option<String>,

    // ── Display ─────────────────────────────────────────────────────────
    chart_capacity: usize,
    current: RwLock<Option<RegimeView>>,
    chart: RwLock<VecDeque<ChartPoint>>,
    phase: RwLock<CyclePhase>,
    last_alert: RwLock<Option<AlertRecord>>,
    recent_errors: RwLock<Vec<ErrorRecord>>,
    cycles_rendered: AtomicU64,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: Arc<RwLock<RuntimeConfig>>,
        config_path: impl Into<PathBuf>,
        admin_token: Option<String>,
    ) -> Self {
        let chart_capacity = config.read().chart_points.max(1);
        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),
            runtime_config: config,
            config_path: config_path.into(),
            admin_token: admin_token.filter(|t| !t.is_empty()),
            chart_capacity,
            current: RwLock::new(None),
            chart: RwLock::new(VecDeque::with_capacity(chart_capacity)),
            phase: RwLock::new(CyclePhase::default()),
            last_alert: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            cycles_rendered: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn current_view(&self) -> Option<RegimeView> {
        self.current.read().clone()
    }

    pub fn chart(&self) -> Vec<ChartPoint> {
        self.chart.read().iter().copied().collect()
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.read()
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().clone()
    }

    pub fn thresholds(&self) -> RegimeThresholds {
        self.runtime_config.read().thresholds
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Replace the classification thresholds after validating them.
    /// Returns the previous values.
    pub fn update_thresholds(&self, thresholds: RegimeThresholds) -> Result<RegimeThresholds> {
        thresholds.validate()?;
        let previous = {
            let mut config = self.runtime_config.write();
            std::mem::replace(&mut config.thresholds, thresholds)
        };
        self.increment_version();
        info!(
            bull_threshold = thresholds.bull_threshold,
            volatility_threshold = thresholds.volatility_threshold,
            "Regime thresholds updated"
        );
        Ok(previous)
    }

    /// Merge chart points into the rolling window. A point with the same
    /// timestamp as the newest stored one replaces it; older points are
    /// ignored.
    fn append_chart(&self, points: &[ChartPoint]) {
        let mut chart = self.chart.write();
        for point in points {
            match chart.back() {
                Some(last) if point.timestamp < last.timestamp => continue,
                Some(last) if point.timestamp == last.timestamp => {
                    chart.pop_back();
                }
                _ => {}
            }
            chart.push_back(*point);
        }
        while chart.len() > self.chart_capacity {
            chart.pop_front();
        }
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build the complete dashboard payload served by `GET /api/v1/state` and
    /// the WebSocket push feed.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let config = self.runtime_config.read();
        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            instrument: config.instrument.clone(),
            interval: config.interval.clone(),
            phase: self.phase(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            cycles_rendered: self.cycles_rendered.load(Ordering::Relaxed),
            thresholds: config.thresholds,
            current: self.current_view(),
            last_alert: self.last_alert.read().clone(),
            chart: self.chart(),
            recent_errors: self.recent_errors(),
        }
    }
}

impl DisplaySurface for AppState {
    fn render(&self, frame: &RenderFrame<'_>) -> Result<()> {
        let s = frame.snapshot;
        ensure!(
            [s.adx, s.sma_short, s.sma_long, s.volatility_ratio]
                .iter()
                .all(|v| v.is_finite()),
            "frame carries non-finite indicator values"
        );
        ensure!(!frame.chart.is_empty(), "frame carries no chart points");

        *self.current.write() = Some(RegimeView::from_frame(frame));
        self.append_chart(frame.chart);
        self.cycles_rendered.fetch_add(1, Ordering::Relaxed);
        self.increment_version();

        debug!(regime = %frame.regime, points = frame.chart.len(), "Dashboard rendered");
        Ok(())
    }

    fn set_phase(&self, phase: CyclePhase) {
        let mut current = self.phase.write();
        if *current != phase {
            *current = phase;
            drop(current);
            self.increment_version();
        }
    }

    fn announce(&self, message: &str) {
        *self.last_alert.write() = Some(AlertRecord {
            message: message.to_string(),
            at: Utc::now().to_rfc3339(),
        });
        self.increment_version();
    }

    fn report_error(&self, message: String, code: Option<String>) {
        let record = ErrorRecord {
            message,
            code,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

/// Full dashboard state.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub instrument: String,
    pub interval: String,
    pub phase: CyclePhase,
    pub uptime_secs: u64,
    pub cycles_rendered: u64,
    pub thresholds: RegimeThresholds,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<RegimeView>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_alert: Option<AlertRecord>,

    pub chart: Vec<ChartPoint>,
    pub recent_errors: Vec<ErrorRecord>,
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::regime::resolve;

    pub(crate) fn test_state(chart_points: usize) -> AppState {
        let config = RuntimeConfig {
            chart_points,
            ..RuntimeConfig::default()
        };
        AppState::new(
            Arc::new(RwLock::new(config)),
            std::env::temp_dir().join("regime-watch-unused.json"),
            Some("admin-secret".to_string()),
        )
    }

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            adx: 30.0,
            sma_short: 108.0,
            sma_long: 100.0,
            atr: 1.08,
            volatility_ratio: 0.01,
            last_close: 109.0,
        }
    }

    fn points(range: std::ops::Range<i64>) -> Vec<ChartPoint> {
        range
            .map(|t| ChartPoint {
                timestamp: t,
                close: t as f64,
                sma_short: None,
                sma_long: None,
            })
            .collect()
    }

    #[test]
    fn render_sets_current_view() {
        let state = test_state(50);
        let snap = snapshot();
        let rec = resolve(Regime::StrongBull);
        let chart = points(0..5);
        let v0 = state.current_state_version();
        state
            .render(&RenderFrame {
                regime: Regime::StrongBull,
                snapshot: &snap,
                recommendation: &rec,
                updated_at: Utc::now(),
                chart: &chart,
            })
            .unwrap();

        let view = state.current_view().unwrap();
        assert_eq!(view.regime, Regime::StrongBull);
        assert_eq!(view.strategy, "DMA Momentum");
        assert_eq!(view.allocation, "100%");
        assert!((view.sma_ratio - 1.08).abs() < 1e-12);
        assert!(state.current_state_version() > v0);
        assert_eq!(state.chart().len(), 5);
    }

    #[test]
    fn render_rejects_empty_chart() {
        let state = test_state(50);
        let snap = snapshot();
        let rec = resolve(Regime::StrongBull);
        let err = state.render(&RenderFrame {
            regime: Regime::StrongBull,
            snapshot: &snap,
            recommendation: &rec,
            updated_at: Utc::now(),
            chart: &[],
        });
        assert!(err.is_err());
        assert!(state.current_view().is_none());
    }

    #[test]
    fn chart_rolls_and_replaces_last_point() {
        let state = test_state(10);
        state.append_chart(&points(0..8));
        state.append_chart(&points(5..15));
        let chart = state.chart();
        assert_eq!(chart.len(), 10);
        assert_eq!(chart.first().unwrap().timestamp, 5);
        assert_eq!(chart.last().unwrap().timestamp, 14);

        // Same timestamp as the newest point: updated in place.
        let mut revised = points(14..15);
        revised[0].close = 99.0;
        state.append_chart(&revised);
        let chart = state.chart();
        assert_eq!(chart.len(), 10);
        assert!((chart.last().unwrap().close - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn error_log_is_capped() {
        let state = test_state(10);
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.report_error(format!("e{i}"), None);
        }
        let errors = state.recent_errors();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "e5");
    }

    #[test]
    fn threshold_update_validates() {
        let state = test_state(10);
        let bad = RegimeThresholds {
            bull_threshold: 2.0,
            volatility_threshold: 0.03,
        };
        assert!(state.update_thresholds(bad).is_err());
        assert_eq!(state.thresholds(), RegimeThresholds::default());

        let good = RegimeThresholds {
            bull_threshold: 1.07,
            volatility_threshold: 0.04,
        };
        let previous = state.update_thresholds(good).unwrap();
        assert_eq!(previous, RegimeThresholds::default());
        assert_eq!(state.thresholds(), good);
    }

    #[test]
    fn phase_change_bumps_version_once() {
        let state = test_state(10);
        let v0 = state.current_state_version();
        state.set_phase(CyclePhase::Classifying);
        state.set_phase(CyclePhase::Classifying);
        assert_eq!(state.current_state_version(), v0 + 1);
        assert_eq!(state.build_snapshot().phase, CyclePhase::Classifying);
    }
}
