// =============================================================================
// Runtime Configuration — Hot-reloadable watcher settings with atomic save
// =============================================================================
//
// Every tunable lives here so the watcher can be recalibrated without a code
// change. The classification thresholds can additionally be changed while
// running through the dashboard API; the loop picks them up at the start of
// the next cycle.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// Secrets (Telegram token, admin token) are NOT part of this file; they come
// from the environment at startup.
// =============================================================================

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::IndicatorParams;
use crate::regime::RegimeThresholds;
use crate::types::DataSourceKind;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "regime_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_instrument() -> String {
    "NIFTYBEES.NS".to_string()
}

fn default_interval() -> String {
    "5m".to_string()
}

fn default_yahoo_range() -> String {
    "1mo".to_string()
}

fn default_lookback_bars() -> usize {
    300
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_error_cooldown_secs() -> u64 {
    60
}

fn default_chart_points() -> usize {
    50
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Market data --------------------------------------------------------

    /// Ticker / symbol of the single instrument being watched.
    #[serde(default = "default_instrument")]
    pub instrument: String,

    /// Bar interval understood by the source (`5m`, `15m`, ...).
    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default)]
    pub source: DataSourceKind,

    /// Yahoo look-back window. Ignored by other sources.
    #[serde(default = "default_yahoo_range")]
    pub yahoo_range: String,

    /// Bars requested per cycle; must cover the longest indicator window.
    #[serde(default = "default_lookback_bars")]
    pub lookback_bars: usize,

    // --- Scheduling ---------------------------------------------------------

    /// Pause between successful cycles.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Shorter pause after a failed cycle.
    #[serde(default = "default_error_cooldown_secs")]
    pub error_cooldown_secs: u64,

    // --- Classification -----------------------------------------------------

    #[serde(default)]
    pub thresholds: RegimeThresholds,

    #[serde(default)]
    pub indicators: IndicatorParams,

    // --- Dashboard ----------------------------------------------------------

    /// Number of bars kept on the rolling price chart.
    #[serde(default = "default_chart_points")]
    pub chart_points: usize,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            interval: default_interval(),
            source: DataSourceKind::default(),
            yahoo_range: default_yahoo_range(),
            lookback_bars: default_lookback_bars(),
            refresh_interval_secs: default_refresh_interval_secs(),
            error_cooldown_secs: default_error_cooldown_secs(),
            thresholds: RegimeThresholds::default(),
            indicators: IndicatorParams::default(),
            chart_points: default_chart_points(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            instrument = %config.instrument,
            source = %config.source,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `REGIME_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(instrument) = std::env::var("REGIME_TICKER") {
            let instrument = instrument.trim();
            if !instrument.is_empty() {
                self.instrument = instrument.to_string();
            }
        }
        if let Ok(addr) = std::env::var("REGIME_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
    }

    /// Check every field the loop depends on. Called once before the loop
    /// starts; a failure aborts startup.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        let p = &self.indicators;
        ensure!(
            p.adx_period > 0 && p.sma_short > 0 && p.sma_long > 0 && p.atr_period > 0,
            "indicator periods must be positive"
        );
        ensure!(
            p.sma_short < p.sma_long,
            "sma_short ({}) must be shorter than sma_long ({})",
            p.sma_short,
            p.sma_long
        );
        ensure!(
            self.lookback_bars >= p.required_bars(),
            "lookback_bars ({}) below the {} bars the indicators need",
            self.lookback_bars,
            p.required_bars()
        );
        ensure!(!self.instrument.trim().is_empty(), "instrument is empty");
        ensure!(self.refresh_interval_secs > 0, "refresh_interval_secs must be positive");
        ensure!(self.error_cooldown_secs > 0, "error_cooldown_secs must be positive");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.instrument, "NIFTYBEES.NS");
        assert_eq!(cfg.interval, "5m");
        assert_eq!(cfg.source, DataSourceKind::Yahoo);
        assert_eq!(cfg.refresh_interval_secs, 300);
        assert_eq!(cfg.error_cooldown_secs, 60);
        assert_eq!(cfg.chart_points, 50);
        assert!((cfg.thresholds.bull_threshold - 1.05).abs() < f64::EPSILON);
        assert!((cfg.thresholds.volatility_threshold - 0.03).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.instrument, "NIFTYBEES.NS");
        assert_eq!(cfg.indicators, IndicatorParams::default());
        assert_eq!(cfg.lookback_bars, 300);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "source": "binance", "instrument": "BTCUSDT", "thresholds": { "bull_threshold": 1.07 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.source, DataSourceKind::Binance);
        assert_eq!(cfg.instrument, "BTCUSDT");
        assert!((cfg.thresholds.bull_threshold - 1.07).abs() < f64::EPSILON);
        assert!((cfg.thresholds.volatility_threshold - 0.03).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_out_of_range_thresholds() {
        let mut cfg = RuntimeConfig::default();
        cfg.thresholds.volatility_threshold = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_short_lookback() {
        let mut cfg = RuntimeConfig::default();
        cfg.lookback_bars = 150;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("lookback_bars"));
    }

    #[test]
    fn validate_rejects_inverted_smas() {
        let mut cfg = RuntimeConfig::default();
        cfg.indicators.sma_short = 200;
        cfg.indicators.sma_long = 50;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("regime-watch-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("regime_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.thresholds.bull_threshold = 1.08;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert!((loaded.thresholds.bull_threshold - 1.08).abs() < f64::EPSILON);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
