// =============================================================================
// Market Regime Classifier
// =============================================================================
//
// Classifies the current market into one of five regimes from a single
// indicator snapshot.
//
// Detection hierarchy (evaluated top-to-bottom; first match wins):
//
//   1. ADX > 25          -> STRONG_BULL if SMA ratio > bull_threshold,
//                          otherwise STRONG_BEAR (volatility is not consulted)
//   2. vol ratio > vt    -> VOLATILE
//   3. ADX < 20          -> SIDEWAYS
//   4. otherwise         -> TRANSITION (covers 20 <= ADX <= 25)
//
// ADX of exactly 25 is not "> 25" and drops to the volatility check.
// =============================================================================

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::IndicatorSnapshot;

/// ADX above this is a trending market.
pub const TREND_ADX: f64 = 25.0;
/// ADX below this (with calm volatility) is a ranging market.
pub const RANGE_ADX: f64 = 20.0;

/// Accepted range for the bull SMA-ratio threshold.
pub const BULL_THRESHOLD_RANGE: (f64, f64) = (1.03, 1.10);
/// Accepted range for the volatility-ratio threshold.
pub const VOLATILITY_THRESHOLD_RANGE: (f64, f64) = (0.02, 0.05);

// =============================================================================
// Types
// =============================================================================

/// Discrete market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    /// Strong trend with the short average well above the long one.
    StrongBull,
    /// Strong trend otherwise (down, or up without SMA separation).
    StrongBear,
    /// No strong trend, wide bar ranges.
    Volatile,
    /// Weak trend, calm ranges.
    Sideways,
    /// Trend strength between the ranging and trending bands.
    Transition,
}

impl Regime {
    pub const ALL: [Regime; 5] = [
        Self::StrongBull,
        Self::StrongBear,
        Self::Volatile,
        Self::Sideways,
        Self::Transition,
    ];
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBull => write!(f, "STRONG_BULL"),
            Self::StrongBear => write!(f, "STRONG_BEAR"),
            Self::Volatile => write!(f, "VOLATILE"),
            Self::Sideways => write!(f, "SIDEWAYS"),
            Self::Transition => write!(f, "TRANSITION"),
        }
    }
}

fn default_bull_threshold() -> f64 {
    1.05
}

fn default_volatility_threshold() -> f64 {
    0.03
}

/// Calibration inputs for [`classify`]. Tuned per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// SMA(short) / SMA(long) above which a trending market counts as bullish.
    #[serde(default = "default_bull_threshold")]
    pub bull_threshold: f64,

    /// ATR / SMA(short) above which a non-trending market counts as volatile.
    #[serde(default = "default_volatility_threshold")]
    pub volatility_threshold: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            bull_threshold: default_bull_threshold(),
            volatility_threshold: default_volatility_threshold(),
        }
    }
}

impl RegimeThresholds {
    /// Reject values outside the documented calibration ranges.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = BULL_THRESHOLD_RANGE;
        ensure!(
            (lo..=hi).contains(&self.bull_threshold),
            "bull_threshold {} outside [{lo}, {hi}]",
            self.bull_threshold
        );
        let (lo, hi) = VOLATILITY_THRESHOLD_RANGE;
        ensure!(
            (lo..=hi).contains(&self.volatility_threshold),
            "volatility_threshold {} outside [{lo}, {hi}]",
            self.volatility_threshold
        );
        Ok(())
    }
}

// =============================================================================
// Classification logic
// =============================================================================

/// Map an indicator snapshot to a regime.
pub fn classify(snapshot: &IndicatorSnapshot, thresholds: &RegimeThresholds) -> Regime {
    let regime = if snapshot.adx > TREND_ADX {
        if snapshot.sma_ratio() > thresholds.bull_threshold {
            Regime::StrongBull
        } else {
            Regime::StrongBear
        }
    } else if snapshot.volatility_ratio > thresholds.volatility_threshold {
        Regime::Volatile
    } else if snapshot.adx < RANGE_ADX {
        Regime::Sideways
    } else {
        Regime::Transition
    };

    debug!(
        regime = %regime,
        adx = format!("{:.2}", snapshot.adx),
        sma_ratio = format!("{:.4}", snapshot.sma_ratio()),
        volatility_ratio = format!("{:.4}", snapshot.volatility_ratio),
        "Regime classified"
    );

    regime
}
