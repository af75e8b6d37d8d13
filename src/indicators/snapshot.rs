// =============================================================================
// Indicator Snapshot
// =============================================================================
//
// Reduces a bar series to the handful of scalars the regime classifier reads:
//
//   adx              ADX(adx_period)                trend strength, 0..100
//   sma_short        SMA(sma_short) of closes
//   sma_long         SMA(sma_long) of closes
//   atr              ATR(atr_period), Wilder
//   volatility_ratio atr / sma_short                dimensionless
//
// The volatility ratio divides by the short SMA rather than the last price.
// That mirrors how the calibration thresholds were chosen and is kept as is.
//
// A snapshot is all-or-nothing: if any value is undefined the whole snapshot
// is an error, so a NaN can never reach the classifier.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::CycleError;
use crate::indicators::adx::{self, calculate_adx};
use crate::indicators::atr::calculate_atr;
use crate::indicators::sma::{calculate_sma, calculate_sma_series};
use crate::market_data::BarSeries;

fn default_adx_period() -> usize {
    14
}

fn default_sma_short() -> usize {
    50
}

fn default_sma_long() -> usize {
    200
}

fn default_atr_period() -> usize {
    14
}

/// Window lengths for every indicator in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_adx_period")]
    pub adx_period: usize,

    #[serde(default = "default_sma_short")]
    pub sma_short: usize,

    #[serde(default = "default_sma_long")]
    pub sma_long: usize,

    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            adx_period: default_adx_period(),
            sma_short: default_sma_short(),
            sma_long: default_sma_long(),
            atr_period: default_atr_period(),
        }
    }
}

impl IndicatorParams {
    /// Minimum number of bars for every indicator to be defined.
    pub fn required_bars(&self) -> usize {
        self.sma_long
            .max(self.sma_short)
            .max(adx::min_bars(self.adx_period))
            .max(self.atr_period + 1)
    }
}

/// Indicator values at the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub adx: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub atr: f64,
    pub volatility_ratio: f64,
    pub last_close: f64,
}

impl IndicatorSnapshot {
    /// Short SMA over long SMA; > 1 means the short average sits above.
    pub fn sma_ratio(&self) -> f64 {
        self.sma_short / self.sma_long
    }
}

/// Compute the snapshot for the last bar of `series`.
pub fn compute_snapshot(
    series: &BarSeries,
    params: &IndicatorParams,
) -> Result<IndicatorSnapshot, CycleError> {
    let need = params.required_bars();
    if series.len() < need {
        return Err(CycleError::IndicatorUndefined {
            have: series.len(),
            need,
        });
    }

    let bars = series.bars();
    let closes = series.closes();

    let adx = calculate_adx(bars, params.adx_period)
        .ok_or(CycleError::DegenerateIndicator { name: "ADX" })?;
    let sma_short = calculate_sma(&closes, params.sma_short)
        .ok_or(CycleError::DegenerateIndicator { name: "SMA short" })?;
    let sma_long = calculate_sma(&closes, params.sma_long)
        .ok_or(CycleError::DegenerateIndicator { name: "SMA long" })?;
    let atr = calculate_atr(bars, params.atr_period)
        .ok_or(CycleError::DegenerateIndicator { name: "ATR" })?;

    if sma_short == 0.0 || sma_long == 0.0 {
        return Err(CycleError::DegenerateIndicator { name: "SMA ratio" });
    }

    let volatility_ratio = atr / sma_short;
    if !volatility_ratio.is_finite() {
        return Err(CycleError::DegenerateIndicator { name: "volatility ratio" });
    }

    let last_close = closes[closes.len() - 1];

    Ok(IndicatorSnapshot {
        adx,
        sma_short,
        sma_long,
        atr,
        volatility_ratio,
        last_close,
    })
}

/// One point of the rolling price chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: i64,
    pub close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_short: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_long: Option<f64>,
}

/// Close, short SMA and long SMA for the last `count` bars.
///
/// SMA values are `None` for bars earlier than their window.
pub fn chart_points(series: &BarSeries, params: &IndicatorParams, count: usize) -> Vec<ChartPoint> {
    let closes = series.closes();
    let short = calculate_sma_series(&closes, params.sma_short);
    let long = calculate_sma_series(&closes, params.sma_long);

    // SMA series element j lines up with close index period - 1 + j.
    let at = |values: &[f64], period: usize, i: usize| -> Option<f64> {
        if period == 0 || i + 1 < period {
            None
        } else {
            values.get(i + 1 - period).copied()
        }
    };

    let start = series.len().saturating_sub(count);
    series.bars()[start..]
        .iter()
        .enumerate()
        .map(|(offset, bar)| {
            let i = start + offset;
            ChartPoint {
                timestamp: bar.timestamp,
                close: bar.close,
                sma_short: at(&short, params.sma_short, i),
                sma_long: at(&long, params.sma_long, i),
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market_data::Bar;

    /// Linear uptrend: close = 100 + step * i, fixed +-0.3 range.
    pub(crate) fn trending_series(n: usize, step: f64) -> BarSeries {
        let bars = (0..n)
            .map(|i| {
                let close = 100.0 + step * i as f64;
                Bar::new(i as i64 * 300, close - step, close + 0.3, close - 0.3, close, 1_000.0)
            })
            .collect();
        BarSeries::new("TEST", "5m", bars).unwrap()
    }

    /// Flat market: identical bars around 100.
    pub(crate) fn flat_series(n: usize) -> BarSeries {
        let bars = (0..n)
            .map(|i| Bar::new(i as i64 * 300, 100.0, 100.3, 99.7, 100.0, 1_000.0))
            .collect();
        BarSeries::new("TEST", "5m", bars).unwrap()
    }

    /// Uptrend with a counter-move on every other bar: +0.75 / -0.5 closes,
    /// down bars reaching further below their close than up bars do. Every up
    /// bar carries +DM 0.25 and every down bar -DM 0.135, which settles ADX
    /// near 30. The drift of 0.125 per bar puts SMA(50)/SMA(200) near 1.08 and
    /// the mean true range of about 1.32 puts ATR/SMA(50) near 0.01.
    pub(crate) fn choppy_uptrend_series(n: usize) -> BarSeries {
        const UP: f64 = 0.75;
        const DOWN: f64 = 0.5;
        const WICK: f64 = 0.25;
        const DOWN_WICK: f64 = 0.635;

        let mut bars = vec![Bar::new(0, 100.0, 100.0 + WICK, 100.0 - WICK, 100.0, 1_000.0)];
        for i in 1..n {
            let open = bars[i - 1].close;
            let bar = if i % 2 == 1 {
                let close = open + UP;
                Bar::new(i as i64 * 300, open, close + WICK, open - WICK, close, 1_000.0)
            } else {
                let close = open - DOWN;
                Bar::new(i as i64 * 300, open, open + WICK, close - DOWN_WICK, close, 1_000.0)
            };
            bars.push(bar);
        }
        BarSeries::new("TEST", "5m", bars).unwrap()
    }

    #[test]
    fn required_bars_defaults_to_long_sma() {
        assert_eq!(IndicatorParams::default().required_bars(), 200);
        let short = IndicatorParams {
            adx_period: 14,
            sma_short: 5,
            sma_long: 10,
            atr_period: 14,
        };
        // ADX needs 2 * 14 + 1.
        assert_eq!(short.required_bars(), 29);
    }

    #[test]
    fn too_few_bars_is_indicator_undefined() {
        let err = compute_snapshot(&trending_series(120, 0.12), &IndicatorParams::default()).unwrap_err();
        assert!(matches!(err, CycleError::IndicatorUndefined { have: 120, need: 200 }));
    }

    #[test]
    fn trending_snapshot_values() {
        let snap = compute_snapshot(&trending_series(250, 0.12), &IndicatorParams::default()).unwrap();
        // Last index 249: SMA50 mean index 224.5, SMA200 mean index 149.5.
        assert!((snap.sma_short - (100.0 + 0.12 * 224.5)).abs() < 1e-9);
        assert!((snap.sma_long - (100.0 + 0.12 * 149.5)).abs() < 1e-9);
        assert!(snap.sma_ratio() > 1.05);
        // Only upward movement: DX is 100 on every bar.
        assert!(snap.adx > 25.0);
        // TR is the constant 0.6 bar range.
        assert!((snap.atr - 0.6).abs() < 1e-9);
        assert!(snap.volatility_ratio < 0.03);
    }

    #[test]
    fn flat_snapshot_has_no_trend() {
        let snap = compute_snapshot(&flat_series(220), &IndicatorParams::default()).unwrap();
        assert!(snap.adx < 1.0);
        assert!((snap.sma_ratio() - 1.0).abs() < 1e-12);
        assert!((snap.volatility_ratio - 0.006).abs() < 1e-9);
    }

    #[test]
    fn zero_range_series_is_degenerate() {
        let bars = (0..220)
            .map(|i| Bar::new(i * 300, 100.0, 100.0, 100.0, 100.0, 0.0))
            .collect();
        let series = BarSeries::new("TEST", "5m", bars).unwrap();
        let err = compute_snapshot(&series, &IndicatorParams::default()).unwrap_err();
        assert!(matches!(err, CycleError::DegenerateIndicator { name: "ADX" }));
    }

    #[test]
    fn choppy_uptrend_lands_on_moderate_trend() {
        let snap = compute_snapshot(&choppy_uptrend_series(250), &IndicatorParams::default()).unwrap();
        assert!((27.0..33.0).contains(&snap.adx), "ADX {}", snap.adx);
        assert!((snap.sma_ratio() - 1.08).abs() < 0.005, "ratio {}", snap.sma_ratio());
        assert!((snap.volatility_ratio - 0.01).abs() < 0.001, "vol {}", snap.volatility_ratio);
    }

    #[test]
    fn stale_flat_stretch_does_not_poison_snapshot() {
        // 20 bars with O=H=L=C, then a normal trend filling the lookback.
        let mut bars: Vec<Bar> = (0..20)
            .map(|i| Bar::new(i * 300, 100.0, 100.0, 100.0, 100.0, 0.0))
            .collect();
        bars.extend(trending_series(230, 0.12).bars().iter().map(|b| Bar {
            timestamp: b.timestamp + 20 * 300,
            ..*b
        }));
        let series = BarSeries::new("TEST", "5m", bars).unwrap();

        let snap = compute_snapshot(&series, &IndicatorParams::default()).unwrap();
        assert!(snap.adx > 25.0);
        assert!(snap.atr > 0.0);
    }

    #[test]
    fn chart_points_align_smas() {
        let series = trending_series(250, 0.12);
        let params = IndicatorParams::default();
        let points = chart_points(&series, &params, 50);
        assert_eq!(points.len(), 50);
        let last = points.last().unwrap();
        assert_eq!(last.timestamp, 249 * 300);
        let snap = compute_snapshot(&series, &params).unwrap();
        assert!((last.sma_short.unwrap() - snap.sma_short).abs() < 1e-9);
        assert!((last.sma_long.unwrap() - snap.sma_long).abs() < 1e-9);
    }

    #[test]
    fn chart_points_before_window_have_no_sma() {
        let series = trending_series(60, 0.12);
        let points = chart_points(&series, &IndicatorParams::default(), 100);
        assert_eq!(points.len(), 60);
        assert!(points[0].sma_short.is_none());
        assert!(points[49].sma_short.is_some());
        assert!(points.iter().all(|p| p.sma_long.is_none()));
    }
}
