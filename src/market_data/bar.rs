use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar at a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, unix seconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Bars for one instrument at one interval, strictly ascending by timestamp.
///
/// Fetched fresh every cycle and dropped at the end of it.
#[derive(Debug, Clone)]
pub struct BarSeries {
    instrument: String,
    interval: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series, rejecting out-of-order or duplicate timestamps and
    /// non-finite prices.
    pub fn new(
        instrument: impl Into<String>,
        interval: impl Into<String>,
        bars: Vec<Bar>,
    ) -> Result<Self> {
        let instrument = instrument.into();

        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_finite() {
                bail!("{instrument}: bar {i} at {} has non-finite prices", bar.timestamp);
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                bail!(
                    "{instrument}: bar timestamps not strictly ascending at index {i} ({} after {})",
                    bar.timestamp,
                    bars[i - 1].timestamp
                );
            }
        }

        Ok(Self {
            instrument,
            interval: interval.into(),
            bars,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Closing prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Keep only the most recent `count` bars.
    pub fn truncate_front(&mut self, count: usize) {
        let start = self.bars.len().saturating_sub(count);
        if start > 0 {
            self.bars.drain(..start);
        }
    }
}
