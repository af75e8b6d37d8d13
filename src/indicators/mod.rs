// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the regime
// classifier reads. Point calculations return `Option<T>` so callers are
// forced to handle insufficient-data and numerical-edge-case scenarios;
// `snapshot` folds them into one all-or-nothing result.

pub mod adx;
pub mod atr;
pub mod sma;
pub mod snapshot;

pub use snapshot::{chart_points, compute_snapshot, ChartPoint, IndicatorParams, IndicatorSnapshot};
