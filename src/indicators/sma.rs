// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted mean of the last `period` closes.
//
//   SMA_t = (close_{t-period+1} + ... + close_t) / period
//
// The series form keeps a running sum so the whole chart window costs O(n).
// =============================================================================

/// SMA of the final `period` closes.
///
/// Returns `None` when `period` is zero, there are fewer than `period` closes,
/// or the mean is non-finite.
pub fn calculate_sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let sma = closes[closes.len() - period..].iter().sum::<f64>() / period as f64;
    if sma.is_finite() {
        Some(sma)
    } else {
        None
    }
}

/// Rolling SMA series.
///
/// Element `j` of the output is the SMA ending at close index `period - 1 + j`.
/// Returns an empty `Vec` when the input is too short or `period` is zero.
pub fn calculate_sma_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut sum: f64 = closes[..period].iter().sum();
    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sum / period_f);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result.push(sum / period_f);
    }

    result
}
