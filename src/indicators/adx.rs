// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// ADX quantifies trend **strength** regardless of direction.
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.
//   2. Compute True Range (TR) per bar.
//   3. Apply Wilder's smoothing (period) to +DM, -DM, and TR.
//   4. Derive +DI = smoothed(+DM) / smoothed(TR) * 100
//            -DI = smoothed(-DM) / smoothed(TR) * 100
//   5. DX  = |+DI - -DI| / (+DI + -DI) * 100
//   6. ADX = Wilder's smoothed average of DX over `period` bars.
//
// Interpretation:
//   ADX > 25  => trending market
//   ADX < 20  => ranging / choppy market
// =============================================================================

use crate::market_data::Bar;

/// Compute the most recent ADX value from a slice of bars (oldest first).
///
/// Returns `None` when:
/// - `period` is zero.
/// - There are fewer than [`min_bars`] bars.
/// - The trailing smoothed true range is zero.
/// - The final value is non-finite.
pub fn calculate_adx(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }

    if bars.len() < min_bars(period) {
        return None;
    }

    let period_f = period as f64;

    // ------------------------------------------------------------------
    // Step 1 & 2: Raw +DM, -DM, and True Range for each consecutive pair
    // ------------------------------------------------------------------
    let n = bars.len();
    let bar_count = n - 1; // number of bar-to-bar transitions

    let mut plus_dm = Vec::with_capacity(bar_count);
    let mut minus_dm = Vec::with_capacity(bar_count);
    let mut tr_vals = Vec::with_capacity(bar_count);

    for i in 1..n {
        let high = bars[i].high;
        let low = bars[i].low;
        let prev_high = bars[i - 1].high;
        let prev_low = bars[i - 1].low;
        let tr = bars[i].true_range(bars[i - 1].close);

        // Directional Movement
        let up_move = high - prev_high;
        let down_move = prev_low - low;

        let pdm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let mdm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        plus_dm.push(pdm);
        minus_dm.push(mdm);
        tr_vals.push(tr);
    }

    // ------------------------------------------------------------------
    // Step 3: Wilder's smoothing of +DM, -DM, TR (first `period` values)
    // ------------------------------------------------------------------
    let mut smooth_plus_dm: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus_dm: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = tr_vals[..period].iter().sum();

    // Collect DX values starting at index `period`.
    let mut dx_values: Vec<f64> = Vec::with_capacity(bar_count - period + 1);

    // First DI / DX at index `period - 1` (after initial sum). A stretch with
    // no true range at all has no directional movement either: DX = 0.
    dx_values.push(compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr).unwrap_or(0.0));

    // Continue Wilder's smoothing for bars `period .. bar_count`.
    for i in period..bar_count {
        smooth_plus_dm = smooth_plus_dm - smooth_plus_dm / period_f + plus_dm[i];
        smooth_minus_dm = smooth_minus_dm - smooth_minus_dm / period_f + minus_dm[i];
        smooth_tr = smooth_tr - smooth_tr / period_f + tr_vals[i];

        dx_values.push(compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr).unwrap_or(0.0));
    }

    // The trailing window itself must have moved, otherwise +DI/-DI are
    // undefined for the most recent bar.
    if smooth_tr == 0.0 {
        return None;
    }

    // ------------------------------------------------------------------
    // Step 6: ADX = Wilder's smoothed average of DX
    // ------------------------------------------------------------------
    if dx_values.len() < period {
        return None;
    }

    // Seed ADX with SMA of first `period` DX values.
    let adx_seed: f64 = dx_values[..period].iter().sum::<f64>() / period_f;
    if !adx_seed.is_finite() {
        return None;
    }

    let mut adx = adx_seed;
    for &dx in &dx_values[period..] {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
        if !adx.is_finite() {
            return None;
        }
    }

    if adx.is_finite() {
        Some(adx)
    } else {
        None
    }
}

/// Bars needed for one ADX value: `period` transitions to seed the Wilder
/// sums, `period` DX values to seed the average, plus the first bar which has
/// no predecessor.
pub fn min_bars(period: usize) -> usize {
    2 * period + 1
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Compute DX from smoothed +DM, -DM, and TR values.
///
/// Returns `None` if the divisor is zero or the result is non-finite.
fn compute_dx(smooth_plus_dm: f64, smooth_minus_dm: f64, smooth_tr: f64) -> Option<f64> {
    if smooth_tr == 0.0 {
        return None;
    }

    let plus_di = (smooth_plus_dm / smooth_tr) * 100.0;
    let minus_di = (smooth_minus_dm / smooth_tr) * 100.0;

    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        // Both +DI and -DI are zero; no directional movement.
        return Some(0.0);
    }

    let dx = ((plus_di - minus_di).abs() / di_sum) * 100.0;

    if dx.is_finite() {
        Some(dx)
    } else {
        None
    }
}
