// =============================================================================
// Cycle Error Taxonomy
// =============================================================================
//
// Every failure that can abort a classification cycle. All variants are
// recoverable: the scheduler logs them, surfaces them on the dashboard, waits
// the failure cool-down and starts over at FETCHING.
//
// A failed notification is deliberately absent: the cycle still completes and
// session state still advances when the outbound alert fails.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CycleError {
    /// The market-data source failed or returned no usable bars.
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    /// Too few bars (or a degenerate series) to compute every indicator.
    #[error("indicators undefined: have {have} bars, need {need}")]
    IndicatorUndefined { have: usize, need: usize },

    /// An indicator computed to a non-finite or zero-divisor value.
    #[error("indicator {name} is undefined for the current series")]
    DegenerateIndicator { name: &'static str },

    /// The display surface rejected the frame.
    #[error("render failed: {0}")]
    Render(String),
}

impl CycleError {
    /// Short machine-readable code shown next to the message on the dashboard.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DataUnavailable(_) => "DATA_UNAVAILABLE",
            Self::IndicatorUndefined { .. } | Self::DegenerateIndicator { .. } => {
                "INDICATOR_UNDEFINED"
            }
            Self::Render(_) => "RENDER_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_errors_share_a_code() {
        let short = CycleError::IndicatorUndefined { have: 12, need: 200 };
        let degenerate = CycleError::DegenerateIndicator { name: "ADX" };
        assert_eq!(short.code(), degenerate.code());
        assert_eq!(short.to_string(), "indicators undefined: have 12 bars, need 200");
    }
}
