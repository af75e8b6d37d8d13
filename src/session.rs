// =============================================================================
// Session State
// =============================================================================
//
// The only state that survives from one cycle to the next. Owned by the
// scheduler and handed to each cycle by `&mut`; never shared, never persisted.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::regime::Regime;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    /// Regime from the last completed cycle; `None` until the first one.
    pub last_regime: Option<Regime>,
    pub last_update: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed classification and return the regime it replaced.
    pub fn record(&mut self, regime: Regime, at: DateTime<Utc>) -> Option<Regime> {
        self.last_update = Some(at);
        self.last_regime.replace(regime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let s = SessionState::new();
        assert!(s.last_regime.is_none());
        assert!(s.last_update.is_none());
    }

    #[test]
    fn record_returns_previous() {
        let mut s = SessionState::new();
        let t = Utc::now();
        assert_eq!(s.record(Regime::Sideways, t), None);
        assert_eq!(s.record(Regime::StrongBull, t), Some(Regime::Sideways));
        assert_eq!(s.last_regime, Some(Regime::StrongBull));
        assert_eq!(s.last_update, Some(t));
    }
}
