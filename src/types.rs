// =============================================================================
// Shared types used across the regime watcher
// =============================================================================

use serde::{Deserialize, Serialize};

/// Which market-data provider the classification loop pulls bars from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Yahoo,
    Binance,
}

impl Default for DataSourceKind {
    fn default() -> Self {
        Self::Yahoo
    }
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yahoo => write!(f, "yahoo"),
            Self::Binance => write!(f, "binance"),
        }
    }
}

/// Where the classification loop currently is within one cycle.
///
/// `Fetching -> Classifying -> Rendering -> (Notifying) -> Waiting`, then back
/// to `Fetching`. There is no terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CyclePhase {
    Fetching,
    Classifying,
    Rendering,
    Notifying,
    Waiting,
}

impl Default for CyclePhase {
    fn default() -> Self {
        Self::Fetching
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetching => write!(f, "FETCHING"),
            Self::Classifying => write!(f, "CLASSIFYING"),
            Self::Rendering => write!(f, "RENDERING"),
            Self::Notifying => write!(f, "NOTIFYING"),
            Self::Waiting => write!(f, "WAITING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_serde_is_lowercase() {
        let kind: DataSourceKind = serde_json::from_str("\"binance\"").unwrap();
        assert_eq!(kind, DataSourceKind::Binance);
        assert_eq!(serde_json::to_string(&DataSourceKind::Yahoo).unwrap(), "\"yahoo\"");
    }

    #[test]
    fn phase_display_matches_serde() {
        assert_eq!(CyclePhase::Notifying.to_string(), "NOTIFYING");
        assert_eq!(
            serde_json::to_string(&CyclePhase::Classifying).unwrap(),
            "\"CLASSIFYING\""
        );
    }
}
