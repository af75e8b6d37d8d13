// =============================================================================
// Strategy Resolver — regime to recommendation decision matrix
// =============================================================================
//
// Both lookups are exhaustive matches: adding a regime without a row is a
// compile error rather than a runtime fallback.
// =============================================================================

use serde::Serialize;

use crate::regime::Regime;

const MEAN_REVERSION_PLAN: &[&str] = &[
    "Buy 1/3 when Z-score < -1",
    "Scale-in on new lows",
    "Exit above 5-day EMA",
];

const MOMENTUM_PLAN: &[&str] = &["Enter when 50EMA > 200EMA", "Exit when 50EMA < 200EMA"];

const CASH_PLAN: &[&str] = &["Maintain cash position", "Monitor for regime change"];

/// What to run, how much capital to commit, and the concrete steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyRecommendation {
    pub strategy: &'static str,
    /// Percentage of capital, 0..=100.
    pub allocation_pct: u8,
    pub action_plan: &'static [&'static str],
}

impl StrategyRecommendation {
    /// Allocation as shown to the operator, e.g. `"80%"`.
    pub fn allocation_label(&self) -> String {
        format!("{}%", self.allocation_pct)
    }
}

/// Look up the recommendation for `regime`.
pub fn resolve(regime: Regime) -> StrategyRecommendation {
    let (strategy, allocation_pct) = match regime {
        Regime::StrongBull => ("DMA Momentum", 100),
        Regime::Volatile => ("Mean-Reversion", 80),
        Regime::StrongBear => ("Cash", 0),
        Regime::Sideways => ("Mean-Reversion", 50),
        Regime::Transition => ("Hybrid", 50),
    };

    StrategyRecommendation {
        strategy,
        allocation_pct,
        action_plan: action_plan(regime),
    }
}

/// Action steps, grouped coarser than the strategy table.
fn action_plan(regime: Regime) -> &'static [&'static str] {
    match regime {
        Regime::Volatile | Regime::Sideways => MEAN_REVERSION_PLAN,
        Regime::StrongBull => MOMENTUM_PLAN,
        Regime::StrongBear | Regime::Transition => CASH_PLAN,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows() {
        let expected = [
            (Regime::StrongBull, "DMA Momentum", "100%"),
            (Regime::StrongBear, "Cash", "0%"),
            (Regime::Volatile, "Mean-Reversion", "80%"),
            (Regime::Sideways, "Mean-Reversion", "50%"),
            (Regime::Transition, "Hybrid", "50%"),
        ];
        for (regime, strategy, allocation) in expected {
            let rec = resolve(regime);
            assert_eq!(rec.strategy, strategy, "{regime}");
            assert_eq!(rec.allocation_label(), allocation, "{regime}");
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        for regime in Regime::ALL {
            assert_eq!(resolve(regime), resolve(regime));
        }
    }

    #[test]
    fn action_plans_group_regimes() {
        assert_eq!(resolve(Regime::Volatile).action_plan, resolve(Regime::Sideways).action_plan);
        assert_eq!(resolve(Regime::StrongBear).action_plan, resolve(Regime::Transition).action_plan);
        assert_eq!(resolve(Regime::StrongBull).action_plan.len(), 2);
        assert_eq!(resolve(Regime::Sideways).action_plan[0], "Buy 1/3 when Z-score < -1");
        assert_eq!(resolve(Regime::Transition).action_plan[1], "Monitor for regime change");
    }
}
