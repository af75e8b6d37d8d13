// =============================================================================
// Regime Module
// =============================================================================
//
// Indicator snapshot -> regime label -> strategy recommendation. Both steps
// are pure lookups; nothing here holds state.

pub mod classifier;
pub mod strategy;

pub use classifier::{classify, Regime, RegimeThresholds};
pub use strategy::{resolve, StrategyRecommendation};
