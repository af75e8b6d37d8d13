pub mod bar;
pub mod binance;
pub mod source;
pub mod yahoo;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar::{Bar, BarSeries};
pub use source::{build_source, MarketDataSource};
