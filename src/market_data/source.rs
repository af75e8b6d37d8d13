// =============================================================================
// Market Data Source — the pull seam between the loop and a price provider
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::market_data::binance::BinanceKlineSource;
use crate::market_data::yahoo::YahooChartSource;
use crate::market_data::BarSeries;
use crate::runtime_config::RuntimeConfig;
use crate::types::DataSourceKind;

/// Anything that can return the most recent intraday bars for one instrument.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch up to `lookback` of the most recent bars at `interval`.
    async fn fetch_bars(&self, instrument: &str, interval: &str, lookback: usize)
        -> Result<BarSeries>;

    /// Provider name for logs and the dashboard.
    fn name(&self) -> &'static str;
}

/// Build the configured source.
pub fn build_source(config: &RuntimeConfig) -> Result<Arc<dyn MarketDataSource>> {
    let source: Arc<dyn MarketDataSource> = match config.source {
        DataSourceKind::Yahoo => Arc::new(YahooChartSource::new(config.yahoo_range.clone())?),
        DataSourceKind::Binance => Arc::new(BinanceKlineSource::new()?),
    };
    Ok(source)
}

/// Decode a provider response body, checking the HTTP status first so that an
/// error page that is not JSON still reports the status.
pub(crate) fn decode_json(
    endpoint: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<serde_json::Value> {
    if !status.is_success() {
        let snippet: String = body.chars().take(200).collect();
        anyhow::bail!("{endpoint} returned {status}: {snippet}");
    }
    serde_json::from_str(body).with_context(|| format!("failed to parse {endpoint} response"))
}
