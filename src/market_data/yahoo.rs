// =============================================================================
// Yahoo Finance Chart Source
// =============================================================================
//
// Pulls intraday bars from the public v8 chart endpoint:
//
//   GET /v8/finance/chart/{ticker}?interval=5m&range=1mo
//
// The payload is column-oriented (one array per field). Yahoo leaves `null`
// holes for intervals with no trades; those rows are dropped before the series
// is built. The endpoint rejects requests without a browser-like User-Agent.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::market_data::source::{decode_json, MarketDataSource};
use crate::market_data::{Bar, BarSeries};

#[derive(Clone)]
pub struct YahooChartSource {
    base_url: String,
    range: String,
    client: reqwest::Client,
}

impl YahooChartSource {
    /// `range` is Yahoo's look-back window (`1d`, `5d`, `1mo`, ...). It must
    /// cover at least the longest indicator window at the chosen interval.
    pub fn new(range: impl Into<String>) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0 regime-watch"));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            range: range.into(),
            client,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Turn a chart payload into a series, keeping the last `lookback` complete
/// rows.
pub fn parse_chart(
    ticker: &str,
    interval: &str,
    body: serde_json::Value,
    lookback: usize,
) -> Result<BarSeries> {
    let envelope: ChartEnvelope =
        serde_json::from_value(body).context("unexpected chart response shape")?;

    if let Some(err) = envelope.chart.error {
        anyhow::bail!("Yahoo chart error for {ticker}: {} ({})", err.description, err.code);
    }

    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .with_context(|| format!("chart response for {ticker} has no result"))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    fn field(col: &[Option<f64>], i: usize) -> Option<f64> {
        col.get(i).copied().flatten()
    }

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open, i),
            field(&quote.high, i),
            field(&quote.low, i),
            field(&quote.close, i),
        ) else {
            continue;
        };
        let volume = field(&quote.volume, i).unwrap_or(0.0);
        bars.push(Bar::new(ts, open, high, low, close, volume));
    }

    let mut series = BarSeries::new(ticker, interval, bars)?;
    series.truncate_front(lookback);
    Ok(series)
}

#[async_trait]
impl MarketDataSource for YahooChartSource {
    #[instrument(skip(self), name = "yahoo::fetch_bars")]
    async fn fetch_bars(&self, instrument: &str, interval: &str, lookback: usize) -> Result<BarSeries> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, instrument);

        let resp = self
            .client
            .get(&url)
            .query(&[("interval", interval), ("range", self.range.as_str())])
            .send()
            .await
            .context("GET /v8/finance/chart request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("failed to read chart response body")?;
        let body = decode_json("GET /v8/finance/chart", status, &text)?;

        let series = parse_chart(instrument, interval, body, lookback)?;
        debug!(instrument, interval, range = %self.range, count = series.len(), "chart fetched");
        Ok(series)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

impl std::fmt::Debug for YahooChartSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooChartSource")
            .field("base_url", &self.base_url)
            .field("range", &self.range)
            .finish()
    }
}
