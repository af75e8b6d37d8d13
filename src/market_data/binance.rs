// =============================================================================
// Binance Klines Source — public REST endpoint, no signing
// =============================================================================
//
// Pulls `GET /api/v3/klines` for crypto instruments. The endpoint is public so
// no API key is needed.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::market_data::source::{decode_json, MarketDataSource};
use crate::market_data::{Bar, BarSeries};

/// Binance caps a single klines request at 1000 entries.
const MAX_KLINES: usize = 1000;

#[derive(Clone)]
pub struct BinanceKlineSource {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceKlineSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!("BinanceKlineSource initialised (base_url=https://api.binance.com)");

        Ok(Self {
            base_url: "https://api.binance.com".to_string(),
            client,
        })
    }

    /// Parse a JSON value that may be either a string or a number into `f64`.
    fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
        if let Some(s) = val.as_str() {
            s.parse::<f64>()
                .with_context(|| format!("failed to parse '{s}' as f64"))
        } else if let Some(n) = val.as_f64() {
            Ok(n)
        } else {
            anyhow::bail!("expected string or number, got: {val}")
        }
    }
}

/// Parse Binance's array-of-arrays klines payload.
///
/// Array indices used:
///   [0] openTime (ms), [1] open, [2] high, [3] low, [4] close, [5] volume
pub fn parse_klines(symbol: &str, interval: &str, body: &serde_json::Value) -> Result<BarSeries> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut bars = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 6 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time_ms = arr[0].as_i64().context("kline open time is not an integer")?;
        bars.push(Bar::new(
            open_time_ms / 1000,
            BinanceKlineSource::parse_str_f64(&arr[1])?,
            BinanceKlineSource::parse_str_f64(&arr[2])?,
            BinanceKlineSource::parse_str_f64(&arr[3])?,
            BinanceKlineSource::parse_str_f64(&arr[4])?,
            BinanceKlineSource::parse_str_f64(&arr[5])?,
        ));
    }

    BarSeries::new(symbol, interval, bars)
}

#[async_trait]
impl MarketDataSource for BinanceKlineSource {
    #[instrument(skip(self), name = "binance::fetch_bars")]
    async fn fetch_bars(&self, instrument: &str, interval: &str, lookback: usize) -> Result<BarSeries> {
        let limit = lookback.clamp(1, MAX_KLINES);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, instrument, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("failed to read klines response body")?;
        let body = decode_json("GET /api/v3/klines", status, &text)?;

        let series = parse_klines(instrument, interval, &body)?;
        debug!(instrument, interval, count = series.len(), "klines fetched");
        Ok(series)
    }

    fn name(&self) -> &'static str {
        "binance"
    }
}

impl std::fmt::Debug for BinanceKlineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceKlineSource")
            .field("base_url", &self.base_url)
            .finish()
    }
}
