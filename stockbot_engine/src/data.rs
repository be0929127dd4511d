/// data.rs — Historical bar sources
///
/// `MarketData` is the seam between the computations and wherever bars come
/// from.  `AlpacaDataClient` pages through the Alpaca v2 bars endpoint;
/// `StaticMarketData` serves bars already held in memory (tests, parquet
/// files loaded by the CLI).
use ahash::AHashMap;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::models::{Bar, Timeframe};

/// Inclusive calendar-date range of bars for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRequest {
    pub symbol:    String,
    pub start:     NaiveDate,
    pub end:       NaiveDate,
    pub timeframe: Timeframe,
}

impl BarRequest {
    pub fn new(symbol: &str, start: NaiveDate, end: NaiveDate, timeframe: Timeframe) -> Self {
        Self { symbol: symbol.trim().to_uppercase(), start, end, timeframe }
    }

    /// The trailing `days` calendar days ending at `end`.  A span that
    /// leaves chrono's date range is `InvalidInput`.
    pub fn lookback(symbol: &str, days: i64, timeframe: Timeframe, end: NaiveDate) -> Result<Self> {
        let start = TimeDelta::try_days(days.max(0))
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| EngineError::InvalidInput(format!(
                "lookback of {} days before {} is out of range", days, end
            )))?;
        Ok(Self::new(symbol, start, end, timeframe))
    }
}

/// Calendar days in `years` years of history (365 per year).
pub fn years_in_days(years: i64) -> Result<i64> {
    years
        .checked_mul(365)
        .ok_or_else(|| EngineError::InvalidInput(format!("{} years of history is out of range", years)))
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Bars in ascending time order.  An empty range is `DataUnavailable`.
    async fn bars(&self, req: &BarRequest) -> Result<Vec<Bar>>;
}

#[async_trait]
impl<T: MarketData + ?Sized> MarketData for Box<T> {
    async fn bars(&self, req: &BarRequest) -> Result<Vec<Bar>> {
        (**self).bars(req).await
    }
}

// ── Alpaca REST ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl From<AlpacaBar> for Bar {
    fn from(b: AlpacaBar) -> Self {
        Bar { time: b.t, open: b.o, high: b.h, low: b.l, close: b.c, volume: b.v }
    }
}

#[derive(Debug, Deserialize)]
struct BarsPage {
    #[serde(default)]
    bars:            Option<Vec<AlpacaBar>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

const PAGE_LIMIT: &str = "10000";
const PAGE_DELAY: std::time::Duration = std::time::Duration::from_millis(250);

pub struct AlpacaDataClient {
    client:     Client,
    api_key:    String,
    api_secret: String,
    base_url:   String,
    feed:       String,
}

impl AlpacaDataClient {
    pub fn new(api_key: &str, api_secret: &str, base_url: &str, feed: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_key:    api_key.to_owned(),
            api_secret: api_secret.to_owned(),
            base_url:   base_url.trim_end_matches('/').to_owned(),
            feed:       feed.to_owned(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        if !cfg.has_alpaca_credentials() {
            return Err(EngineError::Config("ALPACA_API_KEY / ALPACA_SECRET_KEY not set".into()));
        }
        Self::new(&cfg.alpaca_api_key, &cfg.alpaca_secret_key, &cfg.alpaca_data_url, &cfg.alpaca_feed)
    }

    async fn fetch_page(&self, req: &BarRequest, page_token: Option<&str>) -> Result<BarsPage> {
        let url = format!("{}/v2/stocks/{}/bars", self.base_url, req.symbol);
        let start = req.start.to_string();
        let end = req.end.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("timeframe", req.timeframe.as_alpaca()),
            ("start", start.as_str()),
            ("end", end.as_str()),
            ("limit", PAGE_LIMIT),
            ("feed", self.feed.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }

        let resp = self.client
            .get(&url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status.as_u16(), body, &req.symbol));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketData for AlpacaDataClient {
    async fn bars(&self, req: &BarRequest) -> Result<Vec<Bar>> {
        if req.symbol.is_empty() {
            return Err(EngineError::InvalidSymbol(String::new()));
        }
        let mut bars: Vec<Bar> = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.fetch_page(req, token.as_deref()).await?;
            let n = page.bars.as_ref().map_or(0, Vec::len);
            bars.extend(page.bars.unwrap_or_default().into_iter().map(Bar::from));
            debug!("{}: page of {} bars (total {})", req.symbol, n, bars.len());

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => {
                    token = Some(next);
                    sleep(PAGE_DELAY).await;
                }
                None => break,
            }
        }

        if bars.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "{} {} {}..{}", req.symbol, req.timeframe, req.start, req.end
            )));
        }
        bars.sort_by_key(|b| b.time);
        info!("Fetched {} {} bars for {}", bars.len(), req.timeframe, req.symbol);
        Ok(bars)
    }
}

// ── In-memory source ──────────────────────────────────────────────────────

/// Bars keyed by symbol.  Requests are served by date-range filtering and
/// ignore the timeframe.
#[derive(Debug, Default, Clone)]
pub struct StaticMarketData {
    series: AHashMap<String, Vec<Bar>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: &str, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.time);
        self.series.insert(symbol.trim().to_uppercase(), bars);
    }

    pub fn with(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.insert(symbol, bars);
        self
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut s: Vec<String> = self.series.keys().cloned().collect();
        s.sort();
        s
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn bars(&self, req: &BarRequest) -> Result<Vec<Bar>> {
        let all = self.series
            .get(&req.symbol)
            .ok_or_else(|| EngineError::InvalidSymbol(req.symbol.clone()))?;
        let bars: Vec<Bar> = all
            .iter()
            .filter(|b| {
                let d = b.date();
                d >= req.start && d <= req.end
            })
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "{} {}..{}", req.symbol, req.start, req.end
            )));
        }
        Ok(bars)
    }
}
