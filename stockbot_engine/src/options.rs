/// options.rs — Options watchlist and contract chains
///
/// `Watchlist` is the per-session list of underlyings the user follows.
/// Chains come from Polygon's reference endpoint:
///   GET {base}/v3/reference/options/contracts?underlying_ticker={T}&apiKey={K}
/// A response without `results` is an empty chain.
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{EngineError, Result};

const CHAIN_LIMIT: &str = "250";

// ── Watchlist ─────────────────────────────────────────────────────────────

/// Uppercase tickers in insertion order, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    symbols: Vec<String>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the ticker is blank or already listed.
    pub fn add(&mut self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() || self.contains(&symbol) {
            return false;
        }
        self.symbols.push(symbol);
        true
    }

    pub fn remove(&mut self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        let before = self.symbols.len();
        self.symbols.retain(|s| *s != symbol);
        self.symbols.len() != before
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// A missing file is an empty watchlist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let stored: Watchlist = serde_json::from_str(&fs::read_to_string(path)?)?;
        // re-add so hand-edited files are normalised
        let mut list = Self::new();
        for s in &stored.symbols {
            list.add(s);
        }
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

// ── Contracts ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub ticker:              String,
    pub underlying_ticker:   String,
    pub contract_type:       String,
    pub strike_price:        f64,
    pub expiration_date:     NaiveDate,
    #[serde(default)]
    pub exercise_style:      Option<String>,
    #[serde(default)]
    pub shares_per_contract: Option<f64>,
}

#[async_trait]
pub trait OptionsChain: Send + Sync {
    async fn contracts(&self, underlying: &str) -> Result<Vec<OptionContract>>;
}

#[derive(Debug, Deserialize)]
struct ContractsPage {
    #[serde(default)]
    results: Option<Vec<OptionContract>>,
}

pub fn parse_contracts(body: &str) -> Result<Vec<OptionContract>> {
    let page: ContractsPage = serde_json::from_str(body)?;
    Ok(page.results.unwrap_or_default())
}

/// One chain per watchlist entry.  A failed fetch is kept next to its
/// symbol and never stops the others.
pub async fn watchlist_chains<C: OptionsChain + ?Sized>(
    client: &C,
    watchlist: &Watchlist,
) -> Vec<(String, Result<Vec<OptionContract>>)> {
    let mut chains = Vec::with_capacity(watchlist.symbols().len());
    for symbol in watchlist.symbols() {
        let chain = client.contracts(symbol).await;
        match &chain {
            Ok(c) => info!("{}: {} option contracts", symbol, c.len()),
            Err(e) => warn!("{}: error fetching options data: {}", symbol, e),
        }
        chains.push((symbol.clone(), chain));
    }
    chains
}

pub struct PolygonOptionsClient {
    client:   Client,
    api_key:  String,
    base_url: String,
}

impl PolygonOptionsClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_key:  api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        if cfg.polygon_api_key.is_empty() {
            return Err(EngineError::Config("POLYGON_API_KEY not set".into()));
        }
        Self::new(&cfg.polygon_api_key, &cfg.polygon_url)
    }
}

#[async_trait]
impl OptionsChain for PolygonOptionsClient {
    async fn contracts(&self, underlying: &str) -> Result<Vec<OptionContract>> {
        let url = format!("{}/v3/reference/options/contracts", self.base_url);
        let resp = self.client
            .get(&url)
            .query(&[
                ("underlying_ticker", underlying),
                ("limit", CHAIN_LIMIT),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status.as_u16(), body, underlying));
        }
        parse_contracts(&resp.text().await?)
    }
}
