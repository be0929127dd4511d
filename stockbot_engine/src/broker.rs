/// broker.rs — Alpaca paper-trading REST client
///
/// ORDER FLOW:
///   1. GET  /v2/assets/{symbol}  : symbol must exist and be tradable
///   2. GET  /v2/positions        : find any open position for the symbol
///   3. POST /v2/orders           : JSON body, APCA key headers
///
/// ORDER TYPES USED:
///   market : entry and discretionary exit
///   stop   : protective stop below the entry
///   limit  : profit target above the entry
/// Every order carries a fresh UUID `client_order_id`.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{EngineError, Result};

// ── Request / response types ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Stop,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Gtc,
}

/// Body of POST /v2/orders.  Alpaca takes quantities and prices as strings.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub symbol:          String,
    pub qty:             String,
    pub side:            OrderSide,
    #[serde(rename = "type")]
    pub order_type:      OrderType,
    pub time_in_force:   TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price:      Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price:     Option<String>,
    pub client_order_id: String,
}

impl OrderRequest {
    fn base(symbol: &str, qty: f64, side: OrderSide, order_type: OrderType) -> Self {
        Self {
            symbol:          symbol.to_uppercase(),
            qty:             format_qty(qty),
            side,
            order_type,
            time_in_force:   TimeInForce::Day,
            stop_price:      None,
            limit_price:     None,
            client_order_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn market(symbol: &str, qty: f64, side: OrderSide) -> Self {
        Self::base(symbol, qty, side, OrderType::Market)
    }

    pub fn stop(symbol: &str, qty: f64, side: OrderSide, stop_price: f64) -> Self {
        Self { stop_price: Some(format!("{:.2}", stop_price)), ..Self::base(symbol, qty, side, OrderType::Stop) }
    }

    pub fn limit(symbol: &str, qty: f64, side: OrderSide, limit_price: f64) -> Self {
        Self { limit_price: Some(format!("{:.2}", limit_price)), ..Self::base(symbol, qty, side, OrderType::Limit) }
    }
}

/// Whole shares print without a fraction.
fn format_qty(qty: f64) -> String {
    if qty.fract() == 0.0 {
        format!("{}", qty as i64)
    } else {
        format!("{:.4}", qty)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id:              String,
    pub client_order_id: String,
    pub symbol:          String,
    pub status:          String,
    pub side:            String,
    #[serde(rename = "type", default)]
    pub order_type:      String,
    #[serde(default)]
    pub qty:             Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub symbol:   String,
    #[serde(default)]
    pub tradable: bool,
    #[serde(default)]
    pub status:   String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub symbol:          String,
    #[serde(deserialize_with = "de_str_f64")]
    pub qty:             f64,
    #[serde(deserialize_with = "de_str_f64")]
    pub avg_entry_price: f64,
    #[serde(default)]
    pub side:            String,
}

fn de_str_f64<'de, D>(d: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

// ── Brokerage seam ────────────────────────────────────────────────────────

#[async_trait]
pub trait Brokerage: Send + Sync {
    /// `Ok(false)` for an unknown or non-tradable symbol.
    async fn validate_symbol(&self, symbol: &str) -> Result<bool>;
    async fn positions(&self) -> Result<Vec<Position>>;
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResponse>;

    async fn position(&self, symbol: &str) -> Result<Option<Position>> {
        let symbol = symbol.to_uppercase();
        Ok(self.positions().await?.into_iter().find(|p| p.symbol == symbol))
    }
}

// ── Alpaca client ─────────────────────────────────────────────────────────

pub struct AlpacaBroker {
    client:     Client,
    api_key:    String,
    api_secret: String,
    base_url:   String,
}

impl AlpacaBroker {
    pub fn new(api_key: &str, api_secret: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key:    api_key.to_owned(),
            api_secret: api_secret.to_owned(),
            base_url:   base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        if !cfg.has_alpaca_credentials() {
            return Err(EngineError::Config("ALPACA_API_KEY / ALPACA_SECRET_KEY not set".into()));
        }
        Self::new(&cfg.alpaca_api_key, &cfg.alpaca_secret_key, &cfg.alpaca_trading_url)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
    }
}

#[async_trait]
impl Brokerage for AlpacaBroker {
    async fn validate_symbol(&self, symbol: &str) -> Result<bool> {
        let resp = self.get(&format!("/v2/assets/{}", symbol.to_uppercase())).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(false);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status.as_u16(), body, symbol));
        }
        let asset: Asset = resp.json().await?;
        Ok(asset.tradable)
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        let resp = self.get("/v2/positions").send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status.as_u16(), body, "positions"));
        }
        Ok(resp.json().await?)
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResponse> {
        let url = format!("{}/v2/orders", self.base_url);
        info!("Placing {:?} {} {} @ {:?}", order.side, order.qty, order.symbol, order.order_type);

        let resp = self.client
            .post(&url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
            .json(order)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            error!("Alpaca order rejected: HTTP {} — {}", status, body);
            return Err(EngineError::from_status(status.as_u16(), body, &order.symbol));
        }

        let placed: OrderResponse = serde_json::from_str(&body)?;
        info!("Order accepted: id={} {} {} status={}", placed.id, placed.side, placed.symbol, placed.status);
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_order_serialises_for_alpaca() {
        let o = OrderRequest::stop("nvda", 100.0, OrderSide::Sell, 90.456);
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["symbol"], "NVDA");
        assert_eq!(v["qty"], "100");
        assert_eq!(v["side"], "sell");
        assert_eq!(v["type"], "stop");
        assert_eq!(v["time_in_force"], "day");
        assert_eq!(v["stop_price"], "90.46");
        assert!(v.get("limit_price").is_none());
        assert_eq!(o.client_order_id.len(), 36);
    }

    #[test]
    fn client_order_ids_are_unique() {
        let a = OrderRequest::market("AAPL", 1.0, OrderSide::Buy);
        let b = OrderRequest::market("AAPL", 1.0, OrderSide::Buy);
        assert_ne!(a.client_order_id, b.client_order_id);
    }

    #[test]
    fn position_parses_string_numbers() {
        let body = r#"{"symbol":"AAPL","qty":"10","avg_entry_price":"187.25","side":"long","market_value":"1900"}"#;
        let p: Position = serde_json::from_str(body).unwrap();
        assert_eq!(p.qty, 10.0);
        assert!((p.avg_entry_price - 187.25).abs() < 1e-12);
    }

    #[test]
    fn fractional_qty_keeps_precision() {
        assert_eq!(format_qty(2.5), "2.5000");
        assert_eq!(format_qty(3.0), "3");
    }
}
