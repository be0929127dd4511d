/// paper.rs — One-shot paper trade from the RSI strategy decision
///
/// Flat + Buy decision  → market buy, then protective stop and target orders
/// Long + Sell decision → market sell of the held quantity
/// Anything else        → no order
///
/// Failures never escape: they become a message with `placed = false`.
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::broker::{Brokerage, OrderRequest, OrderSide};
use crate::data::{BarRequest, MarketData};
use crate::error::Result;
use crate::models::Timeframe;
use crate::strategy::{Decision, RsiStrategy, RsiStrategyParams};

/// Calendar days of history requested; covers the RSI warm-up on daily bars.
const HISTORY_DAYS: i64 = 45;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperTradeOutcome {
    pub placed:  bool,
    pub message: String,
}

impl PaperTradeOutcome {
    fn none(message: impl Into<String>) -> Self {
        Self { placed: false, message: message.into() }
    }
}

/// Evaluate the strategy on bars up to `as_of` (normally yesterday) and
/// place whatever orders it calls for.
pub async fn execute_paper_trade<B, D>(
    broker:    &B,
    data:      &D,
    symbol:    &str,
    timeframe: Timeframe,
    as_of:     NaiveDate,
    params:    &RsiStrategyParams,
) -> PaperTradeOutcome
where
    B: Brokerage + ?Sized,
    D: MarketData + ?Sized,
{
    match try_paper_trade(broker, data, symbol, timeframe, as_of, params).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Paper trade for {} failed: {}", symbol, e);
            PaperTradeOutcome::none(format!("Paper trading error: {}", e))
        }
    }
}

async fn try_paper_trade<B, D>(
    broker:    &B,
    data:      &D,
    symbol:    &str,
    timeframe: Timeframe,
    as_of:     NaiveDate,
    params:    &RsiStrategyParams,
) -> Result<PaperTradeOutcome>
where
    B: Brokerage + ?Sized,
    D: MarketData + ?Sized,
{
    let symbol = symbol.trim().to_uppercase();
    if !broker.validate_symbol(&symbol).await? {
        return Ok(PaperTradeOutcome::none(format!(
            "Invalid symbol: {}. Please check the stock symbol.", symbol
        )));
    }

    let strategy = RsiStrategy::new(*params)?;
    let request = BarRequest::lookback(&symbol, HISTORY_DAYS, timeframe, as_of)?;
    let bars = data.bars(&request).await?;
    let position = broker.position(&symbol).await?;
    let decision = strategy.decide(&bars, position.as_ref().map(|p| p.avg_entry_price))?;
    info!("{} decision on {} {} bars: {:?}", symbol, bars.len(), timeframe, decision);

    let qty = params.quantity;
    match (decision, position) {
        (Decision::Buy { price, stop_price, target_price }, None) => {
            let order = broker.submit_order(&OrderRequest::market(&symbol, qty, OrderSide::Buy)).await?;
            let mut message = format!("Buy order placed: {}, Price: ${:.2}", order.id, price);
            if params.stop_loss > 0.0 {
                broker.submit_order(&OrderRequest::stop(&symbol, qty, OrderSide::Sell, stop_price)).await?;
                message.push_str(&format!("\nStop Loss set at: ${:.2}", stop_price));
            }
            if params.profit_target > 0.0 {
                broker.submit_order(&OrderRequest::limit(&symbol, qty, OrderSide::Sell, target_price)).await?;
                message.push_str(&format!("\nProfit Target set at: ${:.2}", target_price));
            }
            Ok(PaperTradeOutcome { placed: true, message })
        }
        (Decision::Sell { price, reason }, Some(held)) => {
            let order = broker.submit_order(&OrderRequest::market(&symbol, held.qty.abs(), OrderSide::Sell)).await?;
            Ok(PaperTradeOutcome {
                placed:  true,
                message: format!("Sell order placed: {}, Price: ${:.2} ({})", order.id, price, reason),
            })
        }
        _ => Ok(PaperTradeOutcome::none("No action taken for RSI strategy.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{OrderResponse, OrderType, Position};
    use crate::data::StaticMarketData;
    use crate::error::EngineError;
    use crate::models::Bar;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockBroker {
        tradable: bool,
        held:     Option<Position>,
        orders:   Mutex<Vec<OrderRequest>>,
    }

    #[async_trait]
    impl Brokerage for MockBroker {
        async fn validate_symbol(&self, _symbol: &str) -> Result<bool> {
            Ok(self.tradable)
        }

        async fn positions(&self) -> Result<Vec<Position>> {
            Ok(self.held.clone().into_iter().collect())
        }

        async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResponse> {
            let mut orders = self.orders.lock().unwrap();
            orders.push(order.clone());
            Ok(OrderResponse {
                id:              format!("ord-{}", orders.len()),
                client_order_id: order.client_order_id.clone(),
                symbol:          order.symbol.clone(),
                status:          "accepted".into(),
                side:            format!("{:?}", order.side).to_lowercase(),
                order_type:      format!("{:?}", order.order_type).to_lowercase(),
                qty:             Some(order.qty.clone()),
            })
        }
    }

    /// Nine drops then six rises: RSI crosses 40 on the last bar.
    fn entry_bars() -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut c = 100.0;
        (0..16).map(|i| {
            if i > 0 {
                c += if i <= 9 { -1.0 } else { 1.0 };
            }
            Bar { time: t0 + chrono::Duration::days(i), open: c, high: c, low: c, close: c, volume: 0.0 }
        }).collect()
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 16).unwrap()
    }

    #[tokio::test]
    async fn flat_entry_places_bracket() {
        let broker = MockBroker { tradable: true, ..Default::default() };
        let data = StaticMarketData::new().with("NVDA", entry_bars());
        let params = RsiStrategyParams { quantity: 100.0, ..Default::default() };

        let out = execute_paper_trade(&broker, &data, "nvda", Timeframe::Day1, as_of(), &params).await;
        assert!(out.placed, "{}", out.message);
        assert!(out.message.starts_with("Buy order placed: ord-1"));

        let orders = broker.orders.lock().unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].order_type, OrderType::Market);
        assert_eq!(orders[1].stop_price.as_deref(), Some("87.30"));
        assert_eq!(orders[2].limit_price.as_deref(), Some("126.10"));
    }

    #[tokio::test]
    async fn untradable_symbol_places_nothing() {
        let broker = MockBroker::default();
        let data = StaticMarketData::new();
        let out = execute_paper_trade(&broker, &data, "ZZZZ", Timeframe::Day1, as_of(), &RsiStrategyParams::default()).await;
        assert!(!out.placed);
        assert!(out.message.starts_with("Invalid symbol: ZZZZ"));
    }

    #[tokio::test]
    async fn missing_data_becomes_message() {
        let broker = MockBroker { tradable: true, ..Default::default() };
        let data = StaticMarketData::new();
        let out = execute_paper_trade(&broker, &data, "AAPL", Timeframe::Day1, as_of(), &RsiStrategyParams::default()).await;
        assert!(!out.placed);
        assert!(out.message.contains(&EngineError::InvalidSymbol("AAPL".into()).to_string()));
    }

    #[tokio::test]
    async fn long_position_holds_without_exit() {
        let broker = MockBroker {
            tradable: true,
            held: Some(Position { symbol: "NVDA".into(), qty: 100.0, avg_entry_price: 90.0, side: "long".into() }),
            ..Default::default()
        };
        let data = StaticMarketData::new().with("NVDA", entry_bars());
        let out = execute_paper_trade(&broker, &data, "NVDA", Timeframe::Day1, as_of(), &RsiStrategyParams::default()).await;
        assert!(!out.placed);
        assert!(broker.orders.lock().unwrap().is_empty());
    }
}
