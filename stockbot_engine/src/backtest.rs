/// backtest.rs — Single-symbol RSI trade simulator
///
/// Replays bars in chronological order through a two-state (flat / long)
/// machine.  Records one `TradeRecord` per entry; exits fill the record's
/// exit fields, an entry still open at the last bar keeps them empty.
///
/// ┌─────────────────────────────────────────────────────┐
/// │  Bar Feed (&[Bar])                                  │
/// │        │                                            │
/// │        ▼                                            │
/// │  RSI series (simple average, computed once)         │
/// │        │                                            │
/// │   ┌────┴───────────────────────────────────┐        │
/// │   │ long?  exit_reason(entry, close, rsi)  │        │
/// │   │ flat?  is_entry(rsi[t−1], rsi[t])      │        │
/// │   └────────────────────────────────────────┘        │
/// │        │                                            │
/// │   trades.push / fill exit fields                    │
/// └─────────────────────────────────────────────────────┘
///
/// RSI at bar t depends only on closes[..=t], so computing the series up
/// front is equivalent to evaluating it bar by bar.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::indicators::{closes, rsi, RsiMethod};
use crate::metrics::{compute_summary, PerfSummary};
use crate::models::Bar;
use crate::strategy::{ExitReason, RsiStrategy, RsiStrategyParams};

/// A Buy paired with its Sell.  Exit fields are `None` while still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub buy_date:    NaiveDate,
    pub buy_price:   f64,
    pub sell_date:   Option<NaiveDate>,
    pub sell_price:  Option<f64>,
    pub quantity:    f64,
    pub profit:      Option<f64>,
    pub profit_pct:  Option<f64>,
    pub exit_reason: Option<ExitReason>,
}

impl TradeRecord {
    fn open(date: NaiveDate, price: f64, quantity: f64) -> Self {
        Self {
            buy_date: date,
            buy_price: price,
            sell_date: None,
            sell_price: None,
            quantity,
            profit: None,
            profit_pct: None,
            exit_reason: None,
        }
    }

    fn close(&mut self, date: NaiveDate, price: f64, reason: ExitReason) {
        let profit = (price - self.buy_price) * self.quantity;
        let profit_pct = (price - self.buy_price) / self.buy_price * 100.0;
        self.sell_date = Some(date);
        self.sell_price = Some(price);
        self.profit = Some(profit);
        self.profit_pct = Some(profit_pct);
        self.exit_reason = Some(reason);
    }

    pub fn is_open(&self) -> bool {
        self.sell_date.is_none()
    }
}

/// Ordered trade log plus the realized total over closed trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub params:       RsiStrategyParams,
    pub trades:       Vec<TradeRecord>,
    pub total_profit: f64,
    pub summary:      PerfSummary,
}

impl BacktestReport {
    pub fn closed_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter().filter(|t| !t.is_open())
    }

    pub fn open_position(&self) -> Option<&TradeRecord> {
        self.trades.last().filter(|t| t.is_open())
    }
}

/// Run the RSI strategy over one symbol's bars.
pub fn simulate(bars: &[Bar], params: &RsiStrategyParams) -> Result<BacktestReport> {
    let strategy = RsiStrategy::new(*params)?;
    let needed = params.rsi_period + 2;
    if bars.len() < needed {
        return Err(EngineError::InsufficientData { needed, got: bars.len() });
    }

    let closes = closes(bars);
    let rsi_series = rsi(&closes, params.rsi_period, RsiMethod::Simple);

    info!("RSI backtest — {} bars, rsi_period={}, SL={:.1}%, PT={:.1}%",
        bars.len(), params.rsi_period,
        params.stop_loss * 100.0, params.profit_target * 100.0);

    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut position: Option<TradeRecord> = None;

    // ── Main event loop ───────────────────────────────────────────────────
    for (i, bar) in bars.iter().enumerate() {
        let cur_rsi = rsi_series[i];

        if let Some(mut open) = position.take() {
            match strategy.exit_reason(open.buy_price, bar.close, cur_rsi) {
                Some(reason) => {
                    open.close(bar.date(), bar.close, reason);
                    debug!("  [Bar {:>5}] SELL @ {:.2}  {}  pnl={:.2}",
                        i, bar.close, reason, open.profit.unwrap_or(0.0));
                    trades.push(open);
                }
                None => position = Some(open),
            }
            continue;
        }

        let prev_rsi = if i > 0 { rsi_series[i - 1] } else { None };
        if strategy.is_entry(prev_rsi, cur_rsi) {
            debug!("  [Bar {:>5}] BUY  @ {:.2}  RSI={:.2}", i, bar.close, cur_rsi.unwrap_or(0.0));
            position = Some(TradeRecord::open(bar.date(), bar.close, params.quantity));
        }
    }

    // Open positions are reported, not force-closed.
    if let Some(open) = position {
        trades.push(open);
    }

    let total_profit: f64 = trades.iter().filter_map(|t| t.profit).sum();
    let summary = compute_summary(&trades);
    info!("Backtest complete — {} closed, {} open, total profit {:.2}",
        summary.n_closed, summary.n_open, total_profit);

    Ok(BacktestReport { params: *params, trades, total_profit, summary })
}
