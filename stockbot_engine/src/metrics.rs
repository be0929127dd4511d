/// metrics.rs — Trade-log performance summary
///
/// ─────────────────────────────────────────────────────────────────────────
/// WIN RATE & AVERAGE TRADE (closed trades only)
///   P_win   = count(profit > 0) / N_closed
///   AvgWin  = mean(profit_pct | profit > 0)
///   AvgLoss = mean(|profit_pct| | profit ≤ 0)
///
/// PROFIT FACTOR
///   PF = Σ profit⁺ / |Σ profit⁻|        (∞ when there are no losses)
///
/// MAXIMUM DRAWDOWN (currency)
///   Cumulative realized profit: C_k = Σ_{j ≤ k} profit_j, C_0 = 0
///   Running peak:               P_k = max_{s ≤ k} C_s
///   MaxDD = max_k (P_k − C_k)
/// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::backtest::TradeRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfSummary {
    pub n_closed:      usize,
    pub n_open:        usize,
    pub win_rate:      f64,
    pub avg_win_pct:   f64,
    pub avg_loss_pct:  f64,
    pub profit_factor: f64,
    pub total_profit:  f64,
    pub max_drawdown:  f64,
    pub best_trade:    Option<f64>,
    pub worst_trade:   Option<f64>,
}

impl std::fmt::Display for PerfSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "════════════════════════════════════════════")?;
        writeln!(f, "  RSI STRATEGY — BACKTEST SUMMARY")?;
        writeln!(f, "════════════════════════════════════════════")?;
        writeln!(f, "  Closed Trades  : {}", self.n_closed)?;
        writeln!(f, "  Open Positions : {}", self.n_open)?;
        writeln!(f, "  Win Rate       : {:.2}%", self.win_rate * 100.0)?;
        writeln!(f, "  Avg Win        : {:.2}%", self.avg_win_pct)?;
        writeln!(f, "  Avg Loss       : {:.2}%", self.avg_loss_pct)?;
        writeln!(f, "  Profit Factor  : {:.3}", self.profit_factor)?;
        writeln!(f, "  Total Profit   : ${:.2}", self.total_profit)?;
        writeln!(f, "  Max Drawdown   : ${:.2}", self.max_drawdown)?;
        if let (Some(best), Some(worst)) = (self.best_trade, self.worst_trade) {
            writeln!(f, "  Best Trade     : ${:.2}", best)?;
            writeln!(f, "  Worst Trade    : ${:.2}", worst)?;
        }
        writeln!(f, "════════════════════════════════════════════")
    }
}

pub fn compute_summary(trades: &[TradeRecord]) -> PerfSummary {
    let n_open = trades.iter().filter(|t| t.is_open()).count();
    let closed: Vec<&TradeRecord> = trades.iter().filter(|t| !t.is_open()).collect();
    let n = closed.len();
    if n == 0 {
        return PerfSummary { n_open, ..Default::default() };
    }

    let profits: Vec<f64> = closed.iter().filter_map(|t| t.profit).collect();
    let win_pcts: Vec<f64> = closed.iter()
        .filter(|t| t.profit.unwrap_or(0.0) > 0.0)
        .filter_map(|t| t.profit_pct)
        .collect();
    let loss_pcts: Vec<f64> = closed.iter()
        .filter(|t| t.profit.unwrap_or(0.0) <= 0.0)
        .filter_map(|t| t.profit_pct.map(f64::abs))
        .collect();

    let gross_profit: f64 = profits.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = profits.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    let profit_factor = if gross_loss < 1e-10 {
        f64::INFINITY
    } else {
        gross_profit / gross_loss
    };

    let mut curve = Vec::with_capacity(n + 1);
    curve.push(0.0);
    let mut cumulative = 0.0;
    for p in &profits {
        cumulative += p;
        curve.push(cumulative);
    }

    PerfSummary {
        n_closed: n,
        n_open,
        win_rate: win_pcts.len() as f64 / n as f64,
        avg_win_pct: mean(&win_pcts).unwrap_or(0.0),
        avg_loss_pct: mean(&loss_pcts).unwrap_or(0.0),
        profit_factor,
        total_profit: cumulative,
        max_drawdown: max_drawdown(&curve),
        best_trade: profits.iter().copied().reduce(f64::max),
        worst_trade: profits.iter().copied().reduce(f64::min),
    }
}

/// Largest peak-to-trough fall of a cumulative-profit curve (≥ 0).
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let Some(&first) = curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0f64;

    for &c in curve {
        if c > peak {
            peak = c;
        }
        max_dd = max_dd.max(peak - c);
    }
    max_dd
}

fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}
