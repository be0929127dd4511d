/// reporting.rs — Console tables and file exports
///
/// Console: trade log, screen hits, SIP schedule, indicator snapshot,
///          news headlines, options watchlist and chains.
/// Files:   JSON (report + metadata) and CSV trade log via polars.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use stockbot_engine::backtest::BacktestReport;
use stockbot_engine::indicators::{
    bollinger, ema, last_defined, macd, rsi, sma, MacdParams, RsiMethod,
};
use stockbot_engine::news::NewsArticle;
use stockbot_engine::options::{OptionContract, Watchlist};
use stockbot_engine::screener::ScreenOutcome;
use stockbot_engine::sip::SipReport;
use stockbot_engine::{Bar, Timeframe};

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub strategy_name: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub n_bars: usize,
}

impl ReportMetadata {
    pub fn for_bars(strategy_name: &str, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Self {
        Self {
            generated_at: Utc::now(),
            strategy_name: strategy_name.to_string(),
            symbol: symbol.to_string(),
            timeframe,
            start: bars.first().map(Bar::date),
            end: bars.last().map(Bar::date),
            n_bars: bars.len(),
        }
    }
}

#[derive(Serialize)]
struct BacktestExport<'a> {
    metadata: &'a ReportMetadata,
    report: &'a BacktestReport,
}

// ── Console ───────────────────────────────────────────────────────────────

pub fn print_trade_log(report: &BacktestReport) {
    println!();
    println!(
        "{:<12} {:>10} {:<12} {:>10} {:>10} {:>10} {:>9}  {}",
        "Buy Date", "Buy", "Sell Date", "Sell", "Qty", "Profit", "Profit%", "Exit"
    );
    println!("{}", "─".repeat(94));
    for t in &report.trades {
        let sell_date = t.sell_date.map_or_else(|| "open".to_string(), |d| d.to_string());
        let fmt_opt = |v: Option<f64>, prec: usize| v.map_or_else(|| "-".to_string(), |x| format!("{:.*}", prec, x));
        println!(
            "{:<12} {:>10.2} {:<12} {:>10} {:>10.2} {:>10} {:>9}  {}",
            t.buy_date,
            t.buy_price,
            sell_date,
            fmt_opt(t.sell_price, 2),
            t.quantity,
            fmt_opt(t.profit, 2),
            fmt_opt(t.profit_pct, 2),
            t.exit_reason.map_or_else(String::new, |r| r.to_string()),
        );
    }
    println!("{}", "─".repeat(94));
    println!("Total realized profit: ${:.2}", report.total_profit);
    println!();
    print!("{}", report.summary);
}

pub fn print_screen(outcome: &ScreenOutcome) {
    println!();
    println!(
        "{:<8} {:<6} {:<12} {:>12} {:>12} {:>9}",
        "Symbol", "Signal", "Date", "Signal Px", "Current Px", "Move%"
    );
    println!("{}", "─".repeat(64));
    for hit in &outcome.hits {
        println!(
            "{:<8} {:<6} {:<12} {:>12.2} {:>12.2} {:>9.2}",
            hit.symbol,
            hit.signal.side,
            hit.signal.date,
            hit.signal.price,
            hit.current_price,
            hit.profit_pct()
        );
    }
    println!("{}", "─".repeat(64));
    println!(
        "{} signals, {} without signal, {} skipped",
        outcome.hits.len(),
        outcome.no_signal.len(),
        outcome.skipped.len()
    );
    for (symbol, err) in &outcome.skipped {
        println!("  {:<8} {}", symbol, err);
    }
}

pub fn print_sip(symbol: &str, report: &SipReport) {
    println!();
    println!(
        "{:<12} {:>10} {:>12} {:>10} {:>14} {:>9}",
        "Date", "Invested", "Shares", "Close", "Value", "ROI%"
    );
    println!("{}", "─".repeat(72));
    for r in &report.rows {
        println!(
            "{:<12} {:>10.2} {:>12.4} {:>10.2} {:>14.2} {:>9.2}",
            r.date, r.invested, r.shares_bought, r.close, r.value, r.roi_pct
        );
    }
    println!("{}", "─".repeat(72));
    println!("Total invested : ${:.2}", report.total_invested);
    println!("Shares held    : {:.4}", report.shares_held);
    println!("Final value    : ${:.2}", report.final_value);
    if let Some(v) = report.value_today {
        println!("Value today    : ${:.2}", v);
    }
    println!("{} {}", symbol, report);
}

pub fn print_indicators(symbol: &str, bars: &[Bar], window: usize) {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{:.2}", x));

    println!();
    println!("{} — {} bars, last close {}", symbol, closes.len(), show(closes.last().copied()));
    println!("  SMA({:<3})        : {}", window, show(last_defined(&sma(&closes, window))));
    println!("  EMA({:<3})        : {}", window, show(last_defined(&ema(&closes, window))));
    println!("  RSI(14) simple  : {}", show(last_defined(&rsi(&closes, 14, RsiMethod::Simple))));
    println!("  RSI(14) Wilder  : {}", show(last_defined(&rsi(&closes, 14, RsiMethod::Wilder))));
    match macd(&closes, MacdParams::default()).latest() {
        Some((line, signal, hist)) => {
            println!("  MACD(12,26,9)   : {:.2}  signal {:.2}  hist {:.2}", line, signal, hist)
        }
        None => println!("  MACD(12,26,9)   : n/a"),
    }
    match bollinger(&closes, window, 2.0).latest() {
        Some((upper, middle, lower)) => {
            println!("  Bollinger({},2)  : {:.2} / {:.2} / {:.2}", window, upper, middle, lower)
        }
        None => println!("  Bollinger({},2)  : n/a", window),
    }
}

pub fn print_news(symbol: &str, articles: &[NewsArticle]) {
    println!();
    if articles.is_empty() {
        println!("No news found for {}. Try another ticker.", symbol);
        return;
    }
    for a in articles {
        println!("### {}", a.title);
        println!("    {}", a.link);
        println!("    Source : {}", a.source);
        println!("    Summary: {}", a.summary);
        println!("{}", "─".repeat(64));
    }
}

pub fn print_watchlist(watchlist: &Watchlist) {
    if watchlist.is_empty() {
        println!("Your watchlist is empty. Add stocks to track options.");
    } else {
        println!("Watchlist: {}", watchlist.symbols().join(", "));
    }
}

pub fn print_chain(symbol: &str, chain: &stockbot_engine::Result<Vec<OptionContract>>) {
    println!();
    println!("Options chain for {}", symbol);
    match chain {
        Err(e) => println!("  Error fetching options data: {}", e),
        Ok(contracts) if contracts.is_empty() => println!("  No options data available for {}.", symbol),
        Ok(contracts) => {
            println!("{:<24} {:<5} {:>10} {:<12} {:<9}", "Contract", "Type", "Strike", "Expires", "Style");
            println!("{}", "─".repeat(64));
            for c in contracts {
                println!(
                    "{:<24} {:<5} {:>10.2} {:<12} {:<9}",
                    c.ticker,
                    c.contract_type,
                    c.strike_price,
                    c.expiration_date,
                    c.exercise_style.as_deref().unwrap_or("-"),
                );
            }
        }
    }
}

// ── Files ─────────────────────────────────────────────────────────────────

fn base_name(symbol: &str) -> String {
    format!("backtest_{}_{}", symbol, Utc::now().format("%Y%m%d_%H%M%S"))
}

pub fn export_json(dir: &Path, metadata: &ReportMetadata, report: &BacktestReport) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", base_name(&metadata.symbol)));
    let content = serde_json::to_string_pretty(&BacktestExport { metadata, report })?;
    fs::write(&path, content)?;
    info!("JSON report exported to: {}", path.display());
    Ok(path)
}

pub fn trades_dataframe(report: &BacktestReport) -> Result<DataFrame> {
    let t = &report.trades;
    let df = df!(
        "buy_date" => t.iter().map(|x| x.buy_date.to_string()).collect::<Vec<_>>(),
        "buy_price" => t.iter().map(|x| x.buy_price).collect::<Vec<_>>(),
        "sell_date" => t.iter().map(|x| x.sell_date.map(|d| d.to_string())).collect::<Vec<_>>(),
        "sell_price" => t.iter().map(|x| x.sell_price).collect::<Vec<_>>(),
        "quantity" => t.iter().map(|x| x.quantity).collect::<Vec<_>>(),
        "profit" => t.iter().map(|x| x.profit).collect::<Vec<_>>(),
        "profit_pct" => t.iter().map(|x| x.profit_pct).collect::<Vec<_>>(),
        "exit_reason" => t.iter().map(|x| x.exit_reason.map(|r| r.to_string())).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

pub fn export_trades_csv(dir: &Path, symbol: &str, report: &BacktestReport) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_trades.csv", base_name(symbol)));
    let mut df = trades_dataframe(report)?;
    let mut file = fs::File::create(&path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    info!("CSV trade log exported to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use stockbot_engine::backtest::simulate;
    use stockbot_engine::strategy::RsiStrategyParams;

    fn report() -> (Vec<Bar>, BacktestReport) {
        // drop 9, rise 10: one entry then an RSI exit
        let mut closes = vec![100.0];
        for i in 0..19 {
            let step = if i < 9 { -1.0 } else { 1.0 };
            closes.push(closes[closes.len() - 1] + step);
        }
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                time: t0 + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 0.0,
            })
            .collect();
        let report = simulate(&bars, &RsiStrategyParams::default()).unwrap();
        (bars, report)
    }

    #[test]
    fn trade_frame_has_one_row_per_trade() {
        let (_, report) = report();
        let df = trades_dataframe(&report).unwrap();
        assert_eq!(df.height(), report.trades.len());
        assert_eq!(df.width(), 8);
    }

    #[test]
    fn json_export_includes_metadata() {
        let (bars, report) = report();
        let meta = ReportMetadata::for_bars("RSI", "TEST", Timeframe::Day1, &bars);
        let dir = std::env::temp_dir().join(format!("stockbot_report_{}", std::process::id()));
        let path = export_json(&dir, &meta, &report).unwrap();

        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["metadata"]["symbol"], "TEST");
        assert_eq!(v["metadata"]["n_bars"], 20);
        assert_eq!(v["report"]["trades"].as_array().unwrap().len(), report.trades.len());
        fs::remove_dir_all(&dir).ok();
    }
}
