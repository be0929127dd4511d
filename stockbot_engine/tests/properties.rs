use chrono::{Duration, NaiveDate, TimeZone, Utc};

use stockbot_engine::backtest::simulate;
use stockbot_engine::data::StaticMarketData;
use stockbot_engine::indicators::{ema, rsi, sma, RsiMethod};
use stockbot_engine::screener::{detect_first_signal, screen, ScreenerParams};
use stockbot_engine::strategy::{ExitReason, RsiStrategy, RsiStrategyParams};
use stockbot_engine::{Bar, EngineError, Side, Timeframe};

fn bars_from(closes: &[f64]) -> Vec<Bar> {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar {
            time: t0 + Duration::days(i as i64),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1_000.0,
        })
        .collect()
}

fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 12.0 * (x * 0.31).sin() + 4.0 * (x * 1.7).cos() + 0.05 * x
        })
        .collect()
}

/// 30 unit declines from 130, then a +100 gap: the gap bar crosses close
/// over SMA(8) and SMA(8) over SMA(21) at once, RSI jumps from 0 to ~88.
fn breakout_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
    closes.push(201.0);
    closes
}

// ── Indicators ────────────────────────────────────────────────────────────

#[test]
fn constant_series_is_flat_and_neutral() {
    let closes = vec![42.0; 60];
    for v in sma(&closes, 10).into_iter().flatten() {
        assert!((v - 42.0).abs() < 1e-12);
    }
    for v in ema(&closes, 10).into_iter().flatten() {
        assert!((v - 42.0).abs() < 1e-12);
    }
    for method in [RsiMethod::Simple, RsiMethod::Wilder] {
        let series = rsi(&closes, 14, method);
        assert!(series[..14].iter().all(Option::is_none));
        assert!(series[14..].iter().all(|v| *v == Some(50.0)));
    }
}

#[test]
fn rising_series_rsi_is_100_and_bounded() {
    let rising: Vec<f64> = (0..50).map(|i| 10.0 + i as f64 * 0.5).collect();
    for method in [RsiMethod::Simple, RsiMethod::Wilder] {
        assert!(rsi(&rising, 14, method).into_iter().flatten().all(|v| v == 100.0));
        assert!(rsi(&wave(300), 14, method)
            .into_iter()
            .flatten()
            .all(|v| (0.0..=100.0).contains(&v)));
    }
}

// ── First-signal detector ─────────────────────────────────────────────────

#[test]
fn breakout_gives_buy_on_the_gap_bar() {
    let bars = bars_from(&breakout_closes());
    let event = detect_first_signal(&bars, &ScreenerParams::default())
        .unwrap()
        .expect("buy signal");
    assert_eq!(event.side, Side::Buy);
    assert_eq!(event.date, bars[30].date());
    assert_eq!(event.price, 201.0);
}

#[test]
fn detector_is_deterministic_and_ignores_later_bars() {
    let params = ScreenerParams::default();
    let mut closes = breakout_closes();
    let first = detect_first_signal(&bars_from(&closes), &params).unwrap();
    assert_eq!(first, detect_first_signal(&bars_from(&closes), &params).unwrap());

    // whatever follows the signal bar cannot move it
    closes.extend([5.0, 400.0, 3.0, 250.0, 1.0]);
    assert_eq!(first, detect_first_signal(&bars_from(&closes), &params).unwrap());

    let w = bars_from(&wave(200));
    assert_eq!(
        detect_first_signal(&w, &params).unwrap(),
        detect_first_signal(&w, &params).unwrap()
    );
}

#[tokio::test]
async fn screen_reports_hits_and_skips_failures() {
    let source = StaticMarketData::new()
        .with("BRK", bars_from(&breakout_closes()))
        .with("FLAT", bars_from(&[50.0; 40]));
    let symbols = vec!["BRK".to_string(), "FLAT".to_string(), "GONE".to_string()];
    let end = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();

    let outcome = screen(&source, &symbols, 90, Timeframe::Day1, end, &ScreenerParams::default()).await;
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(outcome.hits[0].symbol, "BRK");
    assert_eq!(outcome.hits[0].current_price, 201.0);
    assert_eq!(outcome.no_signal, vec!["FLAT".to_string()]);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(matches!(outcome.skipped[0].1, EngineError::InvalidSymbol(_)));
}

// ── Trade simulator ───────────────────────────────────────────────────────

#[test]
fn at_most_one_open_position_and_it_is_last() {
    let params = RsiStrategyParams::default();
    for n in [40, 120, 250, 500] {
        let report = simulate(&bars_from(&wave(n)), &params).unwrap();
        let open: Vec<usize> = report
            .trades
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_open())
            .map(|(i, _)| i)
            .collect();
        assert!(open.len() <= 1);
        if let Some(&i) = open.first() {
            assert_eq!(i, report.trades.len() - 1);
        }
    }
}

#[test]
fn profits_are_sign_correct() {
    let params = RsiStrategyParams { quantity: 7.0, ..Default::default() };
    let report = simulate(&bars_from(&wave(500)), &params).unwrap();
    assert!(report.closed_trades().count() > 0, "wave should trade");

    let mut total = 0.0;
    for t in report.closed_trades() {
        let sell = t.sell_price.unwrap();
        let profit = t.profit.unwrap();
        assert!((profit - (sell - t.buy_price) * 7.0).abs() < 1e-9);
        assert!((t.profit_pct.unwrap() - (sell - t.buy_price) / t.buy_price * 100.0).abs() < 1e-9);
        assert_eq!(profit > 0.0, sell > t.buy_price);
        assert!(t.sell_date.unwrap() >= t.buy_date);
        total += profit;
    }
    assert!((report.total_profit - total).abs() < 1e-9);
}

#[test]
fn rsi_cross_then_overbought_is_one_round_trip() {
    // RSI(14): 35.7 → 42.9 (entry) → 50 → 57.1 → 64.3 → 71.4 (exit)
    let mut closes = vec![100.0];
    for i in 0..19 {
        let step = if i < 9 { -1.0 } else { 1.0 };
        closes.push(closes[closes.len() - 1] + step);
    }
    let report = simulate(&bars_from(&closes), &RsiStrategyParams::default()).unwrap();
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].exit_reason, Some(ExitReason::RsiExit));
    assert!(report.open_position().is_none());
}

#[test]
fn stop_loss_wins_regardless_of_rsi() {
    let strategy = RsiStrategy::new(RsiStrategyParams::default()).unwrap();
    for rsi in [None, Some(10.0), Some(55.0), Some(99.0)] {
        assert_eq!(strategy.exit_reason(100.0, 89.0, rsi), Some(ExitReason::StopLoss));
    }
}
