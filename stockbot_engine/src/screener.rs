/// screener.rs — Reversal-breakout first-signal detector
///
/// Replays bars in order; at bar t every indicator is evaluated on the
/// prefix closes[..=t] only, so no future bar can influence a decision.
///
///   crossed_above(a, b)  ⇔  a_{t−1} ≤ b_{t−1}  AND  a_t > b_t
///   crossed_below(a, b)  ⇔  a_{t−1} ≥ b_{t−1}  AND  a_t < b_t
///
///   BUY  = crossed_above(close, SMA_short) AND crossed_above(SMA_short, SMA_long)
///          AND RSI_t > buy_floor    AND RSI_t > RSI_{t−1}
///   SELL = crossed_below(close, SMA_short) AND crossed_below(SMA_short, SMA_long)
///          AND RSI_t < sell_ceiling AND RSI_t < RSI_{t−1}
///
/// The scan stops at the first bar where either conjunction holds.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{BarRequest, MarketData};
use crate::error::{EngineError, Result};
use crate::indicators::{closes, simple_rsi_at, sma_at};
use crate::models::{Bar, Side, SignalEvent, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenerParams {
    pub short_window:     usize,
    pub long_window:      usize,
    pub rsi_period:       usize,
    pub rsi_buy_floor:    f64,
    pub rsi_sell_ceiling: f64,
}

impl Default for ScreenerParams {
    fn default() -> Self {
        Self {
            short_window:     8,
            long_window:      21,
            rsi_period:       14,
            rsi_buy_floor:    30.0,
            rsi_sell_ceiling: 70.0,
        }
    }
}

impl ScreenerParams {
    /// Bars before the first bar that can be evaluated.
    fn min_bars(&self) -> usize {
        self.long_window.max(self.rsi_period + 1)
    }
}

/// Indicator values at the end of one prefix.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    close:     f64,
    sma_short: f64,
    sma_long:  f64,
    rsi:       f64,
}

impl Snapshot {
    fn at(prefix: &[f64], p: &ScreenerParams) -> Option<Self> {
        Some(Self {
            close:     *prefix.last()?,
            sma_short: sma_at(prefix, p.short_window)?,
            sma_long:  sma_at(prefix, p.long_window)?,
            rsi:       simple_rsi_at(prefix, p.rsi_period)?,
        })
    }
}

fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a <= prev_b && a > b
}

fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a >= prev_b && a < b
}

fn classify(prev: &Snapshot, cur: &Snapshot, p: &ScreenerParams) -> Option<Side> {
    let buy = crossed_above(prev.close, prev.sma_short, cur.close, cur.sma_short)
        && crossed_above(prev.sma_short, prev.sma_long, cur.sma_short, cur.sma_long)
        && cur.rsi > p.rsi_buy_floor
        && cur.rsi > prev.rsi;
    if buy {
        return Some(Side::Buy);
    }
    let sell = crossed_below(prev.close, prev.sma_short, cur.close, cur.sma_short)
        && crossed_below(prev.sma_short, prev.sma_long, cur.sma_short, cur.sma_long)
        && cur.rsi < p.rsi_sell_ceiling
        && cur.rsi < prev.rsi;
    sell.then_some(Side::Sell)
}

/// Scan for the first Buy/Sell event.  `Ok(None)` means the whole window
/// was exhausted without a match.
pub fn detect_first_signal(bars: &[Bar], params: &ScreenerParams) -> Result<Option<SignalEvent>> {
    if params.short_window == 0 || params.long_window == 0 || params.rsi_period == 0 {
        return Err(EngineError::InvalidInput("screener windows must be positive".into()));
    }
    let needed = params.min_bars();
    if bars.len() < needed {
        return Err(EngineError::InsufficientData { needed, got: bars.len() });
    }

    let closes = closes(bars);
    let mut prev = Snapshot::at(&closes[..needed], params);

    for t in needed..bars.len() {
        let cur = Snapshot::at(&closes[..=t], params);
        if let (Some(p), Some(c)) = (prev.as_ref(), cur.as_ref()) {
            if let Some(side) = classify(p, c, params) {
                let event = SignalEvent { date: bars[t].date(), side, price: c.close };
                debug!("first signal at bar {}: {:?}", t, event);
                return Ok(Some(event));
            }
        }
        prev = cur;
    }
    Ok(None)
}

// ── Screening a universe ──────────────────────────────────────────────────

/// Symbol universes.  Index-constituent lists are supplied by the caller as
/// `Custom`.
#[derive(Debug, Clone, PartialEq)]
pub enum Universe {
    WatchList,
    Custom(Vec<String>),
}

pub const WATCH_LIST: &[&str] = &[
    "AAPL", "MSFT", "GOOG", "AMZN", "TSLA", "DOCS", "AVGO", "NFLX", "AWK", "BJ", "CCI",
];

impl Universe {
    pub fn symbols(&self) -> Vec<String> {
        match self {
            Universe::WatchList => WATCH_LIST.iter().map(|s| s.to_string()).collect(),
            Universe::Custom(list) => list
                .iter()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    pub symbol:        String,
    pub signal:        SignalEvent,
    pub current_price: f64,
}

impl ScreenResult {
    /// Move since the signal, signed in the signal's favour.
    pub fn profit_pct(&self) -> f64 {
        let entry = self.signal.price;
        match self.signal.side {
            Side::Buy => (self.current_price - entry) / entry * 100.0,
            Side::Sell => (entry - self.current_price) / entry * 100.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScreenOutcome {
    pub hits:      Vec<ScreenResult>,
    pub no_signal: Vec<String>,
    pub skipped:   Vec<(String, EngineError)>,
}

/// Detector for one symbol's bars, with the latest close attached.
pub fn screen_bars(symbol: &str, bars: &[Bar], params: &ScreenerParams) -> Result<Option<ScreenResult>> {
    let Some(signal) = detect_first_signal(bars, params)? else {
        return Ok(None);
    };
    let current_price = bars.last().map(|b| b.close).unwrap_or(signal.price);
    Ok(Some(ScreenResult { symbol: symbol.to_string(), signal, current_price }))
}

/// Fetch and scan every symbol over the trailing `lookback_days`.  A fetch
/// or computation failure only drops that symbol.
pub async fn screen<D: MarketData + ?Sized>(
    source:        &D,
    symbols:       &[String],
    lookback_days: i64,
    timeframe:     Timeframe,
    end:           NaiveDate,
    params:        &ScreenerParams,
) -> ScreenOutcome {
    info!("Screening {} symbols — {} day lookback, {}", symbols.len(), lookback_days, timeframe);
    let mut outcome = ScreenOutcome::default();

    for symbol in symbols {
        let scanned = match BarRequest::lookback(symbol, lookback_days, timeframe, end) {
            Ok(request) => match source.bars(&request).await {
                Ok(bars) => screen_bars(symbol, &bars, params),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        match scanned {
            Ok(Some(hit)) => {
                info!("  {:<6} {} @ {:.2} on {}", symbol, hit.signal.side, hit.signal.price, hit.signal.date);
                outcome.hits.push(hit);
            }
            Ok(None) => outcome.no_signal.push(symbol.clone()),
            Err(e) => {
                warn!("  {:<6} skipped: {}", symbol, e);
                outcome.skipped.push((symbol.clone(), e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn bars_from(closes: &[f64]) -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        closes.iter().enumerate().map(|(i, &c)| Bar {
            time: t0 + Duration::days(i as i64),
            open: c, high: c, low: c, close: c, volume: 0.0,
        }).collect()
    }

    #[test]
    fn crossing_needs_prior_false() {
        assert!(crossed_above(1.0, 2.0, 3.0, 2.5));
        assert!(!crossed_above(3.0, 2.0, 3.0, 2.5), "already above");
        assert!(crossed_below(3.0, 2.0, 1.0, 2.0));
        assert!(!crossed_below(1.0, 2.0, 1.0, 2.0));
    }

    #[test]
    fn flat_series_has_no_signal() {
        let bars = bars_from(&[100.0; 60]);
        assert_eq!(detect_first_signal(&bars, &ScreenerParams::default()).unwrap(), None);
    }

    #[test]
    fn too_few_bars_is_an_error() {
        let bars = bars_from(&[100.0; 10]);
        let err = detect_first_signal(&bars, &ScreenerParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { needed: 21, got: 10 }));
    }

    #[test]
    fn sell_side_profit_is_inverted() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let r = ScreenResult {
            symbol: "X".into(),
            signal: SignalEvent { date, side: Side::Sell, price: 50.0 },
            current_price: 45.0,
        };
        assert!((r.profit_pct() - 10.0).abs() < 1e-12);
        let b = ScreenResult { signal: SignalEvent { side: Side::Buy, ..r.signal.clone() }, ..r };
        assert!((b.profit_pct() + 10.0).abs() < 1e-12);
    }

    #[test]
    fn custom_universe_is_normalised() {
        let u = Universe::Custom(vec![" aapl ".into(), "".into(), "msft".into()]);
        assert_eq!(u.symbols(), vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(Universe::WatchList.symbols().len(), WATCH_LIST.len());
    }

    #[tokio::test]
    async fn out_of_range_lookback_skips_symbol() {
        let source = crate::data::StaticMarketData::new().with("AAPL", bars_from(&[100.0; 40]));
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let outcome = screen(
            &source, &["AAPL".to_string()], 10_000_000_000_000, Timeframe::Day1, end,
            &ScreenerParams::default(),
        ).await;
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(outcome.skipped[0].1, EngineError::InvalidInput(_)));
    }
}
