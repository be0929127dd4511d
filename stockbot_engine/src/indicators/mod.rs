//! indicators — Windowed indicator computation over a close-price sequence
//!
//! Every series function returns a `Vec<Option<f64>>` aligned index-for-index
//! with its input.  `None` marks the warm-up region (not enough history yet)
//! and must never take part in signal evaluation.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::{bollinger, BollingerBands};
pub use ema::{ema, Ema};
pub use macd::{macd, MacdParams, MacdSeries};
pub use rsi::{rsi, rsi_from_averages, simple_rsi_at, RsiMethod};
pub use sma::{sma, sma_at};

/// Most recent defined value of a series.
pub fn last_defined(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

/// Extract close prices from bars.
pub fn closes(bars: &[crate::models::Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
