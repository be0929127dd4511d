/// sip.rs — Systematic investment plan returns
///
/// A fixed amount is invested at the first available close of every
/// calendar month.
///
///   shares_k   = amount / close_k
///   held_k     = Σ_{j ≤ k} shares_j
///   invested_k = amount · k
///   value_k    = held_k · close_k
///   ROI_k      = (value_k − invested_k) / invested_k · 100
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, Result};
use crate::models::Bar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipRow {
    pub date:          NaiveDate,
    pub invested:      f64,
    pub shares_bought: f64,
    pub close:         f64,
    pub value:         f64,
    pub roi_pct:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipReport {
    pub monthly_amount: f64,
    pub rows:           Vec<SipRow>,
    pub total_invested: f64,
    pub shares_held:    f64,
    /// Holdings valued at the last monthly purchase close.
    pub final_value:    f64,
    pub roi_pct:        f64,
    /// Holdings valued at the supplied latest price, if any.
    pub value_today:    Option<f64>,
    pub roi_today_pct:  Option<f64>,
}

impl SipReport {
    pub fn start(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }
}

impl fmt::Display for SipReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(start), Some(end)) = (self.start(), self.end()) else {
            return write!(f, "SIP: no purchases");
        };
        write!(
            f,
            "from {} to {}  ROI:{:.2}% Monthly:${:.2}",
            start, end, self.roi_pct, self.monthly_amount
        )?;
        if let Some(today) = self.roi_today_pct {
            write!(f, "  ROI today:{:.2}%", today)?;
        }
        Ok(())
    }
}

fn roi(value: f64, invested: f64) -> f64 {
    if invested == 0.0 {
        0.0
    } else {
        (value - invested) / invested * 100.0
    }
}

/// Monthly purchase schedule over `bars`, which must be in time order.
pub fn sip_returns(bars: &[Bar], monthly_amount: f64, latest_price: Option<f64>) -> Result<SipReport> {
    if monthly_amount <= 0.0 {
        return Err(EngineError::InvalidInput("monthly amount must be positive".into()));
    }
    if bars.is_empty() {
        return Err(EngineError::DataUnavailable("no bars for SIP calculation".into()));
    }

    let mut rows = Vec::new();
    let mut last_month: Option<(i32, u32)> = None;
    let mut shares_held = 0.0;
    let mut total_invested = 0.0;

    for bar in bars {
        let date = bar.date();
        let month = (date.year(), date.month());
        if last_month == Some(month) || !(bar.close > 0.0) {
            continue;
        }
        last_month = Some(month);

        let shares_bought = monthly_amount / bar.close;
        shares_held += shares_bought;
        total_invested += monthly_amount;
        let value = shares_held * bar.close;
        rows.push(SipRow {
            date,
            invested: monthly_amount,
            shares_bought,
            close: bar.close,
            value,
            roi_pct: roi(value, total_invested),
        });
    }

    let Some(last) = rows.last() else {
        return Err(EngineError::DataUnavailable("no valid closes for SIP calculation".into()));
    };
    let final_value = last.value;
    let value_today = latest_price.map(|p| shares_held * p);

    Ok(SipReport {
        monthly_amount,
        total_invested,
        shares_held,
        final_value,
        roi_pct: roi(final_value, total_invested),
        value_today,
        roi_today_pct: value_today.map(|v| roi(v, total_invested)),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(y: i32, m: u32, d: u32, close: f64) -> Bar {
        Bar {
            time: Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap(),
            open: close, high: close, low: close, close, volume: 0.0,
        }
    }

    #[test]
    fn buys_first_close_of_each_month() {
        let bars = vec![
            bar(2024, 1, 2, 10.0),
            bar(2024, 1, 3, 99.0),
            bar(2024, 2, 1, 20.0),
            bar(2024, 2, 15, 99.0),
            bar(2024, 3, 1, 40.0),
        ];
        let r = sip_returns(&bars, 100.0, None).unwrap();
        assert_eq!(r.rows.len(), 3);
        // 10 + 5 + 2.5 shares
        assert!((r.shares_held - 17.5).abs() < 1e-12);
        assert!((r.total_invested - 300.0).abs() < 1e-12);
        assert!((r.final_value - 700.0).abs() < 1e-9);
        assert!((r.roi_pct - 400.0 / 3.0).abs() < 1e-9);
        assert!((r.rows[1].roi_pct - 50.0).abs() < 1e-9);
        assert_eq!(r.value_today, None);
    }

    #[test]
    fn latest_price_gives_today_roi() {
        let bars = vec![bar(2024, 1, 2, 50.0), bar(2024, 2, 1, 50.0)];
        let r = sip_returns(&bars, 100.0, Some(25.0)).unwrap();
        assert!((r.value_today.unwrap() - 100.0).abs() < 1e-12);
        assert!((r.roi_today_pct.unwrap() + 50.0).abs() < 1e-12);
        assert!((r.roi_pct - 0.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_data_unavailable() {
        assert!(matches!(sip_returns(&[], 100.0, None), Err(EngineError::DataUnavailable(_))));
    }
}
