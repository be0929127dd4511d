use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// One OHLCV bar for a single trading interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub time:   DateTime<Utc>,
    pub open:   f64,
    pub high:   f64,
    pub low:    f64,
    pub close:  f64,
    pub volume: f64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.time.date_naive()
    }
}

/// First bar where the screener's conjunction of conditions held.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalEvent {
    pub date:  NaiveDate,
    pub side:  Side,
    pub price: f64,
}

/// Bar interval.  Parses the labels used by the screener ("1 Day"), the
/// paper-trading form ("1Day", "1D") and plain shorthand ("1d").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Min5,
    Min15,
    Hour1,
    #[default]
    Day1,
    Week1,
    Month1,
}

impl Timeframe {
    /// Timeframe string understood by the Alpaca bars endpoint.
    pub fn as_alpaca(&self) -> &'static str {
        match self {
            Timeframe::Min5   => "5Min",
            Timeframe::Min15  => "15Min",
            Timeframe::Hour1  => "1Hour",
            Timeframe::Day1   => "1Day",
            Timeframe::Week1  => "1Week",
            Timeframe::Month1 => "1Month",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_alpaca())
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "5min" | "5m"                              => Ok(Timeframe::Min5),
            "15min" | "15m"                            => Ok(Timeframe::Min15),
            "1hour" | "1h" | "1hr"                     => Ok(Timeframe::Hour1),
            "1day" | "1d"                              => Ok(Timeframe::Day1),
            "1week" | "1w" | "1wk"                     => Ok(Timeframe::Week1),
            "1month" | "1mo" | "1mon"                  => Ok(Timeframe::Month1),
            _ => Err(EngineError::InvalidInput(format!("unsupported timeframe '{}'", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_accepts_every_ui_label() {
        assert_eq!("1 Day".parse::<Timeframe>().unwrap(), Timeframe::Day1);
        assert_eq!("1Day".parse::<Timeframe>().unwrap(), Timeframe::Day1);
        assert_eq!("1D".parse::<Timeframe>().unwrap(), Timeframe::Day1);
        assert_eq!("1 Hour".parse::<Timeframe>().unwrap(), Timeframe::Hour1);
        assert_eq!("15Min".parse::<Timeframe>().unwrap(), Timeframe::Min15);
        assert_eq!("1 Month".parse::<Timeframe>().unwrap(), Timeframe::Month1);
        assert!("2 Days".parse::<Timeframe>().is_err());
    }

    #[test]
    fn default_timeframe_is_daily() {
        assert_eq!(Timeframe::default(), Timeframe::Day1);
    }

    #[test]
    fn timeframe_round_trips_through_alpaca_label() {
        for tf in [Timeframe::Min5, Timeframe::Hour1, Timeframe::Week1] {
            assert_eq!(tf.as_alpaca().parse::<Timeframe>().unwrap(), tf);
        }
    }
}
