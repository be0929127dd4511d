/// tools.rs — Function-calling tool registry for the chat assistant
///
/// Each tool has a JSON-schema description sent with every completion
/// request.  When the model asks for a tool by name the registry parses the
/// arguments, fetches one year of daily bars and returns a one-line answer.
///
///   get_stock_price    last close
///   calculate_SMA      SMA(window) of closes
///   calculate_EMA      EMA(span = window), seeded with the first close
///   calculate_RSI      RSI(14), Wilder smoothing
///   calculate_MACD     MACD(12, 26, 9)
///   plot_stock_price   close series exported as CSV
///   calculate_sip_roi  monthly SIP over the configured horizon
use std::path::PathBuf;

use ahash::AHashMap;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::info;

use crate::config::AppConfig;
use crate::data::{years_in_days, BarRequest, MarketData};
use crate::error::{EngineError, Result};
use crate::indicators::{closes, ema, last_defined, macd, rsi, sma, MacdParams, RsiMethod};
use crate::models::{Bar, Timeframe};
use crate::sip::sip_returns;

const TOOL_RSI_PERIOD: usize = 14;
const HISTORY_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    StockPrice,
    Sma,
    Ema,
    Rsi,
    Macd,
    PlotPrice,
    SipRoi,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::SipRoi,
        ToolKind::StockPrice,
        ToolKind::Sma,
        ToolKind::Ema,
        ToolKind::Rsi,
        ToolKind::Macd,
        ToolKind::PlotPrice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::StockPrice => "get_stock_price",
            ToolKind::Sma        => "calculate_SMA",
            ToolKind::Ema        => "calculate_EMA",
            ToolKind::Rsi        => "calculate_RSI",
            ToolKind::Macd       => "calculate_MACD",
            ToolKind::PlotPrice  => "plot_stock_price",
            ToolKind::SipRoi     => "calculate_sip_roi",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ToolKind::StockPrice => "Gets the latest stock price given the ticker symbol of a company",
            ToolKind::Sma        => "Calculate the simple moving average of a given stock ticker and a window",
            ToolKind::Ema        => "Calculate the exponential moving average of a given stock ticker and a window",
            ToolKind::Rsi        => "Calculates the RSI of the given stock ticker",
            ToolKind::Macd       => "Calculates the MACD of the given stock ticker",
            ToolKind::PlotPrice  => "Plots the stock price for the last year of the given stock ticker",
            ToolKind::SipRoi     => "Gets the ROI of a monthly systematic investment plan in the given stock ticker",
        }
    }

    fn takes_window(&self) -> bool {
        matches!(self, ToolKind::Sma | ToolKind::Ema)
    }

    /// JSON-schema function description in the chat-completions format.
    pub fn schema(&self) -> Value {
        let ticker = json!({
            "type": "string",
            "description": "The stock ticker symbol of a company (e.g., AAPL for Apple)."
        });
        let (properties, required) = if self.takes_window() {
            let label = if *self == ToolKind::Sma { "SMA" } else { "EMA" };
            (
                json!({
                    "ticker": ticker,
                    "window": {
                        "type": "string",
                        "description": format!("The timeframe to consider when calculating the {label}")
                    }
                }),
                json!(["ticker", "window"]),
            )
        } else {
            (json!({ "ticker": ticker }), json!(["ticker"]))
        };
        json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required
            }
        })
    }
}

/// A tool invocation with validated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub kind:   ToolKind,
    pub ticker: String,
    pub window: Option<usize>,
}

impl ToolCall {
    pub fn from_args(kind: ToolKind, args: &Value) -> Result<Self> {
        let ticker = args
            .get("ticker")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::InvalidInput(format!("{}: missing 'ticker' argument", kind.name())))?;

        let window = if kind.takes_window() {
            Some(parse_window(args.get("window"))?)
        } else {
            None
        };
        Ok(Self { kind, ticker, window })
    }
}

/// The model sends the window as a string ("20"), sometimes as a number.
fn parse_window(v: Option<&Value>) -> Result<usize> {
    let parsed = match v {
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        _ => None,
    };
    match parsed {
        Some(w) if w > 0 => Ok(w),
        _ => Err(EngineError::InvalidInput(format!(
            "window must be a positive integer, got {}",
            v.map_or_else(|| "nothing".to_string(), Value::to_string)
        ))),
    }
}

pub struct ToolRegistry<D> {
    data:        D,
    by_name:     AHashMap<&'static str, ToolKind>,
    plot_dir:    PathBuf,
    sip_monthly: f64,
    sip_years:   i64,
    as_of:       Option<NaiveDate>,
}

impl<D: MarketData> ToolRegistry<D> {
    pub fn new(data: D, cfg: &AppConfig) -> Self {
        let by_name = ToolKind::ALL.iter().map(|k| (k.name(), *k)).collect();
        Self {
            data,
            by_name,
            plot_dir:    cfg.plot_dir.clone(),
            sip_monthly: cfg.sip_monthly,
            sip_years:   cfg.sip_years,
            as_of:       None,
        }
    }

    /// Pin "today" for deterministic runs.
    pub fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    pub fn schemas(&self) -> Vec<Value> {
        ToolKind::ALL.iter().map(ToolKind::schema).collect()
    }

    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        self.by_name.get(name).copied()
    }

    fn today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn daily_bars(&self, ticker: &str, days: i64) -> Result<Vec<Bar>> {
        let req = BarRequest::lookback(ticker, days, Timeframe::Day1, self.today())?;
        self.data.bars(&req).await
    }

    /// Run a tool by name.  Unknown names are `InvalidInput`.
    pub async fn dispatch(&self, name: &str, args: &Value) -> Result<String> {
        let kind = self
            .lookup(name)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown function '{}'", name)))?;
        let call = ToolCall::from_args(kind, args)?;
        info!("Tool call: {} {:?}", name, call);
        self.run(&call).await
    }

    pub async fn run(&self, call: &ToolCall) -> Result<String> {
        let t = call.ticker.as_str();
        let days = match call.kind {
            ToolKind::SipRoi => years_in_days(self.sip_years.max(1))?,
            _ => HISTORY_DAYS,
        };
        let bars = self.daily_bars(t, days).await?;
        let closes = closes(&bars);
        let need = |needed: usize| EngineError::InsufficientData { needed, got: closes.len() };

        match call.kind {
            ToolKind::StockPrice => {
                let price = closes.last().copied().ok_or_else(|| need(1))?;
                Ok(format!("The current stock price of {} is {:.2}", t, price))
            }
            ToolKind::Sma => {
                let w = call.window.unwrap_or(1);
                let v = last_defined(&sma(&closes, w)).ok_or_else(|| need(w))?;
                Ok(format!("The {}-day SMA of {} is {:.2}", w, t, v))
            }
            ToolKind::Ema => {
                let w = call.window.unwrap_or(1);
                let v = last_defined(&ema(&closes, w)).ok_or_else(|| need(w))?;
                Ok(format!("The {}-day EMA of {} is {:.2}", w, t, v))
            }
            ToolKind::Rsi => {
                let v = last_defined(&rsi(&closes, TOOL_RSI_PERIOD, RsiMethod::Wilder))
                    .ok_or_else(|| need(TOOL_RSI_PERIOD + 1))?;
                Ok(format!("The RSI of {} is {:.2}", t, v))
            }
            ToolKind::Macd => {
                let p = MacdParams::default();
                let (line, signal, hist) = macd(&closes, p)
                    .latest()
                    .ok_or_else(|| need(p.slow + p.signal - 1))?;
                Ok(format!(
                    "The MACD of {} is MACD: {:.2}, Signal: {:.2}, Histogram: {:.2}",
                    t, line, signal, hist
                ))
            }
            ToolKind::PlotPrice => {
                let path = self.plot_dir.join(format!("{}_1y.csv", t));
                write_close_csv(&bars, &path)?;
                Ok(format!("Saved {} daily closes of {} over the last year to {}", bars.len(), t, path.display()))
            }
            ToolKind::SipRoi => {
                let report = sip_returns(&bars, self.sip_monthly, closes.last().copied())?;
                Ok(format!("{} {}", t, report))
            }
        }
    }
}

fn write_close_csv(bars: &[Bar], path: &std::path::Path) -> Result<()> {
    use polars::prelude::*;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let dates: Vec<String> = bars.iter().map(|b| b.date().to_string()).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mut df = df!(
        "date"  => dates,
        "close" => close
    )?;
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}
