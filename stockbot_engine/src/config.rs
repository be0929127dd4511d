/// config.rs — Centralised configuration loaded from .env
///
/// Credentials for the external services plus the default strategy
/// thresholds.  Loading happens once at startup; callers borrow &AppConfig
/// and derive per-run parameter structs from it.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::models::Timeframe;
use crate::screener::ScreenerParams;
use crate::strategy::RsiStrategyParams;

pub const DEFAULT_TRADING_URL: &str = "https://paper-api.alpaca.markets";
pub const DEFAULT_DATA_URL:    &str = "https://data.alpaca.markets";
pub const DEFAULT_OPENAI_URL:  &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co";
pub const DEFAULT_POLYGON_URL: &str = "https://api.polygon.io";

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── Alpaca credentials / endpoints ───────────────────────────────
    pub alpaca_api_key:     String,
    pub alpaca_secret_key:  String,
    pub alpaca_trading_url: String,
    pub alpaca_data_url:    String,
    /// Market data feed ("iex" works on free accounts, "sip" needs a plan)
    pub alpaca_feed:        String,

    // ── Chat completion ──────────────────────────────────────────────
    pub openai_api_key:     String,
    pub openai_url:         String,
    pub openai_model:       String,
    pub openai_temperature: f64,

    // ── News feed / options chains ───────────────────────────────────
    pub alpha_vantage_api_key: String,
    pub alpha_vantage_url:     String,
    pub polygon_api_key:       String,
    pub polygon_url:           String,

    // ── Screener (first-signal detector) ─────────────────────────────
    pub sma_short:        usize,
    pub sma_long:         usize,
    pub rsi_period:       usize,
    pub rsi_buy_floor:    f64,
    pub rsi_sell_ceiling: f64,
    pub lookback_days:    i64,
    pub timeframe:        Timeframe,

    // ── RSI trade simulator ──────────────────────────────────────────
    pub rsi_entry_lower: f64,
    pub rsi_entry_upper: f64,
    pub rsi_exit:        f64,
    /// Stop-loss as a fraction of entry price (0.10 = 10%)
    pub stop_loss:       f64,
    /// Profit target as a fraction of entry price (0.30 = 30%)
    pub profit_target:   f64,
    pub trade_qty:       f64,

    // ── Chat tools ───────────────────────────────────────────────────
    pub sip_monthly: f64,
    pub sip_years:   i64,
    pub plot_dir:    PathBuf,
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenvy).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // ignore missing .env

        let timeframe = match env::var("TIMEFRAME") {
            Ok(v) => v.parse::<Timeframe>()
                .map_err(|e| EngineError::Config(format!("TIMEFRAME: {e}")))?,
            Err(_) => Timeframe::Day1,
        };

        Ok(Self {
            alpaca_api_key:     env::var("ALPACA_API_KEY").unwrap_or_default(),
            alpaca_secret_key:  env::var("ALPACA_SECRET_KEY").unwrap_or_default(),
            alpaca_trading_url: env::var("ALPACA_TRADING_URL")
                .unwrap_or_else(|_| DEFAULT_TRADING_URL.into()),
            alpaca_data_url:    env::var("ALPACA_DATA_URL")
                .unwrap_or_else(|_| DEFAULT_DATA_URL.into()),
            alpaca_feed:        env::var("ALPACA_FEED").unwrap_or_else(|_| "iex".into()),

            openai_api_key:     env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_url:         env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_URL.into()),
            openai_model:       env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.into()),
            openai_temperature: parse_env("OPENAI_TEMPERATURE", 0.6)?,

            alpha_vantage_api_key: env::var("ALPHA_VANTAGE_API_KEY").unwrap_or_default(),
            alpha_vantage_url:     env::var("ALPHA_VANTAGE_URL")
                .unwrap_or_else(|_| DEFAULT_ALPHA_VANTAGE_URL.into()),
            polygon_api_key:       env::var("POLYGON_API_KEY").unwrap_or_default(),
            polygon_url:           env::var("POLYGON_URL")
                .unwrap_or_else(|_| DEFAULT_POLYGON_URL.into()),

            sma_short:        parse_env("SMA_SHORT",        8usize)?,
            sma_long:         parse_env("SMA_LONG",         21usize)?,
            rsi_period:       parse_env("RSI_PERIOD",       14usize)?,
            rsi_buy_floor:    parse_env("RSI_BUY_FLOOR",    30.0)?,
            rsi_sell_ceiling: parse_env("RSI_SELL_CEILING", 70.0)?,
            lookback_days:    parse_env("LOOKBACK_DAYS",    90i64)?,
            timeframe,

            rsi_entry_lower: parse_env("RSI_ENTRY_LOWER", 40.0)?,
            rsi_entry_upper: parse_env("RSI_ENTRY_UPPER", 50.0)?,
            rsi_exit:        parse_env("RSI_EXIT",        70.0)?,
            stop_loss:       parse_env("STOP_LOSS",       0.10)?,
            profit_target:   parse_env("PROFIT_TARGET",   0.30)?,
            trade_qty:       parse_env("TRADE_QTY",       100.0)?,

            sip_monthly: parse_env("SIP_MONTHLY", 1000.0)?,
            sip_years:   parse_env("SIP_YEARS",   10i64)?,
            plot_dir:    PathBuf::from(env::var("PLOT_DIR").unwrap_or_else(|_| ".".into())),
        })
    }

    pub fn screener_params(&self) -> ScreenerParams {
        ScreenerParams {
            short_window:     self.sma_short,
            long_window:      self.sma_long,
            rsi_period:       self.rsi_period,
            rsi_buy_floor:    self.rsi_buy_floor,
            rsi_sell_ceiling: self.rsi_sell_ceiling,
        }
    }

    pub fn strategy_params(&self) -> RsiStrategyParams {
        RsiStrategyParams {
            rsi_period:    self.rsi_period,
            entry_lower:   self.rsi_entry_lower,
            entry_upper:   self.rsi_entry_upper,
            exit_rsi:      self.rsi_exit,
            stop_loss:     self.stop_loss,
            profit_target: self.profit_target,
            quantity:      self.trade_qty,
        }
    }

    pub fn has_alpaca_credentials(&self) -> bool {
        !self.alpaca_api_key.is_empty() && !self.alpaca_secret_key.is_empty()
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| EngineError::Config(format!("Config key {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
