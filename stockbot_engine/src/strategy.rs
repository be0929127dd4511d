/// strategy.rs — RSI band entry with stop-loss / indicator / target exits
///
/// ENTRY (flat):  RSI_{t−1} ≤ entry_lower  AND  entry_lower < RSI_t < entry_upper
/// EXIT  (long), first satisfied wins:
///   1. close_t ≤ entry · (1 − stop_loss)       → StopLoss
///   2. RSI_t  >  exit_rsi                      → RsiExit
///   3. close_t ≥ entry · (1 + profit_target)   → ProfitTarget
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::indicators::{rsi, RsiMethod};
use crate::models::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiStrategyParams {
    pub rsi_period:    usize,
    pub entry_lower:   f64,
    pub entry_upper:   f64,
    pub exit_rsi:      f64,
    pub stop_loss:     f64,
    pub profit_target: f64,
    pub quantity:      f64,
}

impl Default for RsiStrategyParams {
    fn default() -> Self {
        Self {
            rsi_period:    14,
            entry_lower:   40.0,
            entry_upper:   50.0,
            exit_rsi:      70.0,
            stop_loss:     0.10,
            profit_target: 0.30,
            quantity:      1.0,
        }
    }
}

impl RsiStrategyParams {
    pub fn validate(&self) -> Result<()> {
        if self.rsi_period == 0 {
            return Err(EngineError::InvalidInput("rsi_period must be positive".into()));
        }
        if !(0.0..=100.0).contains(&self.entry_lower)
            || !(0.0..=100.0).contains(&self.entry_upper)
            || self.entry_lower >= self.entry_upper
        {
            return Err(EngineError::InvalidInput(format!(
                "entry band {}..{} is not a valid RSI range",
                self.entry_lower, self.entry_upper
            )));
        }
        if !(0.0..1.0).contains(&self.stop_loss) {
            return Err(EngineError::InvalidInput(format!(
                "stop_loss {} must be a fraction in [0, 1)", self.stop_loss
            )));
        }
        if self.profit_target < 0.0 {
            return Err(EngineError::InvalidInput("profit_target must be non-negative".into()));
        }
        if self.quantity <= 0.0 {
            return Err(EngineError::InvalidInput("quantity must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    RsiExit,
    ProfitTarget,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss     => "Stop Loss",
            ExitReason::RsiExit      => "RSI Exit",
            ExitReason::ProfitTarget => "Profit Target",
        };
        f.write_str(s)
    }
}

/// What to do on the latest bar, given the current position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Buy { price: f64, stop_price: f64, target_price: f64 },
    Sell { price: f64, reason: ExitReason },
    Hold,
}

#[derive(Debug, Clone)]
pub struct RsiStrategy {
    pub params: RsiStrategyParams,
}

impl RsiStrategy {
    pub fn new(params: RsiStrategyParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn stop_price(&self, entry: f64) -> f64 {
        entry * (1.0 - self.params.stop_loss)
    }

    pub fn target_price(&self, entry: f64) -> f64 {
        entry * (1.0 + self.params.profit_target)
    }

    /// RSI crossed up through the lower bound and is still inside the band.
    pub fn is_entry(&self, prev_rsi: Option<f64>, rsi: Option<f64>) -> bool {
        match (prev_rsi, rsi) {
            (Some(prev), Some(cur)) => {
                prev <= self.params.entry_lower
                    && cur > self.params.entry_lower
                    && cur < self.params.entry_upper
            }
            _ => false,
        }
    }

    /// Exit check for an open long.  RSI may be undefined; price exits still apply.
    pub fn exit_reason(&self, entry: f64, close: f64, rsi: Option<f64>) -> Option<ExitReason> {
        if close <= self.stop_price(entry) {
            return Some(ExitReason::StopLoss);
        }
        if rsi.is_some_and(|r| r > self.params.exit_rsi) {
            return Some(ExitReason::RsiExit);
        }
        if close >= self.target_price(entry) {
            return Some(ExitReason::ProfitTarget);
        }
        None
    }

    /// Decision for the last bar of `bars`.  `entry_price` is the average
    /// entry of the open long, if any.
    pub fn decide(&self, bars: &[Bar], entry_price: Option<f64>) -> Result<Decision> {
        let needed = self.params.rsi_period + 2;
        if bars.len() < needed {
            return Err(EngineError::InsufficientData { needed, got: bars.len() });
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let series = rsi(&closes, self.params.rsi_period, RsiMethod::Simple);
        let n = closes.len();
        let (prev, cur) = (series[n - 2], series[n - 1]);
        let price = closes[n - 1];

        let decision = match entry_price {
            Some(entry) => match self.exit_reason(entry, price, cur) {
                Some(reason) => Decision::Sell { price, reason },
                None => Decision::Hold,
            },
            None if self.is_entry(prev, cur) => Decision::Buy {
                price,
                stop_price: self.stop_price(price),
                target_price: self.target_price(price),
            },
            None => Decision::Hold,
        };
        debug!("RSI prev={:?} cur={:?} → {:?}", prev, cur, decision);
        Ok(decision)
    }
}
