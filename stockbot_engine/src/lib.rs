pub mod config;
pub mod error;
pub mod models;
pub mod indicators;
pub mod screener;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod sip;
pub mod data;
pub mod broker;
pub mod paper;
pub mod tools;
pub mod chat;
pub mod news;
pub mod options;

pub use error::{EngineError, Result};
pub use models::*;
