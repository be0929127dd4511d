/// lib.rs — stockbot command-line support
///
/// Parquet storage and report rendering for the `stockbot` binary.  All
/// computation lives in `stockbot_engine`.

pub mod reporting;
pub mod store;

use std::path::Path;

use anyhow::{Context, Result};
use stockbot_engine::config::AppConfig;
use stockbot_engine::data::{AlpacaDataClient, MarketData};

/// Local parquet files when a data directory is given, otherwise Alpaca.
pub fn open_source(cfg: &AppConfig, data_dir: Option<&Path>, symbols: &[String]) -> Result<Box<dyn MarketData>> {
    match data_dir {
        Some(dir) => Ok(Box::new(store::load_store(dir, symbols)?)),
        None => {
            let client = AlpacaDataClient::from_config(cfg).context("Alpaca market data client")?;
            Ok(Box::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_data_dir_gives_empty_local_source() {
        let cfg = AppConfig::from_env().unwrap();
        let dir = std::env::temp_dir().join("stockbot_empty_data_dir");
        assert!(open_source(&cfg, Some(&dir), &["AAPL".to_string()]).is_ok());
    }
}
