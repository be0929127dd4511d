/// store.rs — Local parquet bar store
///
/// Layout: <root>/<SYMBOL>/<SYMBOL>_<timeframe>_<YYYYmmdd_HHMMSS>.parquet
/// Columns: timestamp (text), open, high, low, close, volume, open_time (ms)
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use glob::glob;
use polars::prelude::*;
use tracing::{info, warn};

use stockbot_engine::data::StaticMarketData;
use stockbot_engine::{Bar, Timeframe};

pub fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame> {
    let timestamps: Vec<String> = bars
        .iter()
        .map(|b| b.time.format("%Y-%m-%d %H:%M:%S").to_string())
        .collect();
    let open_times: Vec<i64> = bars.iter().map(|b| b.time.timestamp_millis()).collect();

    let df = df!(
        "timestamp" => timestamps,
        "open" => bars.iter().map(|b| b.open).collect::<Vec<_>>(),
        "high" => bars.iter().map(|b| b.high).collect::<Vec<_>>(),
        "low" => bars.iter().map(|b| b.low).collect::<Vec<_>>(),
        "close" => bars.iter().map(|b| b.close).collect::<Vec<_>>(),
        "volume" => bars.iter().map(|b| b.volume).collect::<Vec<_>>(),
        "open_time" => open_times
    )?;
    Ok(df)
}

pub fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>> {
    let open_times = df.column("open_time")?.i64()?;
    let opens = df.column("open")?.f64()?;
    let highs = df.column("high")?.f64()?;
    let lows = df.column("low")?.f64()?;
    let closes = df.column("close")?.f64()?;
    let volumes = df.column("volume")?.f64()?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(ts_ms), Some(close)) = (open_times.get(i), closes.get(i)) else {
            continue;
        };
        let time = DateTime::<Utc>::from_timestamp_millis(ts_ms)
            .ok_or_else(|| anyhow!("open_time {} out of range", ts_ms))?;
        bars.push(Bar {
            time,
            open: opens.get(i).unwrap_or(close),
            high: highs.get(i).unwrap_or(close),
            low: lows.get(i).unwrap_or(close),
            close,
            volume: volumes.get(i).unwrap_or(0.0),
        });
    }
    bars.sort_by_key(|b| b.time);
    Ok(bars)
}

/// Write one fetch to a new timestamped file; returns its path.
pub fn save_bars(root: &Path, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Result<PathBuf> {
    let dir_path = root.join(symbol);
    fs::create_dir_all(&dir_path)?;

    let mut df = bars_to_dataframe(bars)?;
    let file_name = format!(
        "{}_{}_{}.parquet",
        symbol,
        timeframe.as_alpaca(),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let file_path = dir_path.join(file_name);

    let mut file = fs::File::create(&file_path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;
    info!("Saved {} rows to {}", df.height(), file_path.display());
    Ok(file_path)
}

pub fn load_parquet(path: &Path) -> Result<Vec<Bar>> {
    let df = LazyFrame::scan_parquet(path, Default::default())?
        .collect()
        .with_context(|| format!("reading {}", path.display()))?;
    dataframe_to_bars(&df)
}

/// Lexically last parquet file for the symbol (newest for a single timeframe).
pub fn latest_file(root: &Path, symbol: &str) -> Result<Option<PathBuf>> {
    let pattern = format!("{}/{}/*.parquet", root.display(), symbol);
    let mut files: Vec<PathBuf> = glob(&pattern)?.filter_map(|r| r.ok()).collect();
    files.sort();
    Ok(files.pop())
}

/// Load the newest file of each symbol.  Symbols without data are skipped.
pub fn load_store(root: &Path, symbols: &[String]) -> Result<StaticMarketData> {
    let mut store = StaticMarketData::new();
    for symbol in symbols {
        match latest_file(root, symbol)? {
            Some(path) => {
                let bars = load_parquet(&path)?;
                info!("Loaded {} bars for {} from {}", bars.len(), symbol, path.display());
                store.insert(symbol, bars);
            }
            None => warn!("No parquet data for {} under {}", symbol, root.display()),
        }
    }
    Ok(store)
}
