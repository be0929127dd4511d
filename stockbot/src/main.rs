/// main.rs — stockbot command-line entry point
///
/// Usage:
///   stockbot screen --symbols AAPL,MSFT
///   stockbot backtest --symbol NVDA --days 730 --csv ./reports
///   stockbot sip --symbol TQQQ --monthly 1000 --years 10
///   stockbot indicators --symbol AAPL --window 20
///   stockbot chat
///   stockbot paper-trade --symbol NVDA
///   stockbot fetch --symbols AAPL,MSFT --days 365
///   stockbot news --symbol TSLA
///   stockbot options add AAPL,TSLA
///   stockbot options chain
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stockbot::reporting::{self, ReportMetadata};
use stockbot::{open_source, store};
use stockbot_engine::backtest::simulate;
use stockbot_engine::broker::AlpacaBroker;
use stockbot_engine::chat::{ChatSession, OpenAiChatClient};
use stockbot_engine::news::{latest_news, AlphaVantageNews};
use stockbot_engine::options::{watchlist_chains, PolygonOptionsClient, Watchlist};
use stockbot_engine::config::AppConfig;
use stockbot_engine::data::{years_in_days, AlpacaDataClient, BarRequest, MarketData};
use stockbot_engine::paper::execute_paper_trade;
use stockbot_engine::screener::{screen, Universe};
use stockbot_engine::sip::sip_returns;
use stockbot_engine::tools::ToolRegistry;
use stockbot_engine::Timeframe;

#[derive(Parser)]
#[command(name = "stockbot")]
#[command(about = "Stock screener, RSI backtester, SIP calculator and chat assistant")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan symbols for the first SMA/RSI reversal signal
    Screen {
        /// Comma-separated symbols (default: built-in watch list)
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Calendar days of history (default: LOOKBACK_DAYS)
        #[arg(short, long)]
        lookback_days: Option<i64>,

        /// Bar interval, e.g. "1 Day", 1h, 15Min (default: TIMEFRAME)
        #[arg(short, long)]
        timeframe: Option<String>,

        /// Read parquet bars from this directory instead of Alpaca
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Print hits as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay the RSI strategy over one symbol
    Backtest {
        #[arg(short, long)]
        symbol: String,

        #[arg(short, long, default_value = "730")]
        days: i64,

        #[arg(short, long)]
        timeframe: Option<String>,

        /// Shares per trade (default: TRADE_QTY)
        #[arg(short, long)]
        qty: Option<f64>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Write the report as JSON into this directory
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the trade log as CSV into this directory
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Monthly systematic investment plan returns
    Sip {
        #[arg(short, long)]
        symbol: String,

        /// Amount invested each month (default: SIP_MONTHLY)
        #[arg(short, long)]
        monthly: Option<f64>,

        /// Years of history (default: SIP_YEARS)
        #[arg(short, long)]
        years: Option<i64>,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Latest SMA/EMA/RSI/MACD/Bollinger values
    Indicators {
        #[arg(short, long)]
        symbol: String,

        #[arg(short, long, default_value = "20")]
        window: usize,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Interactive assistant (/reset clears the conversation, /quit exits)
    Chat,

    /// Evaluate the RSI strategy on the latest bar and place paper orders
    PaperTrade {
        #[arg(short, long)]
        symbol: String,

        #[arg(short, long)]
        timeframe: Option<String>,

        #[arg(short, long)]
        qty: Option<f64>,
    },

    /// Download bars from Alpaca into parquet files
    Fetch {
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        #[arg(short, long, default_value = "365")]
        days: i64,

        #[arg(short, long)]
        timeframe: Option<String>,

        #[arg(short, long, default_value = "data")]
        out: PathBuf,
    },

    /// Latest news headlines for a ticker (Alpha Vantage)
    News {
        #[arg(short, long)]
        symbol: String,

        #[arg(long)]
        json: bool,
    },

    /// Options watchlist and contract chains (Polygon)
    Options {
        /// Watchlist file
        #[arg(short, long, default_value = "watchlist.json")]
        watchlist: PathBuf,

        #[command(subcommand)]
        action: OptionsAction,
    },
}

#[derive(Subcommand)]
pub enum OptionsAction {
    /// Add tickers to the watchlist
    Add {
        #[arg(value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
    /// Remove tickers from the watchlist
    Remove {
        #[arg(value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
    /// Show the watchlist
    List,
    /// Fetch the contract chain of every watched ticker
    Chain,
}

pub struct StockbotApp {
    cli: Cli,
    cfg: AppConfig,
}

impl StockbotApp {
    pub fn new(cli: Cli, cfg: AppConfig) -> Self {
        Self { cli, cfg }
    }

    fn timeframe(&self, arg: &Option<String>) -> Result<Timeframe> {
        match arg {
            Some(s) => Ok(s.parse::<Timeframe>()?),
            None => Ok(self.cfg.timeframe),
        }
    }

    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Screen { symbols, lookback_days, timeframe, data_dir, json } => {
                let universe = if symbols.is_empty() {
                    Universe::WatchList
                } else {
                    Universe::Custom(symbols.clone())
                };
                let symbols = universe.symbols();
                let tf = self.timeframe(timeframe)?;
                let days = lookback_days.unwrap_or(self.cfg.lookback_days);
                let source = open_source(&self.cfg, data_dir.as_deref(), &symbols)?;

                let today = Utc::now().date_naive();
                let outcome = screen(&*source, &symbols, days, tf, today, &self.cfg.screener_params()).await;
                if *json {
                    println!("{}", serde_json::to_string_pretty(&outcome.hits)?);
                } else {
                    reporting::print_screen(&outcome);
                }
            }

            Commands::Backtest { symbol, days, timeframe, qty, data_dir, json, csv } => {
                let symbol = symbol.to_uppercase();
                let tf = self.timeframe(timeframe)?;
                let mut params = self.cfg.strategy_params();
                if let Some(q) = qty {
                    params.quantity = *q;
                }
                let source = open_source(&self.cfg, data_dir.as_deref(), std::slice::from_ref(&symbol))?;
                let req = BarRequest::lookback(&symbol, *days, tf, Utc::now().date_naive())?;
                let bars = source.bars(&req).await?;

                let report = simulate(&bars, &params)?;
                reporting::print_trade_log(&report);

                let meta = ReportMetadata::for_bars("RSI", &symbol, tf, &bars);
                if let Some(dir) = json {
                    reporting::export_json(dir, &meta, &report)?;
                }
                if let Some(dir) = csv {
                    reporting::export_trades_csv(dir, &symbol, &report)?;
                }
            }

            Commands::Sip { symbol, monthly, years, data_dir } => {
                let symbol = symbol.to_uppercase();
                let monthly = monthly.unwrap_or(self.cfg.sip_monthly);
                let years = years.unwrap_or(self.cfg.sip_years).max(1);
                let source = open_source(&self.cfg, data_dir.as_deref(), std::slice::from_ref(&symbol))?;
                let req = BarRequest::lookback(&symbol, years_in_days(years)?, Timeframe::Day1, Utc::now().date_naive())?;
                let bars = source.bars(&req).await?;

                let latest = bars.last().map(|b| b.close);
                let report = sip_returns(&bars, monthly, latest)?;
                reporting::print_sip(&symbol, &report);
            }

            Commands::Indicators { symbol, window, data_dir } => {
                let symbol = symbol.to_uppercase();
                let source = open_source(&self.cfg, data_dir.as_deref(), std::slice::from_ref(&symbol))?;
                let req = BarRequest::lookback(&symbol, 365, Timeframe::Day1, Utc::now().date_naive())?;
                let bars = source.bars(&req).await?;
                reporting::print_indicators(&symbol, &bars, *window);
            }

            Commands::Chat => self.chat().await?,

            Commands::PaperTrade { symbol, timeframe, qty } => {
                let tf = self.timeframe(timeframe)?;
                let mut params = self.cfg.strategy_params();
                if let Some(q) = qty {
                    params.quantity = *q;
                }
                let broker = AlpacaBroker::from_config(&self.cfg)?;
                let data = AlpacaDataClient::from_config(&self.cfg)?;
                let as_of = Utc::now().date_naive() - Duration::days(1);

                let outcome = execute_paper_trade(&broker, &data, symbol, tf, as_of, &params).await;
                println!("{}", outcome.message);
            }

            Commands::Fetch { symbols, days, timeframe, out } => {
                let tf = self.timeframe(timeframe)?;
                let client = AlpacaDataClient::from_config(&self.cfg)?;
                let today = Utc::now().date_naive();

                for symbol in Universe::Custom(symbols.clone()).symbols() {
                    info!("--- Processing {} ---", symbol);
                    let req = BarRequest::lookback(&symbol, *days, tf, today)?;
                    match client.bars(&req).await {
                        Ok(bars) => {
                            let path = store::save_bars(out, &symbol, tf, &bars)?;
                            println!("{:<8} {:>6} bars → {}", symbol, bars.len(), path.display());
                        }
                        Err(e) => warn!("{}: {}", symbol, e),
                    }
                }
            }

            Commands::News { symbol, json } => {
                let feed = AlphaVantageNews::from_config(&self.cfg)?;
                let articles = latest_news(&feed, symbol).await?;
                if *json {
                    println!("{}", serde_json::to_string_pretty(&articles)?);
                } else {
                    reporting::print_news(&symbol.to_uppercase(), &articles);
                }
            }

            Commands::Options { watchlist: path, action } => {
                let mut watchlist = Watchlist::load(path)?;
                match action {
                    OptionsAction::Add { symbols } => {
                        for s in symbols {
                            watchlist.add(s);
                        }
                        watchlist.save(path)?;
                        reporting::print_watchlist(&watchlist);
                    }
                    OptionsAction::Remove { symbols } => {
                        for s in symbols {
                            if !watchlist.remove(s) {
                                warn!("{} is not on the watchlist", s.to_uppercase());
                            }
                        }
                        watchlist.save(path)?;
                        reporting::print_watchlist(&watchlist);
                    }
                    OptionsAction::List => reporting::print_watchlist(&watchlist),
                    OptionsAction::Chain => {
                        if watchlist.is_empty() {
                            reporting::print_watchlist(&watchlist);
                        } else {
                            let client = PolygonOptionsClient::from_config(&self.cfg)?;
                            for (symbol, chain) in watchlist_chains(&client, &watchlist).await {
                                reporting::print_chain(&symbol, &chain);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn chat(&self) -> Result<()> {
        let llm = OpenAiChatClient::from_config(&self.cfg)?;
        let data = AlpacaDataClient::from_config(&self.cfg)?;
        let tools = ToolRegistry::new(data, &self.cfg);
        let mut session = ChatSession::default();

        println!("Ask me anything about stocks. /reset clears the conversation, /quit exits.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("you> ");
            use std::io::Write;
            std::io::stdout().flush().ok();

            let Some(line) = lines.next_line().await.context("reading stdin")? else {
                break;
            };
            match line.trim() {
                "" => continue,
                "/quit" | "/exit" => break,
                "/reset" => {
                    session.reset();
                    println!("(conversation cleared)");
                }
                prompt => {
                    let answer = session.respond(&llm, &tools, prompt).await;
                    println!("bot> {}", answer);
                }
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env().map_err(|e| anyhow!("configuration: {}", e))?;

    let app = StockbotApp::new(cli, cfg);
    if let Err(e) = app.run().await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_symbols_split_on_commas() {
        let cli = Cli::try_parse_from(["stockbot", "screen", "--symbols", "AAPL,msft", "--json"]).unwrap();
        if let Commands::Screen { symbols, json, data_dir, .. } = cli.command {
            assert_eq!(symbols, vec!["AAPL".to_string(), "msft".to_string()]);
            assert!(json);
            assert!(data_dir.is_none());
        } else {
            panic!("expected screen");
        }
    }

    #[test]
    fn backtest_defaults() {
        let cli = Cli::try_parse_from(["stockbot", "backtest", "--symbol", "NVDA"]).unwrap();
        if let Commands::Backtest { symbol, days, qty, csv, .. } = cli.command {
            assert_eq!(symbol, "NVDA");
            assert_eq!(days, 730);
            assert!(qty.is_none());
            assert!(csv.is_none());
        } else {
            panic!("expected backtest");
        }
    }

    #[test]
    fn options_actions_parse() {
        let cli = Cli::try_parse_from(["stockbot", "options", "add", "aapl,tsla"]).unwrap();
        match cli.command {
            Commands::Options { watchlist, action: OptionsAction::Add { symbols } } => {
                assert_eq!(watchlist, PathBuf::from("watchlist.json"));
                assert_eq!(symbols, vec!["aapl".to_string(), "tsla".to_string()]);
            }
            _ => panic!("expected options add"),
        }
        let cli = Cli::try_parse_from(["stockbot", "options", "--watchlist", "w.json", "chain"]).unwrap();
        assert!(matches!(cli.command, Commands::Options { action: OptionsAction::Chain, .. }));
        assert!(Cli::try_parse_from(["stockbot", "options", "remove"]).is_err());
        assert!(Cli::try_parse_from(["stockbot", "news", "--symbol", "TSLA", "--json"]).is_ok());
    }

    #[test]
    fn fetch_requires_symbols() {
        assert!(Cli::try_parse_from(["stockbot", "fetch"]).is_err());
        assert!(Cli::try_parse_from(["stockbot", "paper-trade", "--symbol", "NVDA"]).is_ok());
    }
}
