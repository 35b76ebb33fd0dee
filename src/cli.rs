//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::adapters::csv_adapter::{load_sentiment_file, CsvPriceSource};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::result_store_adapter::JsonFileResultStore;
use crate::adapters::sentiment_cache_adapter::FileSentimentCache;
use crate::domain::backtest::BacktestResult;
use crate::domain::config_validation::{
    data_dir, load_backtest_settings, load_results_settings, load_sentiment_settings,
    load_strategy_config, parse_strategy, validate_config,
};
use crate::domain::error::{FailureReport, SentimentError, SentiquantError};
use crate::ports::config_port::ConfigPort;
use crate::ports::result_store_port::ResultStore;
use crate::ports::sentiment_cache_port::SentimentCache;
use crate::service::{BacktestRequest, BacktestService};

#[derive(Parser, Debug)]
#[command(name = "sentiquant", about = "Sentiment-aware strategy backtester")]
pub struct Cli {
    /// Debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest(BacktestArgs),
    /// Show the most recent stored results
    Results {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct BacktestArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// sentiment, macd, technical or combined
    #[arg(short, long)]
    pub strategy: Option<String>,
    #[arg(long)]
    pub symbol: Option<String>,
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
    /// Sentiment series CSV; bypasses the cache and news source
    #[arg(long)]
    pub sentiment: Option<PathBuf>,
    /// Write the JSON result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);
    match cli.command {
        Command::Backtest(args) => run_backtest(&args),
        Command::Results { config, limit } => run_results(&config, limit),
        Command::Validate { config } => run_validate(&config),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    // Already installed when the CLI is driven in-process more than once.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_backtest(args: &BacktestArgs) -> ExitCode {
    eprintln!("Loading config from {}", args.config.display());
    let outcome = FileConfigAdapter::from_file(&args.config)
        .and_then(|adapter| execute_backtest(&adapter, args));

    match outcome {
        Ok(result) => {
            print_summary(&result);
            match write_json(&result, args.output.as_deref()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    (&e).into()
                }
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            let report = FailureReport::from_error(&err, args.strategy.as_deref());
            if let Err(e) = write_json(&report, args.output.as_deref()) {
                eprintln!("error: {e}");
            }
            (&err).into()
        }
    }
}

/// Resolve settings from `config` plus command-line overrides, wire the
/// file-backed adapters and run one backtest.
pub fn execute_backtest(
    config: &dyn ConfigPort,
    args: &BacktestArgs,
) -> Result<BacktestResult, SentiquantError> {
    let mut settings = load_backtest_settings(config)?;
    if let Some(symbol) = &args.symbol {
        settings.backtest.symbol = symbol.trim().to_string();
    }
    if let Some(strategy) = &args.strategy {
        settings.strategy = strategy.trim().to_string();
    }
    if args.start_date.is_some() {
        settings.start_date = args.start_date;
    }
    if args.end_date.is_some() {
        settings.end_date = args.end_date;
    }
    if let (Some(start), Some(end)) = (settings.start_date, settings.end_date)
        && start > end
    {
        return Err(SentiquantError::ConfigInvalid {
            section: "backtest".into(),
            key: "start_date".into(),
            reason: "start_date must not be after end_date".into(),
        });
    }

    let kind = parse_strategy(&settings.strategy)?;
    let strategy_config = load_strategy_config(config, kind)?;
    let sentiment_settings = load_sentiment_settings(config)?;

    let explicit = match &args.sentiment {
        Some(path) => Some(load_sentiment_file(path).map_err(|e| match e {
            SentimentError::File { path, reason } => SentiquantError::SentimentFile { path, reason },
            other => SentiquantError::SentimentFile {
                path: path.display().to_string(),
                reason: other.to_string(),
            },
        })?),
        None => None,
    };

    eprintln!(
        "Running {} on {} ({})",
        settings.strategy, settings.backtest.symbol, settings.timeframe
    );

    let prices = CsvPriceSource::new(data_dir(config));
    let cache = sentiment_settings.cache_dir.clone().map(FileSentimentCache::new);
    let store = JsonFileResultStore::from_config(config)?;

    let mut service = BacktestService::new(&prices).with_sentiment_settings(sentiment_settings);
    if let Some(cache) = &cache {
        service = service.with_cache(cache as &dyn SentimentCache);
    }
    if let Some(store) = &store {
        service = service.with_store(store as &dyn ResultStore);
    }

    let request = BacktestRequest {
        settings,
        strategy_config,
        sentiment: explicit,
    };
    service.run(&request)
}

pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), SentiquantError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SentiquantError::Io(std::io::Error::other(e)))?;
    match output {
        Some(path) => {
            fs::write(path, format!("{json}\n"))?;
            eprintln!("Result written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn print_summary(result: &BacktestResult) {
    eprintln!("\n=== {} on {} ===", result.strategy, result.symbol);
    eprintln!(
        "Bars:             {} ({} sentiment points)",
        result.bars_used, result.sentiment_points
    );
    eprintln!("Initial Capital:  {:.2}", result.initial_capital);
    eprintln!("Final Value:      {:.2}", result.final_value);
    eprintln!("Total Return:     {:.2}%", result.total_return_pct);
    eprintln!("Sharpe Ratio:     {:.2}", result.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", result.max_drawdown_pct);
    eprintln!(
        "Total Trades:     {} ({} won, {} lost)",
        result.total_trades, result.winning_trades, result.losing_trades
    );
    eprintln!("Win Rate:         {:.1}%", result.win_rate);
    match result.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {pf:.2}"),
        None => eprintln!("Profit Factor:    n/a"),
    }
}

fn run_results(config_path: &Path, limit: usize) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match recent_results(&adapter, limit) {
        Ok(results) => {
            if results.is_empty() {
                eprintln!("No stored results");
            }
            for r in &results {
                let when = r
                    .completed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                eprintln!(
                    "  {}  {:<10} {:<12} {:>8.2}%  {} trades",
                    when, r.strategy, r.symbol, r.total_return_pct, r.total_trades
                );
            }
            match write_json(&results, None) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    (&e).into()
                }
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Up to `limit` stored results, oldest first. Requires `[results] path`.
pub fn recent_results(
    config: &dyn ConfigPort,
    limit: usize,
) -> Result<Vec<BacktestResult>, SentiquantError> {
    let settings = load_results_settings(config)?;
    let path = settings.path.ok_or_else(|| SentiquantError::ConfigMissing {
        section: "results".into(),
        key: "path".into(),
    })?;
    JsonFileResultStore::new(path, settings.capacity).get_recent(limit)
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match validate_config(&adapter) {
        Ok(()) => {
            eprintln!("Config validated successfully");
            eprintln!("  sections: {}", adapter.sections().join(", "));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
