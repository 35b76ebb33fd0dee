//! CLI integration tests for the backtest command orchestration.
//!
//! Tests cover:
//! - Config resolution with command-line overrides
//! - Full pipeline against CSV bars and INI files on disk
//! - Explicit sentiment files and the on-disk sentiment cache
//! - Result persistence and the results listing
//! - Error classification and exit codes

mod common;

use approx::assert_relative_eq;
use common::*;
use sentiquant::adapters::csv_adapter::write_sentiment_csv;
use sentiquant::adapters::file_config_adapter::FileConfigAdapter;
use sentiquant::adapters::sentiment_cache_adapter::FileSentimentCache;
use sentiquant::cli::{self, BacktestArgs};
use sentiquant::domain::backtest::BacktestResult;
use sentiquant::domain::config_validation::validate_config;
use sentiquant::domain::error::{FailureReport, SentiquantError};
use sentiquant::domain::sentiment_series::BucketWidth;
use sentiquant::ports::sentiment_cache_port::{CacheKey, SentimentCache};
use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_bars(dir: &Path, file_name: &str, bars: &[Bar]) {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    fs::write(dir.join(file_name), out).unwrap();
}

fn assert_same_result(a: &BacktestResult, b: &BacktestResult) {
    assert_eq!(a.strategy, b.strategy);
    assert_eq!(a.symbol, b.symbol);
    assert_eq!(a.total_trades, b.total_trades);
    assert_eq!(a.bars_used, b.bars_used);
    assert_eq!(a.completed_at, b.completed_at);
    assert_relative_eq!(a.final_value, b.final_value, max_relative = 1e-12);
    assert_relative_eq!(a.total_return_pct, b.total_return_pct, max_relative = 1e-12);
}

/// A workspace with `data/BTC-USDT_1d.csv` holding the V-shaped series.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        write_bars(&dir.path().join("data"), "BTC-USDT_1d.csv", &bars_from(&v_shaped_prices()));
        Workspace { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn config(&self, extra: &str) -> FileConfigAdapter {
        let ini = format!(
            "[backtest]\nsymbol = BTC/USDT\nstrategy = macd\n\n[data]\ndir = {}\n\n[results]\npath = {}\n\n{}",
            self.path("data").display(),
            self.path("results.json").display(),
            extra
        );
        FileConfigAdapter::from_string(&ini).unwrap()
    }

    fn args(&self) -> BacktestArgs {
        BacktestArgs {
            config: self.path("sentiquant.ini"),
            ..BacktestArgs::default()
        }
    }
}

mod backtest_pipeline {
    use super::*;

    #[test]
    fn runs_from_csv_and_stores_result() {
        let ws = Workspace::new();
        let config = ws.config("");

        let result = cli::execute_backtest(&config, &ws.args()).unwrap();

        assert_eq!(result.strategy, "macd");
        assert_eq!(result.symbol, "BTC/USDT");
        assert_eq!(result.bars_used, 60);
        assert_eq!(result.timeframe.as_deref(), Some("1d"));
        assert!(result.total_return_pct > 0.0);

        let stored = cli::recent_results(&config, 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_same_result(&stored[0], &result);
    }

    #[test]
    fn strategy_and_symbol_overrides_win() {
        let ws = Workspace::new();
        write_bars(&ws.path("data"), "ETH-USDT_1d.csv", &constant_bars(70, 50.0));
        let config = ws.config("");

        let args = BacktestArgs {
            strategy: Some("technical".into()),
            symbol: Some("ETH/USDT".into()),
            ..ws.args()
        };
        let result = cli::execute_backtest(&config, &args).unwrap();
        assert_eq!(result.strategy, "technical");
        assert_eq!(result.symbol, "ETH/USDT");
        assert_eq!(result.total_trades, 0);
    }

    #[test]
    fn date_overrides_narrow_the_bars() {
        let ws = Workspace::new();
        write_bars(&ws.path("data"), "ETH-USDT_1d.csv", &constant_bars(100, 50.0));
        let config = ws.config("");

        let args = BacktestArgs {
            symbol: Some("ETH/USDT".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 21),
            ..ws.args()
        };
        let result = cli::execute_backtest(&config, &args).unwrap();
        assert_eq!(result.bars_used, 80);
        assert_eq!(result.start_date, NaiveDate::from_ymd_opt(2024, 1, 21));
        assert_eq!(result.end_date, None);
    }

    #[test]
    fn reversed_date_overrides_are_rejected() {
        let ws = Workspace::new();
        let config = ws.config("");
        let args = BacktestArgs {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..ws.args()
        };
        let err = cli::execute_backtest(&config, &args).unwrap_err();
        assert!(matches!(err, SentiquantError::ConfigInvalid { ref key, .. } if key == "start_date"));
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
    }

    #[test]
    fn short_history_is_insufficient_data() {
        let ws = Workspace::new();
        write_bars(&ws.path("data"), "SOL-USDT_1d.csv", &constant_bars(50, 20.0));
        let config = ws.config("");
        let args = BacktestArgs {
            symbol: Some("SOL/USDT".into()),
            ..ws.args()
        };

        let err = cli::execute_backtest(&config, &args).unwrap_err();
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));

        let report = FailureReport::from_error(&err, Some("macd"));
        assert!(!report.success);
        assert_eq!(report.required_bars, Some(60));
        assert_eq!(report.available_bars, Some(50));
        assert_eq!(report.symbol.as_deref(), Some("SOL/USDT"));
        assert!(cli::recent_results(&config, 10).unwrap().is_empty());
    }

    #[test]
    fn missing_price_file_is_price_source_error() {
        let ws = Workspace::new();
        let config = ws.config("");
        let args = BacktestArgs {
            symbol: Some("DOGE/USDT".into()),
            ..ws.args()
        };
        let err = cli::execute_backtest(&config, &args).unwrap_err();
        assert!(matches!(err, SentiquantError::PriceSource { ref symbol, .. } if symbol == "DOGE/USDT"));
    }

    #[test]
    fn unknown_strategy_is_reported() {
        let ws = Workspace::new();
        let config = ws.config("");
        let args = BacktestArgs {
            strategy: Some("momentum".into()),
            ..ws.args()
        };
        let err = cli::execute_backtest(&config, &args).unwrap_err();
        assert!(matches!(err, SentiquantError::UnknownStrategy { .. }));
        assert_eq!(ExitCode::from(&err), ExitCode::from(4));
    }
}

mod sentiment_sources {
    use super::*;

    fn write_series(path: &Path, n: i64, score: f64) {
        let points: Vec<_> = (0..n)
            .map(|d| point(start_time() + chrono::TimeDelta::days(d), score))
            .collect();
        let file = fs::File::create(path).unwrap();
        write_sentiment_csv(file, &points).unwrap();
    }

    #[test]
    fn explicit_sentiment_file_is_used() {
        let ws = Workspace::new();
        write_series(&ws.path("scores.csv"), 10, 0.6);
        let config = ws.config("");
        let args = BacktestArgs {
            strategy: Some("combined".into()),
            sentiment: Some(ws.path("scores.csv")),
            ..ws.args()
        };
        let result = cli::execute_backtest(&config, &args).unwrap();
        assert_eq!(result.sentiment_points, 10);
    }

    #[test]
    fn missing_sentiment_file_is_rejected() {
        let ws = Workspace::new();
        let config = ws.config("");
        let args = BacktestArgs {
            strategy: Some("sentiment".into()),
            sentiment: Some(ws.path("nope.csv")),
            ..ws.args()
        };
        let err = cli::execute_backtest(&config, &args).unwrap_err();
        assert!(matches!(err, SentiquantError::SentimentFile { ref path, .. } if path.ends_with("nope.csv")));
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));
    }

    #[test]
    fn malformed_sentiment_file_keeps_row_detail() {
        let ws = Workspace::new();
        fs::write(ws.path("scores.csv"), "timestamp,sentiment_score\n2024-01-01,0.2\n2024-01-02,??\n").unwrap();
        let config = ws.config("");
        let args = BacktestArgs {
            strategy: Some("combined".into()),
            sentiment: Some(ws.path("scores.csv")),
            ..ws.args()
        };

        let err = cli::execute_backtest(&config, &args).unwrap_err();
        match &err {
            SentiquantError::SentimentFile { reason, .. } => assert!(reason.contains("row 2")),
            other => panic!("expected SentimentFile, got {other:?}"),
        }
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));
        assert!(cli::recent_results(&config, 10).unwrap().is_empty());
    }

    #[test]
    fn cached_series_is_loaded_by_base_symbol() {
        let ws = Workspace::new();
        let cache = FileSentimentCache::new(ws.path("cache"));
        let points: Vec<_> = (0..7)
            .map(|d| point(start_time() + chrono::TimeDelta::days(d), -0.3))
            .collect();
        cache.store(&CacheKey::new("BTC", BucketWidth::days(1)), &points).unwrap();

        let config = ws.config(&format!(
            "[sentiment]\ncache_dir = {}\n",
            ws.path("cache").display()
        ));
        let args = BacktestArgs {
            strategy: Some("sentiment".into()),
            ..ws.args()
        };
        let result = cli::execute_backtest(&config, &args).unwrap();
        assert_eq!(result.sentiment_points, 7);
    }

    #[test]
    fn cache_miss_runs_neutral() {
        let ws = Workspace::new();
        let config = ws.config(&format!(
            "[sentiment]\ncache_dir = {}\n",
            ws.path("empty-cache").display()
        ));
        let args = BacktestArgs {
            strategy: Some("combined".into()),
            ..ws.args()
        };
        let result = cli::execute_backtest(&config, &args).unwrap();
        assert_eq!(result.sentiment_points, 0);
        assert!(result.success);
    }

    #[test]
    fn disabled_sentiment_ignores_cache() {
        let ws = Workspace::new();
        let cache = FileSentimentCache::new(ws.path("cache"));
        cache
            .store(
                &CacheKey::new("BTC", BucketWidth::days(1)),
                &[point(start_time(), 0.9)],
            )
            .unwrap();
        let config = ws.config(&format!(
            "[sentiment]\nenabled = false\ncache_dir = {}\n",
            ws.path("cache").display()
        ));
        let args = BacktestArgs {
            strategy: Some("sentiment".into()),
            ..ws.args()
        };
        assert_eq!(cli::execute_backtest(&config, &args).unwrap().sentiment_points, 0);
    }
}

mod results_and_output {
    use super::*;

    #[test]
    fn results_capacity_keeps_newest() {
        let ws = Workspace::new();
        let capped = FileConfigAdapter::from_string(&format!(
            "[backtest]\nsymbol = BTC/USDT\nstrategy = macd\n[data]\ndir = {}\n[results]\npath = {}\ncapacity = 2\n",
            ws.path("data").display(),
            ws.path("capped.json").display()
        ))
        .unwrap();

        for strategy in ["macd", "technical", "combined"] {
            let args = BacktestArgs {
                strategy: Some(strategy.into()),
                ..ws.args()
            };
            cli::execute_backtest(&capped, &args).unwrap();
        }

        let recent = cli::recent_results(&capped, 10).unwrap();
        let names: Vec<_> = recent.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(names, vec!["technical", "combined"]);
        assert!(!ws.path("results.json").exists());
    }

    #[test]
    fn results_without_path_is_config_missing() {
        let config = FileConfigAdapter::from_string("[backtest]\nsymbol = BTC/USDT\n").unwrap();
        let err = cli::recent_results(&config, 5).unwrap_err();
        assert!(matches!(
            err,
            SentiquantError::ConfigMissing { ref section, ref key } if section == "results" && key == "path"
        ));
    }

    #[test]
    fn json_output_round_trips_to_file() {
        let ws = Workspace::new();
        let config = ws.config("");
        let result = cli::execute_backtest(&config, &ws.args()).unwrap();

        let out = ws.path("out.json");
        cli::write_json(&result, Some(&out)).unwrap();
        let parsed: BacktestResult = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_same_result(&parsed, &result);
    }

    #[test]
    fn failure_report_serializes_flat() {
        let err = SentiquantError::InsufficientData {
            symbol: "BTC/USDT".into(),
            required: 60,
            available: 12,
        };
        let json = serde_json::to_value(FailureReport::from_error(&err, Some("combined"))).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["strategy"], "combined");
        assert_eq!(json["required_bars"], 60);
        assert_eq!(json["available_bars"], 12);
    }
}

mod config_files {
    use super::*;

    fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn valid_file_validates() {
        let file = write_temp_ini(
            "[backtest]\nsymbol = BTC/USDT\nstrategy = combined\nstart_date = 2024-01-01\nend_date = 2024-06-30\n\n[strategy]\nbuy_threshold = 0.5\n\n[sentiment]\nbucket = 1d\ntimeout_secs = 10\n",
        );
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert!(validate_config(&adapter).is_ok());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let cases = [
            "[backtest]\nsymbol = BTC/USDT\nstrategy = momentum\n",
            "[backtest]\nsymbol = BTC/USDT\ninitial_capital = -5\n",
            "[backtest]\nsymbol = BTC/USDT\n[strategy]\nsma_fast = 60\n",
            "[backtest]\nsymbol = BTC/USDT\n[sentiment]\nbatch_size = 0\n",
            "[strategy]\nrsi_period = 14\n",
        ];
        for ini in cases {
            let file = write_temp_ini(ini);
            let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
            assert!(validate_config(&adapter).is_err(), "{ini}");
        }
    }

    #[test]
    fn missing_file_maps_to_config_exit_code() {
        let err = FileConfigAdapter::from_file("/nonexistent/sentiquant.ini").err().unwrap();
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
    }
}
