//! Configuration loading and validation.
//!
//! Every section is read through [`ConfigPort`] and checked before a run
//! starts. A key that is present but unparseable is an error, never a
//! silent fallback to the default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

use crate::domain::alignment::FillPolicy;
use crate::domain::backtest::{BacktestConfig, MIN_DATA_POINTS};
use crate::domain::error::SentiquantError;
use crate::domain::sentiment_series::{BucketWidth, DEFAULT_BATCH_SIZE, DEFAULT_SENTIMENT_TIMEOUT};
use crate::domain::strategy::{ScoreTiers, StrategyConfig, StrategyKind};
use crate::ports::config_port::ConfigPort;
use crate::ports::result_store_port::DEFAULT_RESULT_CAPACITY;

pub const DEFAULT_TIMEFRAME: &str = "1d";
pub const DEFAULT_STRATEGY: &str = "sentiment";
pub const DEFAULT_DATA_DIR: &str = "data";

/// The `[backtest]` section, with the alignment knobs from `[sentiment]`
/// folded into the engine config. The strategy name is kept unparsed so a
/// command-line override can replace it.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub backtest: BacktestConfig,
    pub timeframe: String,
    pub strategy: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentSettings {
    pub enabled: bool,
    pub cache_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub batch_size: usize,
    /// `None` means infer from bar spacing.
    pub bucket: Option<BucketWidth>,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        SentimentSettings {
            enabled: true,
            cache_dir: None,
            timeout: DEFAULT_SENTIMENT_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            bucket: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSettings {
    pub path: Option<PathBuf>,
    pub capacity: usize,
}

/// Validate every section. The strategy section is checked against the
/// configured strategy's defaults.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SentiquantError> {
    let settings = load_backtest_settings(config)?;
    let kind = parse_strategy(&settings.strategy)?;
    load_strategy_config(config, kind)?;
    load_sentiment_settings(config)?;
    load_results_settings(config)?;
    Ok(())
}

pub fn load_backtest_settings(config: &dyn ConfigPort) -> Result<BacktestSettings, SentiquantError> {
    let symbol = required_string(config, "backtest", "symbol")?;
    let timeframe = string_or(config, "backtest", "timeframe", DEFAULT_TIMEFRAME);
    let strategy = string_or(config, "backtest", "strategy", DEFAULT_STRATEGY);

    let mut backtest = BacktestConfig::new(symbol);
    backtest.initial_capital = double(config, "backtest", "initial_capital", backtest.initial_capital)?;
    backtest.commission_rate = double(config, "backtest", "commission", backtest.commission_rate)?;
    backtest.min_bars = count(config, "backtest", "min_bars", MIN_DATA_POINTS)?;
    if backtest.min_bars == 0 {
        return Err(invalid("backtest", "min_bars", "must be at least 1"));
    }
    backtest.fill_policy = parsed(config, "sentiment", "fill_method", FillPolicy::default())?;
    backtest.fill_value = double(config, "sentiment", "fill_value", backtest.fill_value)?;
    if !(-1.0..=1.0).contains(&backtest.fill_value) {
        return Err(invalid("sentiment", "fill_value", "must be in [-1, 1]"));
    }
    backtest.validate()?;

    let start_date = date(config, "start_date")?;
    let end_date = date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(invalid("backtest", "start_date", "start_date must not be after end_date"));
        }
    }

    Ok(BacktestSettings {
        backtest,
        timeframe,
        strategy,
        start_date,
        end_date,
    })
}

/// Strategy knobs over the defaults for `kind`.
pub fn load_strategy_config(
    config: &dyn ConfigPort,
    kind: StrategyKind,
) -> Result<StrategyConfig, SentiquantError> {
    let d = StrategyConfig::defaults_for(kind);
    let s = "strategy";
    let tiers = |prefix: &str, fallback: ScoreTiers| -> Result<ScoreTiers, SentiquantError> {
        Ok(ScoreTiers::new(
            double(config, s, &format!("{prefix}_full"), fallback.full)?,
            double(config, s, &format!("{prefix}_partial"), fallback.partial)?,
        ))
    };

    let loaded = StrategyConfig {
        sentiment_threshold: double(config, s, "sentiment_threshold", d.sentiment_threshold)?,
        rsi_period: count(config, s, "rsi_period", d.rsi_period)?,
        rsi_overbought: double(config, s, "rsi_overbought", d.rsi_overbought)?,
        rsi_oversold: double(config, s, "rsi_oversold", d.rsi_oversold)?,
        sma_fast: count(config, s, "sma_fast", d.sma_fast)?,
        sma_slow: count(config, s, "sma_slow", d.sma_slow)?,
        macd_fast: count(config, s, "macd_fast", d.macd_fast)?,
        macd_slow: count(config, s, "macd_slow", d.macd_slow)?,
        macd_signal: count(config, s, "macd_signal", d.macd_signal)?,
        bb_period: count(config, s, "bb_period", d.bb_period)?,
        bb_devs: double(config, s, "bb_devs", d.bb_devs)?,
        position_size: double(config, s, "position_size", d.position_size)?,
        sentiment_weight: double(config, s, "sentiment_weight", d.sentiment_weight)?,
        technical_weight: double(config, s, "technical_weight", d.technical_weight)?,
        buy_threshold: double(config, s, "buy_threshold", d.buy_threshold)?,
        sell_threshold: double(config, s, "sell_threshold", d.sell_threshold)?,
        rsi_tiers: tiers("rsi", d.rsi_tiers)?,
        macd_tiers: tiers("macd", d.macd_tiers)?,
        ma_tiers: tiers("ma", d.ma_tiers)?,
        bb_tiers: tiers("bb", d.bb_tiers)?,
    };
    loaded.validate()?;
    Ok(loaded)
}

pub fn load_sentiment_settings(config: &dyn ConfigPort) -> Result<SentimentSettings, SentiquantError> {
    let timeout_secs = double(
        config,
        "sentiment",
        "timeout_secs",
        DEFAULT_SENTIMENT_TIMEOUT.as_secs_f64(),
    )?;
    if timeout_secs <= 0.0 {
        return Err(invalid("sentiment", "timeout_secs", "must be a positive number of seconds"));
    }
    let timeout = Duration::try_from_secs_f64(timeout_secs)
        .map_err(|_| invalid("sentiment", "timeout_secs", "out of range"))?;

    let batch_size = count(config, "sentiment", "batch_size", DEFAULT_BATCH_SIZE)?;
    if batch_size == 0 {
        return Err(invalid("sentiment", "batch_size", "must be at least 1"));
    }

    let bucket = match config.get_string("sentiment", "bucket") {
        None => None,
        Some(raw) if raw.trim().eq_ignore_ascii_case("auto") || raw.trim().is_empty() => None,
        Some(raw) => Some(
            raw.trim()
                .parse::<BucketWidth>()
                .map_err(|reason| invalid("sentiment", "bucket", &reason))?,
        ),
    };

    let enabled = match config.get_string("sentiment", "enabled") {
        None => true,
        Some(raw) => parse_bool(&raw)
            .ok_or_else(|| invalid("sentiment", "enabled", "expected true or false"))?,
    };

    Ok(SentimentSettings {
        enabled,
        cache_dir: config.get_string("sentiment", "cache_dir").map(PathBuf::from),
        timeout,
        batch_size,
        bucket,
    })
}

pub fn load_results_settings(config: &dyn ConfigPort) -> Result<ResultsSettings, SentiquantError> {
    let capacity = count(config, "results", "capacity", DEFAULT_RESULT_CAPACITY)?;
    if capacity == 0 {
        return Err(invalid("results", "capacity", "must be at least 1"));
    }
    Ok(ResultsSettings {
        path: config.get_string("results", "path").map(PathBuf::from),
        capacity,
    })
}

pub fn data_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(string_or(config, "data", "dir", DEFAULT_DATA_DIR))
}

pub fn parse_strategy(name: &str) -> Result<StrategyKind, SentiquantError> {
    name.parse::<StrategyKind>()
}

fn invalid(section: &str, key: &str, reason: &str) -> SentiquantError {
    SentiquantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn required_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SentiquantError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SentiquantError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn string_or(config: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, SentiquantError>
where
    T: FromStr,
    T::Err: ToString,
{
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(section, key, &e.to_string())),
        _ => Ok(default),
    }
}

fn double(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, SentiquantError> {
    let value: f64 = parsed(config, section, key, default)
        .map_err(|_| invalid(section, key, "expected a number"))?;
    if !value.is_finite() {
        return Err(invalid(section, key, "must be finite"));
    }
    Ok(value)
}

fn count(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, SentiquantError> {
    parsed(config, section, key, default)
        .map_err(|_| invalid(section, key, "expected a non-negative integer"))
}

fn date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, SentiquantError> {
    match config.get_string("backtest", key) {
        Some(s) if !s.trim().is_empty() => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid("backtest", key, &format!("invalid {key} format, expected YYYY-MM-DD"))),
        _ => Ok(None),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(result: Result<impl std::fmt::Debug, SentiquantError>, section: &str, key: &str) {
        match result {
            Err(SentiquantError::ConfigInvalid { section: s, key: k, .. }) => {
                assert_eq!(s, section);
                assert_eq!(k, key);
            }
            other => panic!("expected ConfigInvalid [{section}] {key}, got {other:?}"),
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = make_config("[backtest]\nsymbol = BTC/USDT\n");
        let settings = load_backtest_settings(&config).unwrap();
        assert_eq!(settings.backtest.symbol, "BTC/USDT");
        assert_eq!(settings.timeframe, "1d");
        assert_eq!(settings.strategy, "sentiment");
        assert_eq!(settings.backtest.initial_capital, 10_000.0);
        assert_eq!(settings.backtest.commission_rate, 0.001);
        assert_eq!(settings.backtest.min_bars, 60);
        assert_eq!(settings.backtest.fill_policy, FillPolicy::Forward);
        assert!(settings.start_date.is_none());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[backtest]
symbol = ETH/USDT
timeframe = 4h
strategy = combined
initial_capital = 5000
commission = 0.002
start_date = 2024-01-01
end_date = 2024-06-30
min_bars = 80

[strategy]
rsi_period = 10
buy_threshold = 0.5
bb_full = 0.9

[sentiment]
cache_dir = /tmp/sentiment
timeout_secs = 5
batch_size = 16
fill_method = interpolate
fill_value = 0.1
bucket = 3d

[results]
path = results.json
capacity = 10
"#,
        );
        validate_config(&config).unwrap();

        let settings = load_backtest_settings(&config).unwrap();
        assert_eq!(settings.timeframe, "4h");
        assert_eq!(settings.backtest.min_bars, 80);
        assert_eq!(settings.backtest.fill_policy, FillPolicy::Interpolate);
        assert_eq!(settings.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));

        let strategy = load_strategy_config(&config, StrategyKind::Combined).unwrap();
        assert_eq!(strategy.rsi_period, 10);
        assert_eq!(strategy.buy_threshold, 0.5);
        assert_eq!(strategy.bb_tiers, ScoreTiers::new(0.9, 0.4));
        assert_eq!(strategy.sentiment_threshold, 0.1);

        let sentiment = load_sentiment_settings(&config).unwrap();
        assert_eq!(sentiment.timeout, Duration::from_secs(5));
        assert_eq!(sentiment.batch_size, 16);
        assert_eq!(sentiment.bucket, Some(BucketWidth::days(3)));
        assert_eq!(sentiment.cache_dir, Some(PathBuf::from("/tmp/sentiment")));

        let results = load_results_settings(&config).unwrap();
        assert_eq!(results.capacity, 10);
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\n");
        assert!(matches!(
            load_backtest_settings(&config),
            Err(SentiquantError::ConfigMissing { ref key, .. }) if key == "symbol"
        ));
    }

    #[test]
    fn unknown_strategy_fails() {
        let config = make_config("[backtest]\nsymbol = BTC\nstrategy = momentum\n");
        assert!(matches!(
            validate_config(&config),
            Err(SentiquantError::UnknownStrategy { ref name }) if name == "momentum"
        ));
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\nsymbol = BTC\ninitial_capital = 0\n");
        assert_invalid(load_backtest_settings(&config), "backtest", "initial_capital");
    }

    #[test]
    fn unparseable_number_is_rejected() {
        let config = make_config("[backtest]\nsymbol = BTC\ninitial_capital = lots\n");
        assert_invalid(load_backtest_settings(&config), "backtest", "initial_capital");
    }

    #[test]
    fn commission_out_of_range_fails() {
        let config = make_config("[backtest]\nsymbol = BTC\ncommission = 1.5\n");
        assert_invalid(load_backtest_settings(&config), "backtest", "commission");
    }

    #[test]
    fn invalid_date_format_fails() {
        let config = make_config("[backtest]\nsymbol = BTC\nstart_date = 01/02/2024\n");
        assert_invalid(load_backtest_settings(&config), "backtest", "start_date");
    }

    #[test]
    fn start_after_end_fails() {
        let config = make_config(
            "[backtest]\nsymbol = BTC\nstart_date = 2024-05-01\nend_date = 2024-04-01\n",
        );
        assert_invalid(load_backtest_settings(&config), "backtest", "start_date");
    }

    #[test]
    fn single_day_range_is_allowed() {
        let config = make_config(
            "[backtest]\nsymbol = BTC\nstart_date = 2024-05-01\nend_date = 2024-05-01\n",
        );
        assert!(load_backtest_settings(&config).is_ok());
    }

    #[test]
    fn zero_min_bars_fails() {
        let config = make_config("[backtest]\nsymbol = BTC\nmin_bars = 0\n");
        assert_invalid(load_backtest_settings(&config), "backtest", "min_bars");
    }

    #[test]
    fn fill_value_out_of_range_fails() {
        let config = make_config("[backtest]\nsymbol = BTC\n[sentiment]\nfill_value = 2\n");
        assert_invalid(load_backtest_settings(&config), "sentiment", "fill_value");
    }

    #[test]
    fn timeout_out_of_range_fails() {
        for raw in ["1e300", "inf", "0", "-5"] {
            let config = make_config(&format!("[sentiment]\ntimeout_secs = {raw}\n"));
            assert_invalid(load_sentiment_settings(&config), "sentiment", "timeout_secs");
        }
    }

    #[test]
    fn oversized_bucket_fails() {
        let config = make_config("[sentiment]\nbucket = 9999999999999999w\n");
        assert_invalid(load_sentiment_settings(&config), "sentiment", "bucket");
    }

    #[test]
    fn unknown_fill_method_fails() {
        let config = make_config("[backtest]\nsymbol = BTC\n[sentiment]\nfill_method = nearest\n");
        assert_invalid(load_backtest_settings(&config), "sentiment", "fill_method");
    }

    #[test]
    fn strategy_periods_must_be_ordered() {
        let config = make_config("[strategy]\nsma_fast = 60\nsma_slow = 50\n");
        assert_invalid(
            load_strategy_config(&config, StrategyKind::Technical),
            "strategy",
            "sma_fast",
        );
    }

    #[test]
    fn position_size_above_one_fails() {
        let config = make_config("[strategy]\nposition_size = 1.2\n");
        assert_invalid(
            load_strategy_config(&config, StrategyKind::Macd),
            "strategy",
            "position_size",
        );
    }

    #[test]
    fn negative_period_is_rejected() {
        let config = make_config("[strategy]\nrsi_period = -3\n");
        assert_invalid(
            load_strategy_config(&config, StrategyKind::Sentiment),
            "strategy",
            "rsi_period",
        );
    }

    #[test]
    fn sentiment_section_checks() {
        let config = make_config("[sentiment]\ntimeout_secs = 0\n");
        assert_invalid(load_sentiment_settings(&config), "sentiment", "timeout_secs");

        let config = make_config("[sentiment]\nbatch_size = 0\n");
        assert_invalid(load_sentiment_settings(&config), "sentiment", "batch_size");

        let config = make_config("[sentiment]\nbucket = fortnight\n");
        assert_invalid(load_sentiment_settings(&config), "sentiment", "bucket");

        let config = make_config("[sentiment]\nenabled = maybe\n");
        assert_invalid(load_sentiment_settings(&config), "sentiment", "enabled");
    }

    #[test]
    fn sentiment_defaults() {
        let config = make_config("[sentiment]\nbucket = auto\n");
        let settings = load_sentiment_settings(&config).unwrap();
        assert_eq!(settings, SentimentSettings::default());
    }

    #[test]
    fn results_capacity_zero_fails() {
        let config = make_config("[results]\ncapacity = 0\n");
        assert_invalid(load_results_settings(&config), "results", "capacity");
    }

    #[test]
    fn data_dir_defaults() {
        assert_eq!(data_dir(&make_config("[backtest]\n")), PathBuf::from("data"));
        assert_eq!(
            data_dir(&make_config("[data]\ndir = /srv/bars\n")),
            PathBuf::from("/srv/bars")
        );
    }
}
