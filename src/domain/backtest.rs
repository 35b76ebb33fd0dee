//! Backtest engine and event loop.
//!
//! [`run_backtest`] is the engine's single entry point: it resolves the
//! strategy, checks the data requirement, aligns sentiment onto the bars,
//! precomputes indicators and then walks the bars strictly in order, one
//! decision per bar, settling each order at that bar's close.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::alignment::{align_sentiment, AlignedBar, FillPolicy, NEUTRAL_SENTIMENT};
use super::error::SentiquantError;
use super::execution::{enter_long, exit_long, ExecutionConfig};
use super::indicator_helpers::IndicatorSet;
use super::metrics::Metrics;
use super::ohlcv::{normalize_bars, Bar};
use super::portfolio::Portfolio;
use super::sentiment::SentimentPoint;
use super::strategy::{Signal, Strategy, StrategyConfig, StrategyKind};

/// Bars below which no backtest is attempted, whatever the strategy.
pub const MIN_DATA_POINTS: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub min_bars: usize,
    pub fill_policy: FillPolicy,
    pub fill_value: f64,
}

impl BacktestConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        BacktestConfig {
            symbol: symbol.into(),
            initial_capital: 10_000.0,
            commission_rate: 0.001,
            min_bars: MIN_DATA_POINTS,
            fill_policy: FillPolicy::Forward,
            fill_value: NEUTRAL_SENTIMENT,
        }
    }

    pub fn validate(&self) -> Result<(), SentiquantError> {
        let invalid = |key: &str, reason: &str| {
            Err(SentiquantError::ConfigInvalid {
                section: "backtest".into(),
                key: key.into(),
                reason: reason.into(),
            })
        };
        if self.symbol.trim().is_empty() {
            return invalid("symbol", "must not be empty");
        }
        if !(self.initial_capital > 0.0 && self.initial_capital.is_finite()) {
            return invalid("initial_capital", "must be a positive number");
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return invalid("commission", "must be in [0, 1)");
        }
        Ok(())
    }
}

/// Summary of one run. The optional metadata fields are stamped by the
/// service layer before the result is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub success: bool,
    pub strategy: String,
    pub symbol: String,
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_factor: Option<f64>,
    pub bars_used: usize,
    pub sentiment_points: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BacktestResult {
    fn from_metrics(
        strategy: &Strategy,
        symbol: &str,
        metrics: &Metrics,
        bars_used: usize,
        sentiment_points: usize,
    ) -> Self {
        let t = &metrics.trades;
        BacktestResult {
            success: true,
            strategy: strategy.name().to_string(),
            symbol: symbol.to_string(),
            initial_capital: metrics.initial_capital,
            final_value: metrics.final_value,
            total_return_pct: metrics.total_return_pct,
            sharpe_ratio: metrics.sharpe_ratio,
            max_drawdown_pct: metrics.max_drawdown_pct,
            total_trades: t.total_trades,
            winning_trades: t.winning_trades,
            losing_trades: t.losing_trades,
            win_rate: t.win_rate,
            avg_win: t.avg_win,
            avg_loss: t.avg_loss,
            profit_factor: t.profit_factor,
            bars_used,
            sentiment_points,
            timeframe: None,
            start_date: None,
            end_date: None,
            completed_at: None,
        }
    }
}

/// A finished run with its full ledger, for callers that want more than
/// the summary.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub result: BacktestResult,
    pub portfolio: Portfolio,
    pub aligned: Vec<AlignedBar>,
}

/// Bars needed before a run is attempted.
pub fn required_bars(strategy: &Strategy, min_bars: usize) -> usize {
    min_bars.max(strategy.warmup() + 1)
}

/// Walk `aligned` in order, evaluating `strategy` once per bar and
/// recording portfolio value at every close.
pub fn simulate(
    aligned: &[AlignedBar],
    strategy: &Strategy,
    initial_capital: f64,
    commission_rate: f64,
) -> Portfolio {
    let bars: Vec<Bar> = aligned.iter().map(|a| a.bar.clone()).collect();
    let indicators = IndicatorSet::compute(&bars, &strategy.config.indicator_params());
    let exec = ExecutionConfig {
        commission_rate,
        position_size: strategy.config.position_size,
    };

    let mut portfolio = Portfolio::new(initial_capital);

    for (i, row) in aligned.iter().enumerate() {
        let bar = &row.bar;
        if !portfolio.has_pending_order() {
            let snap = indicators.snapshot(row, i);
            match strategy.evaluate(&snap, portfolio.has_position()) {
                Signal::EnterLong => {
                    debug!(bar = i, close = bar.close, sentiment = row.sentiment_score, "enter long");
                    enter_long(&mut portfolio, i, bar.timestamp, bar.close, &exec);
                }
                Signal::ExitLong => {
                    debug!(bar = i, close = bar.close, sentiment = row.sentiment_score, "exit long");
                    exit_long(&mut portfolio, i, bar.timestamp, bar.close, &exec);
                }
                Signal::Hold => {}
            }
        }
        portfolio.record_equity(bar.timestamp, bar.close);
    }

    portfolio
}

/// Run one backtest and return its summary.
pub fn run_backtest(
    bars: &[Bar],
    strategy_name: &str,
    strategy_config: &StrategyConfig,
    config: &BacktestConfig,
    sentiment: Option<&[SentimentPoint]>,
) -> Result<BacktestResult, SentiquantError> {
    run_backtest_detailed(bars, strategy_name, strategy_config, config, sentiment).map(|r| r.result)
}

/// As [`run_backtest`], keeping the portfolio ledger and aligned bars.
pub fn run_backtest_detailed(
    bars: &[Bar],
    strategy_name: &str,
    strategy_config: &StrategyConfig,
    config: &BacktestConfig,
    sentiment: Option<&[SentimentPoint]>,
) -> Result<BacktestRun, SentiquantError> {
    let kind: StrategyKind = strategy_name.parse()?;
    let strategy = Strategy::new(kind, strategy_config.clone())?;
    config.validate()?;

    let mut bars = bars.to_vec();
    let dropped = normalize_bars(&mut bars);
    if dropped > 0 {
        warn!(symbol = %config.symbol, dropped, "dropped bars with duplicate timestamps");
    }

    let required = required_bars(&strategy, config.min_bars);
    if bars.len() < required {
        return Err(SentiquantError::InsufficientData {
            symbol: config.symbol.clone(),
            required,
            available: bars.len(),
        });
    }

    let points: &[SentimentPoint] = if kind.uses_sentiment() {
        sentiment.unwrap_or_default()
    } else {
        &[]
    };
    let aligned = align_sentiment(&bars, points, config.fill_policy, config.fill_value);

    info!(
        symbol = %config.symbol,
        strategy = %kind,
        bars = bars.len(),
        sentiment_points = points.len(),
        "running backtest"
    );

    let portfolio = simulate(&aligned, &strategy, config.initial_capital, config.commission_rate);
    let metrics = Metrics::compute(&portfolio);
    let result =
        BacktestResult::from_metrics(&strategy, &config.symbol, &metrics, bars.len(), points.len());

    info!(
        symbol = %config.symbol,
        strategy = %kind,
        final_value = result.final_value,
        total_return_pct = result.total_return_pct,
        trades = result.total_trades,
        "backtest complete"
    );

    Ok(BacktestRun {
        result,
        portfolio,
        aligned,
    })
}
