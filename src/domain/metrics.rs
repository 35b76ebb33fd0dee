//! Performance metrics and statistics.

use chrono::NaiveDate;
use tracing::debug;

use super::portfolio::{EquityPoint, Portfolio};
use super::position::{OrderSide, Trade};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percentage, 0-100.
    pub win_rate: f64,
    pub avg_win: f64,
    /// Mean PnL of losing trades; negative or zero.
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    /// Whether the primary Sharpe estimator degenerated and the manual
    /// per-bar computation was used instead.
    pub sharpe_fallback: bool,
    pub trades: TradeStats,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio) -> Self {
        let initial_capital = portfolio.initial_capital;
        let final_value = portfolio.final_value();
        let values: Vec<f64> = portfolio.equity_curve.iter().map(|p| p.value).collect();

        let total_return_pct = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        let (sharpe_ratio, sharpe_fallback) = match daily_sharpe(&portfolio.equity_curve) {
            Some(s) if s != 0.0 && s.is_finite() => (s, false),
            primary => {
                let manual = manual_sharpe(&values);
                debug!(?primary, manual, "sharpe estimator degenerate, using manual fallback");
                (manual, true)
            }
        };

        let entries = portfolio
            .fills
            .iter()
            .filter(|f| f.side == OrderSide::Buy)
            .count();

        Metrics {
            initial_capital,
            final_value,
            total_return_pct,
            max_drawdown_pct: compute_drawdown_pct(&values),
            sharpe_ratio,
            sharpe_fallback,
            trades: trade_stats(&portfolio.trades, entries),
        }
    }
}

/// Largest peak-to-trough decline of `values`, in percent.
pub fn compute_drawdown_pct(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd * 100.0
}

fn pct_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Primary estimator: returns of end-of-day values, population standard
/// deviation, annualized by sqrt(252). `None` when undefined (fewer than two
/// daily returns or zero volatility).
pub fn daily_sharpe(curve: &[EquityPoint]) -> Option<f64> {
    let mut daily: Vec<(NaiveDate, f64)> = Vec::new();
    for point in curve {
        let day = point.timestamp.date_naive();
        match daily.last_mut() {
            Some((d, v)) if *d == day => *v = point.value,
            _ => daily.push((day, point.value)),
        }
    }

    let values: Vec<f64> = daily.into_iter().map(|(_, v)| v).collect();
    let returns = pct_returns(&values);
    if returns.len() < 2 {
        return None;
    }
    let m = mean(&returns);
    let variance = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return None;
    }
    Some(m / std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Fallback: per-bar returns, population standard deviation, annualized by
/// sqrt(365). 0.0 when there are fewer than two returns or no volatility.
pub fn manual_sharpe(values: &[f64]) -> f64 {
    let returns = pct_returns(values);
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(&returns);
    let variance = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    m / std * CALENDAR_DAYS_PER_YEAR.sqrt()
}

/// Win/loss statistics over closed trades. `reported_total` is the number
/// of trades the execution layer believes it opened; when it disagrees with
/// the closed-trade count, the closed-trade count wins because an open
/// position is not a trade.
pub fn trade_stats(trades: &[Trade], reported_total: usize) -> TradeStats {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_win()).map(|t| t.realized_pnl).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| !t.is_win()).map(|t| t.realized_pnl).collect();

    let winning_trades = wins.len();
    let losing_trades = losses.len();
    let total_trades = winning_trades + losing_trades;
    if reported_total != total_trades {
        debug!(
            reported_total,
            reconciled = total_trades,
            "trade count reconciled to closed trades"
        );
    }

    let avg_win = if winning_trades > 0 { mean(&wins) } else { 0.0 };
    let avg_loss = if losing_trades > 0 { mean(&losses) } else { 0.0 };

    let win_rate = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    let profit_factor = (winning_trades > 0 && losing_trades > 0).then(|| {
        (winning_trades as f64 * avg_win) / (losing_trades as f64 * avg_loss).abs()
    });

    TradeStats {
        total_trades,
        winning_trades,
        losing_trades,
        win_rate,
        avg_win,
        avg_loss,
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        profit_factor,
    }
}
