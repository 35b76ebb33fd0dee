//! Domain error types.

use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;

/// Top-level error type for sentiquant. Every variant is fatal for the run
/// that produced it.
#[derive(Debug, thiserror::Error)]
pub enum SentiquantError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy: {name} (expected sentiment, macd, technical or combined)")]
    UnknownStrategy { name: String },

    #[error("price source failed for {symbol}: {reason}")]
    PriceSource { symbol: String, reason: String },

    #[error("no bars for {symbol} between {start} and {end}", start = fmt_bound(start), end = fmt_bound(end))]
    EmptyDateRange {
        symbol: String,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },

    #[error("insufficient data for {symbol}: {required} required, {available} available")]
    InsufficientData {
        symbol: String,
        required: usize,
        available: usize,
    },

    #[error("unusable sentiment file {path}: {reason}")]
    SentimentFile { path: String, reason: String },

    #[error("result store error: {reason}")]
    Store { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn fmt_bound(bound: &Option<NaiveDate>) -> String {
    bound.map_or_else(|| "*".to_string(), |d| d.to_string())
}

impl From<&SentiquantError> for std::process::ExitCode {
    fn from(err: &SentiquantError) -> Self {
        let code: u8 = match err {
            SentiquantError::Io(_) => 1,
            SentiquantError::ConfigParse { .. }
            | SentiquantError::ConfigMissing { .. }
            | SentiquantError::ConfigInvalid { .. } => 2,
            SentiquantError::Store { .. } => 3,
            SentiquantError::UnknownStrategy { .. } => 4,
            SentiquantError::PriceSource { .. }
            | SentiquantError::EmptyDateRange { .. }
            | SentiquantError::InsufficientData { .. }
            | SentiquantError::SentimentFile { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// Reasons sentiment could not be produced for a run. None of these fail a
/// backtest: the caller degrades to an all-neutral series.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SentimentError {
    #[error("no news items available")]
    NoNews,

    #[error("no news source or classifier configured")]
    NoSource,

    #[error("news source failed: {reason}")]
    News { reason: String },

    #[error("classifier failed: {reason}")]
    Classifier { reason: String },

    #[error("sentiment construction timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("sentiment cache error: {reason}")]
    Cache { reason: String },

    #[error("sentiment file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Structured, serializable rendering of a failed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_bars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_bars: Option<usize>,
}

impl FailureReport {
    pub fn from_error(err: &SentiquantError, strategy: Option<&str>) -> Self {
        let mut report = FailureReport {
            success: false,
            error: err.to_string(),
            symbol: None,
            strategy: strategy.map(str::to_string),
            required_bars: None,
            available_bars: None,
        };
        match err {
            SentiquantError::InsufficientData {
                symbol,
                required,
                available,
            } => {
                report.symbol = Some(symbol.clone());
                report.required_bars = Some(*required);
                report.available_bars = Some(*available);
            }
            SentiquantError::EmptyDateRange { symbol, .. } => {
                report.symbol = Some(symbol.clone());
                report.available_bars = Some(0);
            }
            SentiquantError::PriceSource { symbol, .. } => {
                report.symbol = Some(symbol.clone());
            }
            SentiquantError::UnknownStrategy { name } => {
                report.strategy = Some(name.clone());
            }
            _ => {}
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_cites_counts() {
        let err = SentiquantError::InsufficientData {
            symbol: "BTC/USDT".into(),
            required: 60,
            available: 50,
        };
        assert!(err.to_string().contains("60 required, 50 available"));
        assert!(err.to_string().contains("BTC/USDT"));
    }

    #[test]
    fn empty_date_range_renders_open_bounds() {
        let err = SentiquantError::EmptyDateRange {
            symbol: "ETH".into(),
            start: NaiveDate::from_ymd_opt(2024, 3, 1),
            end: None,
        };
        assert_eq!(err.to_string(), "no bars for ETH between 2024-03-01 and *");
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;
        let cases = [
            (
                SentiquantError::ConfigMissing {
                    section: "backtest".into(),
                    key: "symbol".into(),
                },
                ExitCode::from(2),
            ),
            (
                SentiquantError::UnknownStrategy { name: "x".into() },
                ExitCode::from(4),
            ),
            (
                SentiquantError::InsufficientData {
                    symbol: "BTC".into(),
                    required: 60,
                    available: 1,
                },
                ExitCode::from(5),
            ),
            (
                SentiquantError::SentimentFile {
                    path: "scores.csv".into(),
                    reason: "row 2: invalid score".into(),
                },
                ExitCode::from(5),
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ExitCode::from(&err), expected);
        }
    }

    #[test]
    fn failure_report_carries_bar_counts() {
        let err = SentiquantError::InsufficientData {
            symbol: "BTC".into(),
            required: 60,
            available: 50,
        };
        let report = FailureReport::from_error(&err, Some("macd"));
        assert!(!report.success);
        assert_eq!(report.symbol.as_deref(), Some("BTC"));
        assert_eq!(report.strategy.as_deref(), Some("macd"));
        assert_eq!(report.required_bars, Some(60));
        assert_eq!(report.available_bars, Some(50));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["required_bars"], 60);
    }

    #[test]
    fn failure_report_for_unknown_strategy() {
        let err = SentiquantError::UnknownStrategy {
            name: "momentum".into(),
        };
        let report = FailureReport::from_error(&err, None);
        assert_eq!(report.strategy.as_deref(), Some("momentum"));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("required_bars").is_none());
    }
}
