//! Core domain types and logic.

pub mod ohlcv;
pub mod sentiment;
pub mod sentiment_series;
pub mod alignment;
pub mod indicator;
pub mod indicator_helpers;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod metrics;
pub mod backtest;
pub mod config_validation;
pub mod error;
