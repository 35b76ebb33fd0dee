//! Backtest result store port.
//!
//! Append-only with a fixed capacity; when full the oldest entries are
//! dropped first.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SentiquantError;

pub const DEFAULT_RESULT_CAPACITY: usize = 100;

pub trait ResultStore {
    fn save(&self, result: &BacktestResult) -> Result<(), SentiquantError>;

    /// Up to `limit` most recent results, oldest first.
    fn get_recent(&self, limit: usize) -> Result<Vec<BacktestResult>, SentiquantError>;
}
