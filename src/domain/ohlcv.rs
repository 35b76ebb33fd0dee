//! OHLCV bar representation and bar-sequence helpers.

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::error::SentiquantError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Calendar date (UTC) the bar belongs to.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Sort bars by timestamp and drop duplicate timestamps, keeping the first
/// occurrence. Returns the number of duplicates dropped.
pub fn normalize_bars(bars: &mut Vec<Bar>) -> usize {
    bars.sort_by_key(|b| b.timestamp);
    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    before - bars.len()
}

/// Keep bars whose date falls in `[start, end]`. The end date is inclusive:
/// anything strictly before the following midnight is kept.
pub fn filter_by_date_range(
    bars: &[Bar],
    symbol: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<Bar>, SentiquantError> {
    if start.is_none() && end.is_none() {
        return Ok(bars.to_vec());
    }

    let start_ts = start.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc());
    let end_ts = end
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());

    let filtered: Vec<Bar> = bars
        .iter()
        .filter(|b| start_ts.is_none_or(|s| b.timestamp >= s))
        .filter(|b| end_ts.is_none_or(|e| b.timestamp < e))
        .cloned()
        .collect();

    if filtered.is_empty() {
        return Err(SentiquantError::EmptyDateRange {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }
    Ok(filtered)
}

/// Median spacing between consecutive bars, `None` with fewer than two bars.
pub fn median_spacing(bars: &[Bar]) -> Option<TimeDelta> {
    let mut gaps: Vec<TimeDelta> = bars
        .windows(2)
        .map(|w| w[1].timestamp - w[0].timestamp)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort();
    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 0 {
        Some((gaps[mid - 1] + gaps[mid]) / 2)
    } else {
        Some(gaps[mid])
    }
}
