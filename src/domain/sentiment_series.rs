//! Bucketed sentiment series construction.
//!
//! News items are floored onto fixed-width, epoch-aligned buckets. Each
//! non-empty bucket is classified in bounded sub-batches and aggregated into
//! one [`SentimentPoint`]. Empty buckets are omitted; gap filling belongs to
//! the aligner.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::error::SentimentError;
use super::ohlcv::{median_spacing, Bar};
use super::sentiment::{NewsItem, SentimentPoint};
use crate::ports::classifier_port::SentimentClassifier;
use crate::ports::news_port::NewsSource;
use crate::ports::sentiment_cache_port::{CacheKey, SentimentCache};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_SENTIMENT_TIMEOUT: Duration = Duration::from_secs(30);

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Width of a sentiment bucket, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketWidth {
    seconds: i64,
}

impl BucketWidth {
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        (seconds > 0).then_some(BucketWidth { seconds })
    }

    pub fn days(n: i64) -> Self {
        BucketWidth {
            seconds: n.max(1) * DAY,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// One day when bars are at most daily, otherwise three days.
    pub fn infer(bars: &[Bar]) -> Self {
        match median_spacing(bars) {
            Some(spacing) if spacing > TimeDelta::days(1) => BucketWidth::days(3),
            _ => BucketWidth::days(1),
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp().div_euclid(self.seconds) * self.seconds;
        DateTime::from_timestamp(secs, 0).unwrap_or(ts)
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        for (unit, suffix) in [(WEEK, "w"), (DAY, "d"), (HOUR, "h"), (MINUTE, "m")] {
            if s % unit == 0 {
                return write!(f, "{}{}", s / unit, suffix);
            }
        }
        write!(f, "{}s", s)
    }
}

impl FromStr for BucketWidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in bucket width '{s}'"))?;
        let (num, unit) = s.split_at(split);
        let n: i64 = num
            .parse()
            .map_err(|_| format!("invalid bucket width '{s}'"))?;
        let unit_secs = match unit {
            "s" => 1,
            "m" | "min" => MINUTE,
            "h" => HOUR,
            "d" => DAY,
            "w" => WEEK,
            _ => return Err(format!("unknown unit '{unit}' in bucket width '{s}'")),
        };
        let seconds = n
            .checked_mul(unit_secs)
            .ok_or_else(|| format!("bucket width too large: '{s}'"))?;
        BucketWidth::from_seconds(seconds)
            .ok_or_else(|| format!("bucket width must be positive: '{s}'"))
    }
}

/// Cooperative cancellation for long-running sentiment construction.
/// Checked between classifier sub-batches, never mid-batch.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Deadline {
            started: Instant::now(),
            limit: Some(limit),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn never() -> Self {
        Deadline {
            started: Instant::now(),
            limit: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel from another clone of this deadline.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn check(&self) -> Result<(), SentimentError> {
        let elapsed = self.started.elapsed();
        let expired = self.limit.is_some_and(|limit| elapsed >= limit);
        if expired || self.cancelled.load(Ordering::Relaxed) {
            return Err(SentimentError::TimedOut { elapsed });
        }
        Ok(())
    }
}

pub struct SentimentSeriesBuilder<'a> {
    classifier: &'a dyn SentimentClassifier,
    cache: Option<&'a dyn SentimentCache>,
    batch_size: usize,
}

impl<'a> SentimentSeriesBuilder<'a> {
    pub fn new(classifier: &'a dyn SentimentClassifier) -> Self {
        SentimentSeriesBuilder {
            classifier,
            cache: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn SentimentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Classify and aggregate `items` into a bucketed series, sorted by
    /// bucket start. No items is an empty series, not an error.
    pub fn build(
        &self,
        items: &[NewsItem],
        width: BucketWidth,
        deadline: &Deadline,
    ) -> Result<Vec<SentimentPoint>, SentimentError> {
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<String>> = BTreeMap::new();
        for item in items {
            if let Some(text) = item.text() {
                buckets.entry(width.floor(item.timestamp)).or_default().push(text);
            }
        }

        let total = buckets.len();
        let mut series = Vec::with_capacity(total);

        for (idx, (bucket_start, texts)) in buckets.into_iter().enumerate() {
            if idx % 100 == 0 {
                debug!(bucket = %bucket_start, "classifying bucket {}/{}", idx + 1, total);
            }

            let mut classifications = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(self.batch_size) {
                deadline.check()?;
                let batch = self.classifier.classify_batch(chunk)?;
                if batch.len() != chunk.len() {
                    return Err(SentimentError::Classifier {
                        reason: format!(
                            "expected {} classifications, got {}",
                            chunk.len(),
                            batch.len()
                        ),
                    });
                }
                classifications.extend(batch);
            }

            let agg = self.classifier.aggregate(&classifications);
            series.push(SentimentPoint {
                bucket_start,
                sentiment_score: agg.sentiment_score.clamp(-1.0, 1.0),
                positive_ratio: agg.distribution.positive,
                negative_ratio: agg.distribution.negative,
                neutral_ratio: agg.distribution.neutral,
                item_count: texts.len(),
            });
        }

        Ok(series)
    }

    /// Read-through cached build for `symbol`. A cache hit skips the news
    /// source and classifier entirely; a failed cache read regenerates.
    pub fn build_cached(
        &self,
        symbol: &str,
        news: &dyn NewsSource,
        width: BucketWidth,
        deadline: &Deadline,
    ) -> Result<Vec<SentimentPoint>, SentimentError> {
        let key = CacheKey::new(symbol, width);

        if let Some(cache) = self.cache {
            match cache.load(&key) {
                Ok(Some(series)) => {
                    info!(%key, points = series.len(), "sentiment cache hit");
                    return Ok(series);
                }
                Ok(None) => {}
                Err(e) => warn!(%key, "sentiment cache read failed, regenerating: {e}"),
            }
        }

        let items = news.fetch_news(symbol)?;
        info!(symbol, items = items.len(), bucket = %width, "building sentiment series");
        let series = self.build(&items, width, deadline)?;

        if let Some(cache) = self.cache
            && !series.is_empty()
            && let Err(e) = cache.store(&key, &series)
        {
            warn!(%key, "failed to cache sentiment series: {e}");
        }

        Ok(series)
    }
}
