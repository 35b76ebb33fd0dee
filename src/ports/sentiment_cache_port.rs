//! Sentiment series cache port.
//!
//! Read-through and stale-tolerant: entries never expire, a key is only
//! replaced by an explicit `store`. Concurrent writers of the same key must
//! converge on the same content.

use crate::domain::error::SentimentError;
use crate::domain::sentiment::SentimentPoint;
use crate::domain::sentiment_series::BucketWidth;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub bucket: BucketWidth,
}

impl CacheKey {
    pub fn new(symbol: &str, bucket: BucketWidth) -> Self {
        CacheKey {
            symbol: symbol.to_string(),
            bucket,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sentiment_{}_{}", self.symbol, self.bucket)
    }
}

pub trait SentimentCache {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<SentimentPoint>>, SentimentError>;
    fn store(&self, key: &CacheKey, series: &[SentimentPoint]) -> Result<(), SentimentError>;
}
