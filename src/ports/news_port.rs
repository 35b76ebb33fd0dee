//! News feed port.

use crate::domain::error::SentimentError;
use crate::domain::sentiment::NewsItem;

pub trait NewsSource {
    /// Raw news for a base asset symbol such as `BTC`. May be empty.
    fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, SentimentError>;
}
