#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sentiquant::domain::error::{SentiquantError, SentimentError};
pub use sentiquant::domain::ohlcv::Bar;
use sentiquant::domain::sentiment::{Classification, NewsItem, SentimentPoint};
use sentiquant::ports::classifier_port::SentimentClassifier;
use sentiquant::ports::news_port::NewsSource;
use sentiquant::ports::price_port::PriceSource;
use std::cell::Cell;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Daily bars from 2024-01-01 with open/high/low equal to close.
pub fn bars_from(prices: &[f64]) -> Vec<Bar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: start_time() + TimeDelta::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        })
        .collect()
}

pub fn constant_bars(n: usize, price: f64) -> Vec<Bar> {
    bars_from(&vec![price; n])
}

/// Falling then sharply rising closes. The 12/26 EMAs and the MACD line
/// and signal all cross upward exactly once, at index 40.
pub fn v_shaped_prices() -> Vec<f64> {
    (0..60)
        .map(|i| {
            if i < 40 {
                200.0 - 0.05 * (i * i) as f64
            } else {
                let j = (i - 40) as f64;
                400.0 + 0.5 * j * j
            }
        })
        .collect()
}

pub fn linear_prices(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

pub fn wave_prices(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + 15.0 * (i as f64 / 6.0).sin() + 0.1 * i as f64)
        .collect()
}

pub fn point(bucket_start: DateTime<Utc>, score: f64) -> SentimentPoint {
    SentimentPoint {
        bucket_start,
        sentiment_score: score,
        positive_ratio: score.max(0.0),
        negative_ratio: (-score).max(0.0),
        neutral_ratio: 1.0 - score.abs(),
        item_count: 1,
    }
}

pub fn news(day: i64, title: &str) -> NewsItem {
    NewsItem {
        timestamp: start_time() + TimeDelta::days(day) + TimeDelta::hours(9),
        title: title.to_string(),
        body: String::new(),
    }
}

pub struct MockPriceSource {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PriceSource for MockPriceSource {
    fn fetch_bars(&self, symbol: &str, _timeframe: &str) -> Result<Vec<Bar>, SentiquantError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SentiquantError::PriceSource {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }
}

pub struct MockNews {
    pub items: Vec<NewsItem>,
    pub calls: Cell<usize>,
    pub last_symbol: std::cell::RefCell<Option<String>>,
}

impl MockNews {
    pub fn new(items: Vec<NewsItem>) -> Self {
        Self {
            items,
            calls: Cell::new(0),
            last_symbol: std::cell::RefCell::new(None),
        }
    }
}

impl NewsSource for MockNews {
    fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, SentimentError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_symbol.borrow_mut() = Some(symbol.to_string());
        Ok(self.items.clone())
    }
}

pub struct FailingNews;

impl NewsSource for FailingNews {
    fn fetch_news(&self, _symbol: &str) -> Result<Vec<NewsItem>, SentimentError> {
        Err(SentimentError::News {
            reason: "feed unreachable".into(),
        })
    }
}

/// "bull" reads positive, "bear" negative, anything else neutral.
/// Optionally sleeps per batch to exercise the deadline.
pub struct KeywordClassifier {
    pub calls: Cell<usize>,
    pub delay: Duration,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            calls: Cell::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: Cell::new(0),
            delay,
        }
    }
}

impl SentimentClassifier for KeywordClassifier {
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>, SentimentError> {
        self.calls.set(self.calls.get() + 1);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                if t.contains("bull") {
                    Classification::from_probabilities(0.9, 0.05, 0.05)
                } else if t.contains("bear") {
                    Classification::from_probabilities(0.05, 0.05, 0.9)
                } else {
                    Classification::from_probabilities(0.1, 0.8, 0.1)
                }
            })
            .collect())
    }
}

pub struct FailingClassifier;

impl SentimentClassifier for FailingClassifier {
    fn classify_batch(&self, _texts: &[String]) -> Result<Vec<Classification>, SentimentError> {
        Err(SentimentError::Classifier {
            reason: "model unavailable".into(),
        })
    }
}
