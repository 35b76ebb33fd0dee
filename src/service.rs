//! Backtest orchestration over the ports.
//!
//! [`BacktestService`] owns nothing: it borrows a price source and, when
//! available, a news source with its classifier, a sentiment cache and a
//! result store, and runs one request at a time through them.

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::domain::backtest::{BacktestConfig, BacktestResult, required_bars, run_backtest};
use crate::domain::config_validation::{BacktestSettings, DEFAULT_TIMEFRAME, SentimentSettings};
use crate::domain::error::{SentiquantError, SentimentError};
use crate::domain::ohlcv::{Bar, filter_by_date_range, normalize_bars};
use crate::domain::sentiment::{SentimentPoint, sentiment_stats};
use crate::domain::sentiment_series::{BucketWidth, Deadline, SentimentSeriesBuilder};
use crate::domain::strategy::{Strategy, StrategyConfig, StrategyKind};
use crate::ports::classifier_port::SentimentClassifier;
use crate::ports::news_port::NewsSource;
use crate::ports::price_port::PriceSource;
use crate::ports::result_store_port::ResultStore;
use crate::ports::sentiment_cache_port::{CacheKey, SentimentCache};

/// One backtest to run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub settings: BacktestSettings,
    pub strategy_config: StrategyConfig,
    /// An explicit series bypasses the news source and the cache.
    pub sentiment: Option<Vec<SentimentPoint>>,
}

impl BacktestRequest {
    /// Defaults for `strategy` on `symbol` at the daily timeframe. An unknown
    /// strategy name is kept as-is and rejected when the request runs.
    pub fn new(symbol: &str, strategy: &str) -> Self {
        let strategy_config = strategy
            .parse::<StrategyKind>()
            .map(StrategyConfig::defaults_for)
            .unwrap_or_default();
        BacktestRequest {
            settings: BacktestSettings {
                backtest: BacktestConfig::new(symbol),
                timeframe: DEFAULT_TIMEFRAME.to_string(),
                strategy: strategy.to_string(),
                start_date: None,
                end_date: None,
            },
            strategy_config,
            sentiment: None,
        }
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.settings.start_date = start;
        self.settings.end_date = end;
        self
    }

    pub fn with_sentiment(mut self, series: Vec<SentimentPoint>) -> Self {
        self.sentiment = Some(series);
        self
    }
}

/// News/sentiment symbol for a trading pair: its base asset.
pub fn base_symbol(symbol: &str) -> &str {
    symbol.split('/').next().unwrap_or(symbol).trim()
}

pub struct BacktestService<'a> {
    prices: &'a dyn PriceSource,
    news: Option<(&'a dyn NewsSource, &'a dyn SentimentClassifier)>,
    cache: Option<&'a dyn SentimentCache>,
    store: Option<&'a dyn ResultStore>,
    sentiment: SentimentSettings,
}

impl<'a> BacktestService<'a> {
    pub fn new(prices: &'a dyn PriceSource) -> Self {
        BacktestService {
            prices,
            news: None,
            cache: None,
            store: None,
            sentiment: SentimentSettings::default(),
        }
    }

    pub fn with_news(
        mut self,
        news: &'a dyn NewsSource,
        classifier: &'a dyn SentimentClassifier,
    ) -> Self {
        self.news = Some((news, classifier));
        self
    }

    pub fn with_cache(mut self, cache: &'a dyn SentimentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_store(mut self, store: &'a dyn ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_sentiment_settings(mut self, settings: SentimentSettings) -> Self {
        self.sentiment = settings;
        self
    }

    /// Fetch, filter, check, attach sentiment, simulate, stamp and store.
    pub fn run(&self, request: &BacktestRequest) -> Result<BacktestResult, SentiquantError> {
        let settings = &request.settings;
        let symbol = settings.backtest.symbol.as_str();
        let kind: StrategyKind = settings.strategy.parse()?;
        let strategy = Strategy::new(kind, request.strategy_config.clone())?;
        settings.backtest.validate()?;

        let bars = self.prices.fetch_bars(symbol, &settings.timeframe)?;
        info!(symbol, timeframe = %settings.timeframe, bars = bars.len(), "loaded bars");

        let mut bars = filter_by_date_range(&bars, symbol, settings.start_date, settings.end_date)?;
        normalize_bars(&mut bars);

        let required = required_bars(&strategy, settings.backtest.min_bars);
        if bars.len() < required {
            return Err(SentiquantError::InsufficientData {
                symbol: symbol.to_string(),
                required,
                available: bars.len(),
            });
        }

        let sentiment = if kind.uses_sentiment() && self.sentiment.enabled {
            self.load_sentiment(symbol, &bars, request.sentiment.as_deref())
        } else {
            Vec::new()
        };

        let mut result = run_backtest(
            &bars,
            &settings.strategy,
            &request.strategy_config,
            &settings.backtest,
            Some(sentiment.as_slice()),
        )?;

        result.timeframe = Some(settings.timeframe.clone());
        result.start_date = settings.start_date;
        result.end_date = settings.end_date;
        result.completed_at = Some(Utc::now());

        if let Some(store) = self.store
            && let Err(e) = store.save(&result)
        {
            warn!(symbol, "failed to store backtest result: {e}");
        }

        Ok(result)
    }

    /// Most recent stored results, oldest first. Empty without a store.
    pub fn recent_results(&self, limit: usize) -> Result<Vec<BacktestResult>, SentiquantError> {
        match self.store {
            Some(store) => store.get_recent(limit),
            None => Ok(Vec::new()),
        }
    }

    /// Sentiment for `symbol`, degrading to an empty (all-neutral) series on
    /// any failure. Never retried.
    fn load_sentiment(
        &self,
        symbol: &str,
        bars: &[Bar],
        explicit: Option<&[SentimentPoint]>,
    ) -> Vec<SentimentPoint> {
        let base = base_symbol(symbol);
        let width = self.sentiment.bucket.unwrap_or_else(|| BucketWidth::infer(bars));

        match self.sentiment_series(base, width, explicit) {
            Ok(series) => {
                let stats = sentiment_stats(&series);
                info!(
                    symbol = base,
                    bucket = %width,
                    points = stats.count,
                    mean = stats.mean,
                    std = stats.std,
                    min = stats.min,
                    max = stats.max,
                    "sentiment series ready"
                );
                series
            }
            Err(e) => {
                warn!(symbol = base, bucket = %width, "sentiment unavailable, using neutral: {e}");
                Vec::new()
            }
        }
    }

    fn sentiment_series(
        &self,
        base: &str,
        width: BucketWidth,
        explicit: Option<&[SentimentPoint]>,
    ) -> Result<Vec<SentimentPoint>, SentimentError> {
        if let Some(series) = explicit {
            return Ok(series.to_vec());
        }

        if let Some((news, classifier)) = self.news {
            let mut builder =
                SentimentSeriesBuilder::new(classifier).with_batch_size(self.sentiment.batch_size);
            if let Some(cache) = self.cache {
                builder = builder.with_cache(cache);
            }
            let deadline = Deadline::after(self.sentiment.timeout);
            let series = builder.build_cached(base, news, width, &deadline)?;
            if series.is_empty() {
                return Err(SentimentError::NoNews);
            }
            return Ok(series);
        }

        match self.cache {
            Some(cache) => cache
                .load(&CacheKey::new(base, width))?
                .ok_or(SentimentError::NoSource),
            None => Err(SentimentError::NoSource),
        }
    }
}
