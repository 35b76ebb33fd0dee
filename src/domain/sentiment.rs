//! News items, per-text classifications and bucketed sentiment points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

impl NewsItem {
    /// Text handed to the classifier: title and body joined by a space.
    /// Blank items yield `None` and are skipped.
    pub fn text(&self) -> Option<String> {
        let text = format!("{} {}", self.title.trim(), self.body.trim());
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

/// Classifier output for a single text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: SentimentLabel,
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl Classification {
    /// Build a classification from a probability triple, labelling it with
    /// the most probable class.
    pub fn from_probabilities(positive: f64, neutral: f64, negative: f64) -> Self {
        let label = if positive >= neutral && positive >= negative {
            SentimentLabel::Positive
        } else if negative > neutral {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        Classification {
            label,
            positive,
            neutral,
            negative,
        }
    }
}

/// Share of classifications per label.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSentiment {
    pub overall_label: SentimentLabel,
    pub sentiment_score: f64,
    pub distribution: LabelDistribution,
}

const LABEL_BAND: f64 = 0.1;

/// Mean positive probability minus mean negative probability, labelled
/// positive above 0.1 and negative below -0.1.
pub fn aggregate_classifications(items: &[Classification]) -> AggregateSentiment {
    if items.is_empty() {
        return AggregateSentiment {
            overall_label: SentimentLabel::Neutral,
            sentiment_score: 0.0,
            distribution: LabelDistribution::default(),
        };
    }

    let n = items.len() as f64;
    let count = |label: SentimentLabel| items.iter().filter(|c| c.label == label).count() as f64;

    let avg_positive = items.iter().map(|c| c.positive).sum::<f64>() / n;
    let avg_negative = items.iter().map(|c| c.negative).sum::<f64>() / n;
    let sentiment_score = (avg_positive - avg_negative).clamp(-1.0, 1.0);

    let overall_label = if sentiment_score > LABEL_BAND {
        SentimentLabel::Positive
    } else if sentiment_score < -LABEL_BAND {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    AggregateSentiment {
        overall_label,
        sentiment_score,
        distribution: LabelDistribution {
            positive: count(SentimentLabel::Positive) / n,
            neutral: count(SentimentLabel::Neutral) / n,
            negative: count(SentimentLabel::Negative) / n,
        },
    }
}

/// Aggregated sentiment for one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub bucket_start: DateTime<Utc>,
    pub sentiment_score: f64,
    pub positive_ratio: f64,
    pub negative_ratio: f64,
    pub neutral_ratio: f64,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SentimentStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub first_bucket: Option<DateTime<Utc>>,
    pub last_bucket: Option<DateTime<Utc>>,
}

/// Summary statistics of a sentiment series. `std` is the sample standard
/// deviation and is 0.0 for fewer than two points.
pub fn sentiment_stats(points: &[SentimentPoint]) -> SentimentStats {
    if points.is_empty() {
        return SentimentStats::default();
    }

    let n = points.len() as f64;
    let scores = points.iter().map(|p| p.sentiment_score);
    let mean = scores.clone().sum::<f64>() / n;
    let std = if points.len() > 1 {
        (scores.clone().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    SentimentStats {
        count: points.len(),
        mean,
        std,
        min: scores.clone().fold(f64::INFINITY, f64::min),
        max: scores.fold(f64::NEG_INFINITY, f64::max),
        first_bucket: points.iter().map(|p| p.bucket_start).min(),
        last_bucket: points.iter().map(|p| p.bucket_start).max(),
    }
}
