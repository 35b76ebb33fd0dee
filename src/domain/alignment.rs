//! Aligns a bucketed sentiment series onto the price-bar timeline.
//!
//! Each bar takes the score of the latest sentiment point whose bucket
//! starts at or before the bar's timestamp. Bars ahead of the first point
//! take the fill value and never see later sentiment. Remaining gaps (points
//! with a non-finite score) are closed by the [`FillPolicy`], and a final
//! pass replaces anything still missing with the fill value.

use std::fmt;
use std::str::FromStr;

use super::ohlcv::Bar;
use super::sentiment::SentimentPoint;

pub const NEUTRAL_SENTIMENT: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    #[default]
    Forward,
    Backward,
    Interpolate,
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "ffill" => Ok(FillPolicy::Forward),
            "backward" | "bfill" => Ok(FillPolicy::Backward),
            "interpolate" | "linear" => Ok(FillPolicy::Interpolate),
            other => Err(format!(
                "unknown fill method '{other}' (expected forward, backward or interpolate)"
            )),
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillPolicy::Forward => "forward",
            FillPolicy::Backward => "backward",
            FillPolicy::Interpolate => "interpolate",
        };
        f.write_str(name)
    }
}

/// A bar with the sentiment known as of its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedBar {
    pub bar: Bar,
    pub sentiment_score: f64,
}

pub fn align_sentiment(
    bars: &[Bar],
    points: &[SentimentPoint],
    policy: FillPolicy,
    fill_value: f64,
) -> Vec<AlignedBar> {
    let fill_value = if fill_value.is_finite() {
        fill_value.clamp(-1.0, 1.0)
    } else {
        NEUTRAL_SENTIMENT
    };

    let mut sorted: Vec<&SentimentPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.bucket_start);

    let mut scores: Vec<Option<f64>> = Vec::with_capacity(bars.len());
    let mut leading = 0;
    let mut next = 0;
    let mut latest: Option<&SentimentPoint> = None;

    for bar in bars {
        while next < sorted.len() && sorted[next].bucket_start <= bar.timestamp {
            latest = Some(sorted[next]);
            next += 1;
        }
        match latest {
            Some(p) => scores.push(Some(p.sentiment_score).filter(|s| s.is_finite())),
            None => {
                leading += 1;
                scores.push(None);
            }
        }
    }

    let gaps = &mut scores[leading..];
    match policy {
        FillPolicy::Forward => forward_fill(gaps),
        FillPolicy::Backward => backward_fill(gaps),
        FillPolicy::Interpolate => interpolate(gaps),
    }

    bars.iter()
        .zip(scores)
        .map(|(bar, score)| AlignedBar {
            bar: bar.clone(),
            sentiment_score: score.unwrap_or(fill_value).clamp(-1.0, 1.0),
        })
        .collect()
}

fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }
}

fn backward_fill(values: &mut [Option<f64>]) {
    let mut next = None;
    for v in values.iter_mut().rev() {
        match v {
            Some(x) => next = Some(*x),
            None => *v = next,
        }
    }
}

/// Linear interpolation by position between the surrounding known values.
/// Trailing gaps carry the last known value; leading gaps are left empty.
fn interpolate(values: &mut [Option<f64>]) {
    let mut prev: Option<(usize, f64)> = None;
    let mut i = 0;
    while i < values.len() {
        if let Some(x) = values[i] {
            prev = Some((i, x));
            i += 1;
            continue;
        }
        let gap_end = (i..values.len())
            .find(|&j| values[j].is_some())
            .unwrap_or(values.len());
        let right = values.get(gap_end).copied().flatten();
        if let Some((p, left)) = prev {
            for (j, slot) in values.iter_mut().enumerate().take(gap_end).skip(i) {
                *slot = Some(match right {
                    Some(r) => left + (r - left) * (j - p) as f64 / (gap_end - p) as f64,
                    None => left,
                });
            }
        }
        i = gap_end;
    }
}
