//! Trading strategies.
//!
//! A strategy is a pure decision over one bar's [`IndicatorSnapshot`] and
//! whether a position is open. The four variants form a closed set and are
//! dispatched by [`StrategyKind`]; all are long-only with a single position.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::SentiquantError;
use crate::domain::indicator::{bollinger, macd, rsi, Cross};
use crate::domain::indicator_helpers::{IndicatorParams, IndicatorSnapshot};

const RSI_MIDLINE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Sentiment plus RSI, or a moving-average crossover.
    Sentiment,
    /// MACD line / signal crossovers only.
    Macd,
    /// MACD crossover confirmed by RSI or Bollinger, or a strong RSI/Bollinger signal.
    Technical,
    /// Weighted sentiment and technical scores against thresholds.
    Combined,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Sentiment,
        StrategyKind::Macd,
        StrategyKind::Technical,
        StrategyKind::Combined,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Sentiment => "sentiment",
            StrategyKind::Macd => "macd",
            StrategyKind::Technical => "technical",
            StrategyKind::Combined => "combined",
        }
    }

    /// Whether the strategy reads sentiment at all.
    pub fn uses_sentiment(self) -> bool {
        matches!(self, StrategyKind::Sentiment | StrategyKind::Combined)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = SentiquantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| SentiquantError::UnknownStrategy {
                name: s.to_string(),
            })
    }
}

/// Sub-score strengths for one technical component of the combined score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreTiers {
    pub full: f64,
    pub partial: f64,
}

impl ScoreTiers {
    pub const fn new(full: f64, partial: f64) -> Self {
        ScoreTiers { full, partial }
    }

    fn pick(&self, full: bool, partial: bool) -> f64 {
        if full {
            self.full
        } else if partial {
            self.partial
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub sentiment_threshold: f64,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_devs: f64,
    /// Fraction of cash committed on entry.
    pub position_size: f64,
    pub sentiment_weight: f64,
    pub technical_weight: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub rsi_tiers: ScoreTiers,
    pub macd_tiers: ScoreTiers,
    pub ma_tiers: ScoreTiers,
    pub bb_tiers: ScoreTiers,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            sentiment_threshold: 0.2,
            rsi_period: rsi::DEFAULT_PERIOD,
            rsi_overbought: rsi::OVERBOUGHT,
            rsi_oversold: rsi::OVERSOLD,
            sma_fast: 20,
            sma_slow: 50,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            bb_period: bollinger::DEFAULT_PERIOD,
            bb_devs: bollinger::DEFAULT_STDDEV_MULT,
            position_size: 0.95,
            sentiment_weight: 0.3,
            technical_weight: 0.7,
            buy_threshold: 0.45,
            sell_threshold: 0.45,
            rsi_tiers: ScoreTiers::new(1.0, 0.5),
            macd_tiers: ScoreTiers::new(1.0, 0.5),
            ma_tiers: ScoreTiers::new(1.0, 0.5),
            bb_tiers: ScoreTiers::new(0.8, 0.4),
        }
    }
}

impl StrategyConfig {
    /// Defaults for a strategy variant. Only the sentiment threshold differs:
    /// the combined score uses a looser 0.1.
    pub fn defaults_for(kind: StrategyKind) -> Self {
        let mut config = StrategyConfig::default();
        if kind == StrategyKind::Combined {
            config.sentiment_threshold = 0.1;
        }
        config
    }

    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            rsi_period: self.rsi_period,
            sma_fast: self.sma_fast,
            sma_slow: self.sma_slow,
            macd_fast: self.macd_fast,
            macd_slow: self.macd_slow,
            macd_signal: self.macd_signal,
            bb_period: self.bb_period,
            bb_devs: self.bb_devs,
        }
    }

    pub fn validate(&self) -> Result<(), SentiquantError> {
        let invalid = |key: &str, reason: &str| {
            Err(SentiquantError::ConfigInvalid {
                section: "strategy".into(),
                key: key.into(),
                reason: reason.into(),
            })
        };

        for (key, period) in [
            ("rsi_period", self.rsi_period),
            ("sma_fast", self.sma_fast),
            ("sma_slow", self.sma_slow),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bb_period", self.bb_period),
        ] {
            if period == 0 {
                return invalid(key, "must be at least 1");
            }
        }
        if self.sma_fast >= self.sma_slow {
            return invalid("sma_fast", "must be less than sma_slow");
        }
        if self.macd_fast >= self.macd_slow {
            return invalid("macd_fast", "must be less than macd_slow");
        }
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
            || self.rsi_oversold >= self.rsi_overbought
        {
            return invalid("rsi_oversold", "must satisfy 0 <= oversold < overbought <= 100");
        }
        if !(self.bb_devs > 0.0) {
            return invalid("bb_devs", "must be positive");
        }
        if !(self.position_size > 0.0 && self.position_size <= 1.0) {
            return invalid("position_size", "must be in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.sentiment_threshold) {
            return invalid("sentiment_threshold", "must be in [0, 1]");
        }
        for (key, weight) in [
            ("sentiment_weight", self.sentiment_weight),
            ("technical_weight", self.technical_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return invalid(key, "must be in [0, 1]");
            }
        }
        if self.sentiment_weight + self.technical_weight <= 0.0 {
            return invalid("technical_weight", "weights must not both be zero");
        }
        for (key, threshold) in [
            ("buy_threshold", self.buy_threshold),
            ("sell_threshold", self.sell_threshold),
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return invalid(key, "must be in [0, 1]");
            }
        }
        for (key, tiers) in [
            ("rsi_full", self.rsi_tiers),
            ("macd_full", self.macd_tiers),
            ("ma_full", self.ma_tiers),
            ("bb_full", self.bb_tiers),
        ] {
            if !(0.0..=1.0).contains(&tiers.full)
                || !(0.0..=1.0).contains(&tiers.partial)
                || tiers.partial > tiers.full
            {
                return invalid(key, "tiers must satisfy 0 <= partial <= full <= 1");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    EnterLong,
    ExitLong,
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub kind: StrategyKind,
    pub config: StrategyConfig,
}

impl Strategy {
    pub fn new(kind: StrategyKind, config: StrategyConfig) -> Result<Self, SentiquantError> {
        config.validate()?;
        Ok(Strategy { kind, config })
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Index of the first bar on which every input this strategy reads is
    /// defined.
    pub fn warmup(&self) -> usize {
        let p = self.config.indicator_params();
        match self.kind {
            StrategyKind::Sentiment => p.rsi_ready().max(p.ma_cross_ready()),
            StrategyKind::Macd => p.macd_cross_ready(),
            StrategyKind::Technical => p
                .macd_cross_ready()
                .max(p.rsi_ready())
                .max(p.bollinger_ready()),
            StrategyKind::Combined => p
                .macd_cross_ready()
                .max(p.rsi_ready())
                .max(p.ma_cross_ready())
                .max(p.bollinger_ready()),
        }
    }

    pub fn is_ready(&self, snap: &IndicatorSnapshot) -> bool {
        match self.kind {
            StrategyKind::Sentiment => snap.rsi.is_some() && snap.ma.is_some(),
            StrategyKind::Macd => snap.macd.is_some(),
            StrategyKind::Technical => {
                snap.macd.is_some() && snap.rsi.is_some() && snap.bollinger.is_some()
            }
            StrategyKind::Combined => {
                snap.macd.is_some()
                    && snap.rsi.is_some()
                    && snap.ma.is_some()
                    && snap.bollinger.is_some()
            }
        }
    }

    pub fn evaluate(&self, snap: &IndicatorSnapshot, in_position: bool) -> Signal {
        if !self.is_ready(snap) {
            return Signal::Hold;
        }
        let (enter, exit) = match self.kind {
            StrategyKind::Sentiment => self.sentiment_signals(snap),
            StrategyKind::Macd => self.macd_signals(snap),
            StrategyKind::Technical => self.technical_signals(snap),
            StrategyKind::Combined => (
                self.buy_score(snap) > self.config.buy_threshold,
                self.sell_score(snap) > self.config.sell_threshold,
            ),
        };
        match (in_position, enter, exit) {
            (false, true, _) => Signal::EnterLong,
            (true, _, true) => Signal::ExitLong,
            _ => Signal::Hold,
        }
    }

    fn sentiment_signals(&self, snap: &IndicatorSnapshot) -> (bool, bool) {
        let c = &self.config;
        let (Some(rsi), Some(ma)) = (snap.rsi, snap.ma) else {
            return (false, false);
        };
        let s = snap.sentiment_score;
        let enter = (s > c.sentiment_threshold && rsi < c.rsi_oversold) || ma.cross == Cross::Bullish;
        let exit = (s < -c.sentiment_threshold && rsi > c.rsi_overbought) || ma.cross == Cross::Bearish;
        (enter, exit)
    }

    fn macd_signals(&self, snap: &IndicatorSnapshot) -> (bool, bool) {
        match snap.macd.map(|m| m.cross) {
            Some(Cross::Bullish) => (true, false),
            Some(Cross::Bearish) => (false, true),
            _ => (false, false),
        }
    }

    fn technical_signals(&self, snap: &IndicatorSnapshot) -> (bool, bool) {
        let c = &self.config;
        let (Some(rsi), Some(m), Some(bb)) = (snap.rsi, snap.macd, snap.bollinger) else {
            return (false, false);
        };
        let close = snap.close;

        let buy_support = rsi < RSI_MIDLINE || close < bb.middle;
        let buy_strong = rsi < c.rsi_oversold || close < bb.lower;
        let enter = (m.cross == Cross::Bullish && buy_support) || buy_strong;

        // Exit mirrors entry: the middle band counts as support both ways.
        let sell_support = rsi > RSI_MIDLINE || close > bb.middle;
        let sell_strong = rsi > c.rsi_overbought || close > bb.upper;
        let exit = (m.cross == Cross::Bearish && sell_support) || sell_strong;

        (enter, exit)
    }

    /// RSI, MACD, moving-average and Bollinger buy sub-scores, each in [0, 1].
    /// Components not yet defined score 0.
    pub fn technical_buy_components(&self, snap: &IndicatorSnapshot) -> [f64; 4] {
        let c = &self.config;
        [
            snap.rsi.map_or(0.0, |r| {
                c.rsi_tiers.pick(r < c.rsi_oversold, r < RSI_MIDLINE)
            }),
            snap.macd.map_or(0.0, |m| {
                c.macd_tiers.pick(m.cross == Cross::Bullish, m.line > m.signal)
            }),
            snap.ma.map_or(0.0, |ma| {
                c.ma_tiers.pick(ma.cross == Cross::Bullish, ma.fast > ma.slow)
            }),
            snap.bollinger.map_or(0.0, |bb| {
                c.bb_tiers.pick(snap.close < bb.lower, snap.close < bb.middle)
            }),
        ]
    }

    /// Mirror of [`Strategy::technical_buy_components`] for the sell side.
    pub fn technical_sell_components(&self, snap: &IndicatorSnapshot) -> [f64; 4] {
        let c = &self.config;
        [
            snap.rsi.map_or(0.0, |r| {
                c.rsi_tiers.pick(r > c.rsi_overbought, r > RSI_MIDLINE)
            }),
            snap.macd.map_or(0.0, |m| {
                c.macd_tiers.pick(m.cross == Cross::Bearish, m.line < m.signal)
            }),
            snap.ma.map_or(0.0, |ma| {
                c.ma_tiers.pick(ma.cross == Cross::Bearish, ma.fast < ma.slow)
            }),
            snap.bollinger.map_or(0.0, |bb| {
                c.bb_tiers.pick(snap.close > bb.upper, snap.close > bb.middle)
            }),
        ]
    }

    pub fn buy_score(&self, snap: &IndicatorSnapshot) -> f64 {
        let sentiment = ((snap.sentiment_score + 1.0) / 2.0).clamp(0.0, 1.0);
        self.weighted_score(sentiment, self.technical_buy_components(snap))
    }

    pub fn sell_score(&self, snap: &IndicatorSnapshot) -> f64 {
        let sentiment = ((1.0 - snap.sentiment_score) / 2.0).clamp(0.0, 1.0);
        self.weighted_score(sentiment, self.technical_sell_components(snap))
    }

    fn weighted_score(&self, sentiment: f64, technical: [f64; 4]) -> f64 {
        let technical = technical.iter().sum::<f64>() / technical.len() as f64;
        self.config.sentiment_weight * sentiment + self.config.technical_weight * technical
    }
}
