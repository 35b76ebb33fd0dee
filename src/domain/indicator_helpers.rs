//! Indicator precomputation and per-bar snapshots.
//!
//! All series are computed once over the full bar sequence and keyed by
//! [`IndicatorType`]. Every indicator value at bar `i` depends only on bars
//! `0..=i`, so reading a snapshot at `i` never looks ahead.

use std::collections::HashMap;

use crate::domain::alignment::AlignedBar;
use crate::domain::indicator::{
    band_position, bollinger, calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma,
    crossover, macd, Cross, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_devs: f64,
}

impl IndicatorParams {
    fn rsi_type(&self) -> IndicatorType {
        IndicatorType::Rsi(self.rsi_period)
    }

    fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    fn bollinger_type(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bb_period,
            stddev_mult_x100: bollinger::mult_x100(self.bb_devs),
        }
    }

    /// First bar index at which the RSI is defined.
    pub fn rsi_ready(&self) -> usize {
        self.rsi_period
    }

    /// First bar index at which the moving-average crossover is defined.
    pub fn ma_cross_ready(&self) -> usize {
        self.sma_fast.max(self.sma_slow)
    }

    /// First bar index at which the MACD crossover is defined.
    pub fn macd_cross_ready(&self) -> usize {
        macd::warmup(self.macd_fast, self.macd_slow, self.macd_signal) + 1
    }

    pub fn bollinger_ready(&self) -> usize {
        self.bb_period.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaSnapshot {
    pub fast: f64,
    pub slow: f64,
    pub cross: Cross,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdSnapshot {
    pub line: f64,
    pub signal: f64,
    pub cross: Cross,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerSnapshot {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub position: f64,
}

/// Everything a strategy may read at one bar. A component is `None` until
/// it (and, for crossovers, the bar before it) is past warm-up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub sentiment_score: f64,
    pub rsi: Option<f64>,
    pub ma: Option<MaSnapshot>,
    pub macd: Option<MacdSnapshot>,
    pub bollinger: Option<BollingerSnapshot>,
}

impl IndicatorSnapshot {
    /// A snapshot with no indicator values, only price and sentiment.
    pub fn bare(close: f64, sentiment_score: f64) -> Self {
        IndicatorSnapshot {
            close,
            sentiment_score,
            rsi: None,
            ma: None,
            macd: None,
            bollinger: None,
        }
    }
}

/// Precomputed indicator series for one bar sequence.
pub struct IndicatorSet {
    params: IndicatorParams,
    series: HashMap<IndicatorType, IndicatorSeries>,
    ma_cross: Vec<Option<Cross>>,
    macd_cross: Vec<Option<Cross>>,
}

impl IndicatorSet {
    pub fn compute(bars: &[Bar], params: &IndicatorParams) -> Self {
        let mut series = HashMap::new();

        let sma_fast = calculate_sma(bars, params.sma_fast);
        let sma_slow = calculate_sma(bars, params.sma_slow);
        let ma_cross = crossover(&sma_fast.simple_values(), &sma_slow.simple_values());

        let macd_series = calculate_macd(bars, params.macd_fast, params.macd_slow, params.macd_signal);
        let (line, signal) = macd::line_and_signal(&macd_series);
        let macd_cross = crossover(&line, &signal);

        let bb = calculate_bollinger(bars, params.bb_period, bollinger::mult_x100(params.bb_devs));

        series.insert(params.rsi_type(), calculate_rsi(bars, params.rsi_period));
        series.insert(sma_fast.indicator_type.clone(), sma_fast);
        series.insert(sma_slow.indicator_type.clone(), sma_slow);
        series.insert(params.macd_type(), macd_series);
        series.insert(params.bollinger_type(), bb);

        IndicatorSet {
            params: params.clone(),
            series,
            ma_cross,
            macd_cross,
        }
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.get(indicator_type)
    }

    fn value_at(&self, indicator_type: &IndicatorType, index: usize) -> Option<&IndicatorValue> {
        let point = self.series.get(indicator_type)?.values.get(index)?;
        point.valid.then_some(&point.value)
    }

    fn simple_at(&self, indicator_type: &IndicatorType, index: usize) -> Option<f64> {
        match self.value_at(indicator_type, index)? {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }

    pub fn snapshot(&self, aligned: &AlignedBar, index: usize) -> IndicatorSnapshot {
        let close = aligned.bar.close;
        let p = &self.params;

        let rsi = self.simple_at(&p.rsi_type(), index);

        let ma = self.ma_cross.get(index).copied().flatten().and_then(|cross| {
            Some(MaSnapshot {
                fast: self.simple_at(&IndicatorType::Sma(p.sma_fast), index)?,
                slow: self.simple_at(&IndicatorType::Sma(p.sma_slow), index)?,
                cross,
            })
        });

        let macd = self.macd_cross.get(index).copied().flatten().and_then(|cross| {
            match self.value_at(&p.macd_type(), index)? {
                IndicatorValue::Macd { line, signal, .. } => Some(MacdSnapshot {
                    line: *line,
                    signal: *signal,
                    cross,
                }),
                _ => None,
            }
        });

        let bollinger = match self.value_at(&p.bollinger_type(), index) {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) => Some(BollingerSnapshot {
                upper: *upper,
                middle: *middle,
                lower: *lower,
                position: band_position(close, *upper, *lower),
            }),
            _ => None,
        };

        IndicatorSnapshot {
            close,
            sentiment_score: aligned.sentiment_score,
            rsi,
            ma,
            macd,
            bollinger,
        }
    }
}
