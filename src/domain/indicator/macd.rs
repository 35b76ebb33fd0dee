//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 bars (i.e., slow - 1 + signal - 1 for defaults)

use crate::domain::indicator::{
    calculate_ema, window_mean, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn warmup(fast: usize, slow: usize, signal_period: usize) -> usize {
    fast.max(slow).saturating_sub(1) + signal_period.saturating_sub(1)
}

pub fn calculate_macd(
    bars: &[Bar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let ema_fast = ema_raw_values(bars, fast);
    let ema_slow = ema_raw_values(bars, slow);
    let macd_line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();

    let k = 2.0 / (signal_period as f64 + 1.0);
    let mut signal_line: Vec<f64> = vec![0.0; bars.len()];
    let macd_warmup = fast.max(slow) - 1;
    let seed_end = macd_warmup + signal_period;

    if seed_end <= bars.len() {
        let mut signal_ema = window_mean(macd_line[macd_warmup..seed_end].iter().copied());
        signal_line[seed_end - 1] = signal_ema;

        for i in seed_end..bars.len() {
            signal_ema += k * (macd_line[i] - signal_ema);
            signal_line[i] = signal_ema;
        }
    }

    let signal_warmup = warmup(fast, slow, signal_period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: i >= signal_warmup,
            value: IndicatorValue::Macd {
                line: macd_line[i],
                signal: signal_line[i],
                histogram: macd_line[i] - signal_line[i],
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Line and signal values per bar, `None` inside the warm-up window.
pub fn line_and_signal(series: &IndicatorSeries) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    series
        .values
        .iter()
        .map(|p| match p.value {
            IndicatorValue::Macd { line, signal, .. } if p.valid => (Some(line), Some(signal)),
            _ => (None, None),
        })
        .unzip()
}

/// Extract raw f64 values from the EMA module, using 0.0 for warmup bars.
fn ema_raw_values(bars: &[Bar], period: usize) -> Vec<f64> {
    calculate_ema(bars, period)
        .values
        .iter()
        .map(|p| match p.value {
            IndicatorValue::Simple(v) => v,
            _ => 0.0,
        })
        .collect()
}
