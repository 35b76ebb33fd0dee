//! Crossover detection between two aligned series.
//!
//! A bar is a bullish cross when `a` closes above `b` and the most recent
//! non-zero difference before it was negative; bearish is the mirror image.
//! Touching without crossing (difference going to zero) is not a cross, but
//! a later move through is measured against the last non-zero side.
//! Both series must be defined on the bar and the bar before it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cross {
    Bullish,
    Bearish,
    #[default]
    None,
}

impl Cross {
    /// +1 bullish, -1 bearish, 0 otherwise.
    pub fn signal(self) -> i8 {
        match self {
            Cross::Bullish => 1,
            Cross::Bearish => -1,
            Cross::None => 0,
        }
    }
}

pub fn crossover(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<Cross>> {
    let diffs: Vec<Option<f64>> = a
        .iter()
        .zip(b)
        .map(|(x, y)| Some((*x)? - (*y)?))
        .collect();

    let mut out = Vec::with_capacity(diffs.len());
    let mut last_nonzero: Option<f64> = None;

    for i in 0..diffs.len() {
        let (Some(prev), Some(diff)) = (i.checked_sub(1).and_then(|p| diffs[p]), diffs[i]) else {
            if let Some(d) = diffs[i].filter(|d| *d != 0.0) {
                last_nonzero = Some(d);
            }
            out.push(None);
            continue;
        };

        let side = if prev != 0.0 { Some(prev) } else { last_nonzero };
        let cross = match side {
            Some(s) if s < 0.0 && diff > 0.0 => Cross::Bullish,
            Some(s) if s > 0.0 && diff < 0.0 => Cross::Bearish,
            _ => Cross::None,
        };
        if diff != 0.0 {
            last_nonzero = Some(diff);
        }
        out.push(Some(cross));
    }

    out
}
