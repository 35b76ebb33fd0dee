//! Price data port.

use crate::domain::error::SentiquantError;
use crate::domain::ohlcv::Bar;

pub trait PriceSource {
    /// Ordered OHLCV bars for `symbol` at `timeframe` (e.g. `1d`, `4h`).
    fn fetch_bars(&self, symbol: &str, timeframe: &str) -> Result<Vec<Bar>, SentiquantError>;
}
