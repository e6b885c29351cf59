//! OHLCV bar representation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        true_range(self.high, self.low, prev_close)
    }

    /// True if any price or volume field is NaN.
    pub fn has_missing(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .any(|v| v.is_nan())
    }
}

pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}
