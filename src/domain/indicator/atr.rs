//! Average True Range with Wilder's smoothing.
//!
//! TR[0] = high - low, TR[i] = max(high - low, |high - prev_close|, |low - prev_close|).
//! Seed with the mean of the first n true ranges, then
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n. Warmup: first (n-1) bars.

use crate::domain::ohlcv::true_range;

pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let len = highs.len().min(lows.len()).min(closes.len());
    let mut out = vec![f64::NAN; len];
    if period == 0 {
        return out;
    }

    let mut prev_close: Option<f64> = None;
    let mut seen = 0usize;
    let mut sum = 0.0;
    let mut atr = 0.0;

    for i in 0..len {
        let (high, low, close) = (highs[i], lows[i], closes[i]);
        if high.is_nan() || low.is_nan() || close.is_nan() {
            continue;
        }
        let tr = match prev_close {
            Some(pc) => true_range(high, low, pc),
            None => high - low,
        };
        prev_close = Some(close);
        seen += 1;

        if seen < period {
            sum += tr;
        } else if seen == period {
            sum += tr;
            atr = sum / period as f64;
            out[i] = atr;
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
            out[i] = atr;
        }
    }

    out
}
