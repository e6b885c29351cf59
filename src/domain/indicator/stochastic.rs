//! Stochastic oscillator.
//!
//! %K = 100 × (close - lowest_low(k)) / (highest_high(k) - lowest_low(k)),
//! 50 when the range is flat. %D = SMA(d) of %K.

use super::calculate_sma;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticLines {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn calculate_stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticLines {
    let len = highs.len().min(lows.len()).min(closes.len());
    let mut k = vec![f64::NAN; len];

    if k_period > 0 && len >= k_period {
        for i in (k_period - 1)..len {
            let start = i + 1 - k_period;
            let hh = highs[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let ll = lows[start..=i].iter().copied().fold(f64::INFINITY, f64::min);
            let window_has_gap = highs[start..=i].iter().chain(&lows[start..=i]).any(|v| v.is_nan());
            if window_has_gap || closes[i].is_nan() {
                continue;
            }
            k[i] = if hh > ll {
                100.0 * (closes[i] - ll) / (hh - ll)
            } else {
                50.0
            };
        }
    }

    let d = calculate_sma(&k, d_period);
    StochasticLines { k, d }
}
