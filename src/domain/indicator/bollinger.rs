//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation. Warmup: first (n-1) bars.

use super::{calculate_sma, calculate_stddev};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let middle = calculate_sma(closes, period);
    let stddev = calculate_stddev(closes, period);

    let upper = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m + multiplier * s)
        .collect();
    let lower = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m - multiplier * s)
        .collect();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}
