//! Rolling population standard deviation.
//!
//! STDDEV(n)[i] = sqrt(sum((V[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) bars are NaN, as is any window containing a NaN.

pub fn calculate_stddev(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        out[i] = variance.sqrt();
    }

    out
}
