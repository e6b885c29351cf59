//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = V[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) valid values are NaN.

pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut seen = 0usize;
    let mut sum = 0.0;
    let mut ema = 0.0;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        seen += 1;
        if seen < period {
            sum += v;
        } else if seen == period {
            sum += v;
            ema = sum / period as f64;
            out[i] = ema;
        } else {
            ema = v * k + ema * (1.0 - k);
            out[i] = ema;
        }
    }

    out
}
