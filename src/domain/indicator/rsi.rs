//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are NaN. Changes are measured between consecutive
//! non-NaN closes.

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    if period == 0 {
        return out;
    }

    let mut prev: Option<f64> = None;
    let mut changes = 0usize;
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, &close) in closes.iter().enumerate() {
        if close.is_nan() {
            continue;
        }
        if let Some(p) = prev {
            let change = close - p;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            changes += 1;

            if changes < period {
                gain_sum += gain;
                loss_sum += loss;
            } else if changes == period {
                gain_sum += gain;
                loss_sum += loss;
                avg_gain = gain_sum / period as f64;
                avg_loss = loss_sum / period as f64;
                out[i] = rsi_value(avg_gain, avg_loss);
            } else {
                avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
                avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
                out[i] = rsi_value(avg_gain, avg_loss);
            }
        }
        prev = Some(close);
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
