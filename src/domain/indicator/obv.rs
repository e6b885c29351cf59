//! OBV (On-Balance Volume).

/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup. Bars with a NaN close or volume are NaN and compare against
/// the last valid close.
pub fn calculate_obv(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let len = closes.len().min(volumes.len());
    let mut out = vec![f64::NAN; len];
    let mut obv = 0.0;
    let mut prev_close: Option<f64> = None;

    for i in 0..len {
        let (close, volume) = (closes[i], volumes[i]);
        if close.is_nan() || volume.is_nan() {
            continue;
        }
        match prev_close {
            None => obv = volume,
            Some(pc) if close > pc => obv += volume,
            Some(pc) if close < pc => obv -= volume,
            Some(_) => {}
        }
        prev_close = Some(close);
        out[i] = obv;
    }

    out
}
