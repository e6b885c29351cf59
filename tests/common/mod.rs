#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use optitrader::domain::error::OptitraderError;
pub use optitrader::domain::ohlcv::OhlcvBar;
use optitrader::domain::series::MarketSeries;
use optitrader::ports::data_port::DataPort;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

pub struct MockDataPort {
    pub data: HashMap<String, MarketSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, symbol: &str, series: MarketSeries) -> Self {
        self.data.insert(symbol.to_string(), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(&self, symbol: &str) -> Result<MarketSeries, OptitraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(OptitraderError::DataParse {
                reason: reason.clone(),
            });
        }
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| OptitraderError::NoData {
                symbol: symbol.to_string(),
            })
    }
}

pub fn ts(day: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(day)
}

pub fn make_bar(day: i64, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts(day),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
    }
}

pub fn series_from_closes(closes: &[f64]) -> MarketSeries {
    let bars: Vec<OhlcvBar> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c))
        .collect();
    MarketSeries::from_bars(&bars)
}

/// Rising series with a slow oscillation, enough to trigger crossovers.
pub fn wave_closes(count: usize, start_price: f64) -> Vec<f64> {
    (0..count)
        .map(|i| start_price + (i as f64 * 0.3).sin() * 10.0 + i as f64 * 0.1)
        .collect()
}

/// Series with a `predicted_price` column that forces BUY/SELL on chosen bars.
///
/// Bars listed in `buys` predict +10%, bars in `sells` predict -10%; every
/// other bar has no prediction and holds.
pub fn scripted_series(closes: &[f64], buys: &[usize], sells: &[usize]) -> MarketSeries {
    let predicted: Vec<f64> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if buys.contains(&i) {
                c * 1.10
            } else if sells.contains(&i) {
                c * 0.90
            } else {
                f64::NAN
            }
        })
        .collect();
    series_from_closes(closes)
        .with_column("predicted_price", predicted)
        .unwrap()
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn series_to_csv(series: &MarketSeries) -> String {
    let names: Vec<&str> = series.column_names().collect();
    let mut out = format!("timestamp,{}\n", names.join(","));
    for i in 0..series.len() {
        let cells: Vec<String> = names
            .iter()
            .map(|n| {
                let v = series.column(n).unwrap()[i];
                if v.is_nan() { String::new() } else { v.to_string() }
            })
            .collect();
        out.push_str(&format!(
            "{},{}\n",
            series.timestamps()[i].format("%Y-%m-%d %H:%M:%S"),
            cells.join(",")
        ));
    }
    out
}

pub fn columns(pairs: &[(&str, Vec<f64>)]) -> BTreeMap<String, Vec<f64>> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
