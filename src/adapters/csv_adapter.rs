//! CSV file data adapter.

use crate::domain::error::OptitraderError;
use crate::domain::series::{MarketSeries, REQUIRED_COLUMNS};
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TIMESTAMP_HEADERS: [&str; 3] = ["timestamp", "date", "datetime"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Reads `<symbol>.csv` files from a directory.
pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Load one file. The series comes back sorted by timestamp.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<MarketSeries, OptitraderError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| OptitraderError::DataParse {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let series = parse_csv(&content)?;
        info!(path = %path.display(), bars = series.len(), "loaded price series");
        Ok(series)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_series(&self, symbol: &str) -> Result<MarketSeries, OptitraderError> {
        let series = Self::load_file(self.csv_path(symbol))?;
        if series.is_empty() {
            return Err(OptitraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(series)
    }
}

/// Parse CSV text with a header row into a series.
///
/// Required price columns must be present. Extra columns are kept when every
/// cell parses as a number; empty and `NaN` cells load as NaN.
pub fn parse_csv(content: &str) -> Result<MarketSeries, OptitraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| OptitraderError::DataParse {
            reason: format!("CSV header error: {}", e),
        })?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let ts_index = headers
        .iter()
        .position(|h| TIMESTAMP_HEADERS.contains(&h.as_str()));

    let mut missing: Vec<String> = Vec::new();
    if ts_index.is_none() {
        missing.push("timestamp".to_string());
    }
    missing.extend(
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .map(|c| c.to_string()),
    );
    let Some(ts_index) = ts_index else {
        return Err(OptitraderError::Schema { missing });
    };
    if !missing.is_empty() {
        return Err(OptitraderError::Schema { missing });
    }

    let mut timestamps = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut numeric = vec![true; headers.len()];

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| OptitraderError::DataParse {
            reason: format!("CSV parse error: {}", e),
        })?;
        let row = line + 2;

        let raw_ts = record.get(ts_index).unwrap_or_default();
        timestamps.push(parse_timestamp(raw_ts).ok_or_else(|| OptitraderError::DataParse {
            reason: format!("row {}: invalid timestamp '{}'", row, raw_ts),
        })?);

        for (col, header) in headers.iter().enumerate() {
            if col == ts_index || !numeric[col] {
                continue;
            }
            let cell = record.get(col).unwrap_or_default();
            match parse_cell(cell) {
                Some(v) => values[col].push(v),
                None if REQUIRED_COLUMNS.contains(&header.as_str()) => {
                    return Err(OptitraderError::DataParse {
                        reason: format!("row {}: invalid {} value '{}'", row, header, cell),
                    });
                }
                None => {
                    debug!(column = %header, row, "dropping non-numeric column");
                    numeric[col] = false;
                }
            }
        }
    }

    let columns: BTreeMap<String, Vec<f64>> = headers
        .into_iter()
        .zip(values)
        .enumerate()
        .filter(|(col, _)| *col != ts_index && numeric[*col])
        .map(|(_, pair)| pair)
        .collect();

    Ok(MarketSeries::from_columns(timestamps, columns)?.ensure_sorted())
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

/// Accepts datetime, ISO `T`-separated datetime, plain date, or unix seconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
}
