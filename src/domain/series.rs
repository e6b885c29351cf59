//! Column-oriented price series.
//!
//! A [`MarketSeries`] holds a timestamp index plus named `f64` columns of
//! equal length. Prices live in the `open`/`high`/`low`/`close`/`volume`
//! columns; indicators and signals are appended as extra columns. Missing
//! values are stored as NaN.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::warn;

use super::error::OptitraderError;
use super::ohlcv::OhlcvBar;

pub const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSeries {
    timestamps: Vec<NaiveDateTime>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl MarketSeries {
    pub fn from_bars(bars: &[OhlcvBar]) -> Self {
        let mut open = Vec::with_capacity(bars.len());
        let mut high = Vec::with_capacity(bars.len());
        let mut low = Vec::with_capacity(bars.len());
        let mut close = Vec::with_capacity(bars.len());
        let mut volume = Vec::with_capacity(bars.len());
        let mut timestamps = Vec::with_capacity(bars.len());

        for bar in bars {
            timestamps.push(bar.timestamp);
            open.push(bar.open);
            high.push(bar.high);
            low.push(bar.low);
            close.push(bar.close);
            volume.push(bar.volume);
        }

        let mut columns = BTreeMap::new();
        columns.insert("open".to_string(), open);
        columns.insert("high".to_string(), high);
        columns.insert("low".to_string(), low);
        columns.insert("close".to_string(), close);
        columns.insert("volume".to_string(), volume);

        MarketSeries {
            timestamps,
            columns,
        }
    }

    /// Build a series from raw columns. Every column must match the index length.
    pub fn from_columns(
        timestamps: Vec<NaiveDateTime>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, OptitraderError> {
        for (name, values) in &columns {
            if values.len() != timestamps.len() {
                return Err(OptitraderError::SeriesLength {
                    column: name.clone(),
                    expected: timestamps.len(),
                    actual: values.len(),
                });
            }
        }
        Ok(MarketSeries {
            timestamps,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn timestamp(&self, index: usize) -> Option<NaiveDateTime> {
        self.timestamps.get(index).copied()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Column lookup that reports a schema error when absent.
    pub fn require(&self, name: &str) -> Result<&[f64], OptitraderError> {
        self.column(name).ok_or_else(|| OptitraderError::Schema {
            missing: vec![name.to_string()],
        })
    }

    pub fn close(&self) -> Result<&[f64], OptitraderError> {
        self.require("close")
    }

    /// Check that every required OHLCV column is present.
    pub fn validate_schema(&self) -> Result<(), OptitraderError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !self.columns.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(OptitraderError::Schema { missing })
        }
    }

    /// Number of NaN cells across the required OHLCV columns.
    pub fn missing_cells(&self) -> usize {
        REQUIRED_COLUMNS
            .iter()
            .filter_map(|c| self.columns.get(*c))
            .map(|values| values.iter().filter(|v| v.is_nan()).count())
            .sum()
    }

    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), OptitraderError> {
        let name = name.into();
        if values.len() != self.timestamps.len() {
            return Err(OptitraderError::SeriesLength {
                column: name,
                expected: self.timestamps.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, OptitraderError> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// True when timestamps are strictly increasing.
    pub fn is_sorted(&self) -> bool {
        self.timestamps.windows(2).all(|w| w[0] < w[1])
    }

    /// Sort by timestamp and drop duplicate timestamps, keeping the first row seen.
    pub fn ensure_sorted(self) -> Self {
        if self.is_sorted() {
            return self;
        }

        let mut order: Vec<usize> = (0..self.timestamps.len()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);
        let before = order.len();
        order.dedup_by_key(|i| self.timestamps[*i]);
        let dropped = before - order.len();

        warn!(
            rows = before,
            duplicates_dropped = dropped,
            "price series was not in ascending timestamp order; re-sorted"
        );

        let timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        let columns = self
            .columns
            .into_iter()
            .map(|(name, values)| {
                let reordered = order.iter().map(|&i| values[i]).collect();
                (name, reordered)
            })
            .collect();

        MarketSeries {
            timestamps,
            columns,
        }
    }

    /// Copy of the rows in `range`, clamped to the series bounds.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        MarketSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[start..end].to_vec()))
                .collect(),
        }
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        if index < self.len() {
            Some(Row {
                series: self,
                index,
            })
        } else {
            None
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.len()).map(move |index| Row {
            series: self,
            index,
        })
    }

    pub fn bar(&self, index: usize) -> Option<OhlcvBar> {
        let value = |name: &str| {
            self.column(name)
                .and_then(|c| c.get(index).copied())
                .unwrap_or(f64::NAN)
        };
        Some(OhlcvBar {
            timestamp: self.timestamp(index)?,
            open: value("open"),
            high: value("high"),
            low: value("low"),
            close: value("close"),
            volume: value("volume"),
        })
    }
}

/// A view of one bar of a series, with access to the bar before it.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    series: &'a MarketSeries,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.series.timestamps[self.index]
    }

    pub fn series(&self) -> &'a MarketSeries {
        self.series
    }

    /// Value of `column` on this bar. `None` if the column is absent or the cell is NaN.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.value_at(column, self.index)
    }

    /// Value of `column` on the previous bar.
    pub fn previous(&self, column: &str) -> Option<f64> {
        let index = self.index.checked_sub(1)?;
        self.value_at(column, index)
    }

    pub fn close(&self) -> Option<f64> {
        self.value("close")
    }

    fn value_at(&self, column: &str, index: usize) -> Option<f64> {
        self.series
            .column(column)
            .and_then(|c| c.get(index).copied())
            .filter(|v| !v.is_nan())
    }
}
