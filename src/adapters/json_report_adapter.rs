//! JSON report adapter.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::OptitraderError;
use crate::domain::optimizer::{SearchResult, SensitivityReport, WalkForwardReport};
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing::info;

/// Writes results as JSON. An output path of `-` writes to stdout.
#[derive(Debug, Clone)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn to_string<T: Serialize>(&self, value: &T) -> Result<String, OptitraderError> {
        let out = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(out)
    }

    fn write_value<T: Serialize + ?Sized>(&self, value: &T, output_path: &str) -> Result<(), OptitraderError> {
        if output_path == "-" {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            self.write_to(&mut handle, value)?;
            writeln!(handle)?;
            return Ok(());
        }
        let mut writer = BufWriter::new(File::create(output_path)?);
        self.write_to(&mut writer, value)?;
        writer.flush()?;
        info!(path = output_path, "report written");
        Ok(())
    }

    fn write_to<W: Write, T: Serialize + ?Sized>(&self, writer: W, value: &T) -> Result<(), OptitraderError> {
        if self.pretty {
            serde_json::to_writer_pretty(writer, value)?;
        } else {
            serde_json::to_writer(writer, value)?;
        }
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtest(&self, result: &BacktestResult, output_path: &str) -> Result<(), OptitraderError> {
        self.write_value(result, output_path)
    }

    fn write_comparison(
        &self,
        results: &[BacktestResult],
        output_path: &str,
    ) -> Result<(), OptitraderError> {
        self.write_value(results, output_path)
    }

    fn write_search(&self, result: &SearchResult, output_path: &str) -> Result<(), OptitraderError> {
        self.write_value(result, output_path)
    }

    fn write_walk_forward(
        &self,
        report: &WalkForwardReport,
        output_path: &str,
    ) -> Result<(), OptitraderError> {
        self.write_value(report, output_path)
    }

    fn write_sensitivity(
        &self,
        report: &SensitivityReport,
        output_path: &str,
    ) -> Result<(), OptitraderError> {
        self.write_value(report, output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::Backtester;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::params::ParamMap;
    use crate::domain::series::MarketSeries;
    use crate::domain::strategy::StrategyRegistry;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_result() -> BacktestResult {
        let bars: Vec<OhlcvBar> = (0..30)
            .map(|i| {
                let close = 100.0 + (i % 7) as f64;
                OhlcvBar {
                    timestamp: NaiveDate::from_ymd_opt(2024, 2, 1)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                        + chrono::Duration::days(i),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1.0,
                }
            })
            .collect();
        let params = ParamMap::new().with("short_window", 2).with("long_window", 5);
        let mut strategy = StrategyRegistry::with_defaults()
            .create("moving_average", &params)
            .unwrap();
        Backtester::default()
            .run_backtest(&mut strategy, &MarketSeries::from_bars(&bars))
            .unwrap()
    }

    #[test]
    fn writes_pretty_backtest_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        let adapter = JsonReportAdapter::default();
        adapter
            .write_backtest(&sample_result(), path.to_str().unwrap())
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"strategy_name\""));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["strategy_type"], "moving_average");
        assert_eq!(value["parameters"]["short_window"], 2);
        assert!(value["total_trades"].is_u64());
        assert_eq!(value["portfolio_values"].as_array().unwrap().len(), 30);
    }

    #[test]
    fn comparison_is_a_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compare.json");
        let results = vec![sample_result(), sample_result()];
        JsonReportAdapter::default()
            .write_comparison(&results, path.to_str().unwrap())
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["strategy_type"], "moving_average");
    }

    #[test]
    fn compact_output_is_single_line() {
        let adapter = JsonReportAdapter::new(false);
        let text = adapter.to_string(&sample_result()).unwrap();
        assert!(!text.contains('\n'));
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let adapter = JsonReportAdapter::default();
        let err = adapter
            .write_backtest(&sample_result(), "/nonexistent/dir/out.json")
            .unwrap_err();
        assert!(matches!(err, OptitraderError::Io(_)));
    }
}
