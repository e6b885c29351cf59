//! Report output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::OptitraderError;
use crate::domain::optimizer::{SearchResult, SensitivityReport, WalkForwardReport};

/// Port for writing run results.
pub trait ReportPort {
    fn write_backtest(&self, result: &BacktestResult, output_path: &str) -> Result<(), OptitraderError>;

    /// Results of a strategy comparison, best first.
    fn write_comparison(
        &self,
        results: &[BacktestResult],
        output_path: &str,
    ) -> Result<(), OptitraderError>;

    fn write_search(&self, result: &SearchResult, output_path: &str) -> Result<(), OptitraderError>;

    fn write_walk_forward(
        &self,
        report: &WalkForwardReport,
        output_path: &str,
    ) -> Result<(), OptitraderError>;

    fn write_sensitivity(
        &self,
        report: &SensitivityReport,
        output_path: &str,
    ) -> Result<(), OptitraderError>;
}
