//! Rolling walk-forward analysis.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use super::{Metric, Optimizer, ParameterGrid};
use crate::domain::backtest::BacktestResult;
use crate::domain::error::OptitraderError;
use crate::domain::params::ParamMap;
use crate::domain::series::MarketSeries;

#[derive(Debug, Clone, Serialize)]
pub struct WindowResult {
    pub index: usize,
    /// First in-sample bar.
    pub start: usize,
    /// One past the last in-sample bar.
    pub end: usize,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub best_parameters: ParamMap,
    pub in_sample_score: f64,
    pub in_sample: BacktestResult,
    /// Chosen parameters replayed over the next `step` bars.
    pub out_of_sample_score: Option<f64>,
    pub out_of_sample: Option<BacktestResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkForwardReport {
    pub strategy_type: String,
    pub metric: Metric,
    pub window_size: usize,
    pub step_size: usize,
    pub windows: Vec<WindowResult>,
}

impl WalkForwardReport {
    pub fn mean_in_sample_score(&self) -> Option<f64> {
        mean(self.windows.iter().map(|w| w.in_sample_score))
    }

    pub fn mean_out_of_sample_score(&self) -> Option<f64> {
        mean(self.windows.iter().filter_map(|w| w.out_of_sample_score))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// In-sample window starts: `0, step, 2·step, …` while `start < len − window`.
pub fn window_starts(len: usize, window: usize, step: usize) -> Vec<usize> {
    if step == 0 || len <= window {
        return Vec::new();
    }
    (0..len - window).step_by(step).collect()
}

impl Optimizer<'_> {
    pub fn walk_forward(
        &self,
        strategy_type: &str,
        grid: &ParameterGrid,
        base: &ParamMap,
        series: &MarketSeries,
        window: usize,
        step: usize,
    ) -> Result<WalkForwardReport, OptitraderError> {
        if step == 0 {
            return Err(OptitraderError::invalid_parameter(
                "step_size",
                "must be positive",
            ));
        }
        if window < 2 {
            return Err(OptitraderError::invalid_parameter(
                "window_size",
                "must be at least 2",
            ));
        }

        let data = series.clone().ensure_sorted();
        let len = data.len();
        let strategy_type = self
            .registry()
            .resolve(strategy_type)
            .ok_or_else(|| OptitraderError::UnknownStrategy {
                name: strategy_type.to_string(),
            })?
            .to_string();

        let starts = window_starts(len, window, step);
        if starts.is_empty() {
            warn!(bars = len, window, "series not longer than window; no walk-forward windows");
        }
        info!(strategy_type = %strategy_type, windows = starts.len(), window, step, "starting walk-forward");

        let metric = self.config().metric;
        let mut windows = Vec::with_capacity(starts.len());
        for (index, &start) in starts.iter().enumerate() {
            let end = start + window;
            let in_sample = data.slice(start..end);
            let search = self.grid_search(&strategy_type, grid, base, &in_sample)?;

            let oos_end = (end + step).min(len);
            let (out_of_sample_score, out_of_sample) =
                match self.run_once(&strategy_type, &search.best_parameters, &data.slice(end..oos_end)) {
                    Ok(result) => (Some(metric.extract(&result)), Some(result)),
                    Err(e) => {
                        warn!(window = index, error = %e, "out-of-sample run failed");
                        (None, None)
                    }
                };

            info!(
                window = index,
                start,
                end,
                in_sample_score = search.best_score,
                out_of_sample_score = ?out_of_sample_score,
                "walk-forward window done"
            );

            let timestamps = data.timestamps();
            windows.push(WindowResult {
                index,
                start,
                end,
                start_time: timestamps[start],
                end_time: timestamps[end - 1],
                best_parameters: search.best_parameters,
                in_sample_score: search.best_score,
                in_sample: search.best_result,
                out_of_sample_score,
                out_of_sample,
            });
        }

        Ok(WalkForwardReport {
            strategy_type,
            metric,
            window_size: window,
            step_size: step,
            windows,
        })
    }
}
