//! One-at-a-time parameter sensitivity sweeps.

use serde::Serialize;
use tracing::info;

use super::{Metric, Optimizer};
use crate::domain::error::OptitraderError;
use crate::domain::params::{ParamMap, ParamValue};
use crate::domain::series::MarketSeries;

/// Evenly spaced sweep of one parameter between `min` and `max` inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub steps: usize,
    /// Round values and sweep them as integers.
    pub integer: bool,
}

impl ParameterRange {
    pub fn new(name: impl Into<String>, min: f64, max: f64, steps: usize, integer: bool) -> Self {
        ParameterRange {
            name: name.into(),
            min,
            max,
            steps,
            integer,
        }
    }

    /// Parse `min..max:steps`. Bounds without a decimal point sweep integers.
    pub fn parse(name: &str, raw: &str) -> Result<Self, String> {
        let (bounds, steps) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected min..max:steps, got '{raw}'"))?;
        let (lo, hi) = super::grid::split_range(bounds)?;
        let steps: usize = steps
            .trim()
            .parse()
            .map_err(|_| format!("invalid step count '{}'", steps.trim()))?;
        let integer = lo.parse::<i64>().is_ok() && hi.parse::<i64>().is_ok();
        let min: f64 = lo.parse().map_err(|_| format!("invalid bound '{lo}'"))?;
        let max: f64 = hi.parse().map_err(|_| format!("invalid bound '{hi}'"))?;
        let range = ParameterRange::new(name, min, max, steps, integer);
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.steps == 0 {
            return Err("steps must be positive".to_string());
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(format!("invalid range {}..{}", self.min, self.max));
        }
        Ok(())
    }

    /// Sweep points in increasing order. Integer sweeps drop duplicates after rounding.
    pub fn values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = if self.steps == 1 {
            vec![self.min]
        } else {
            let width = (self.max - self.min) / (self.steps - 1) as f64;
            (0..self.steps).map(|i| self.min + width * i as f64).collect()
        };
        if self.integer {
            for v in values.iter_mut() {
                *v = v.round();
            }
            values.dedup();
        }
        values
    }

    fn param_value(&self, value: f64) -> ParamValue {
        if self.integer {
            ParamValue::Int(value as i64)
        } else {
            ParamValue::Float(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSensitivity {
    pub name: String,
    pub values: Vec<f64>,
    /// Failed points score 0 here.
    pub scores: Vec<f64>,
    pub failures: usize,
    /// Pearson correlation between value and score over successful points.
    pub correlation: Option<f64>,
    pub sensitivity: f64,
    pub optimal_value: Option<f64>,
    pub optimal_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensitivityReport {
    pub strategy_type: String,
    pub metric: Metric,
    pub base_parameters: ParamMap,
    /// Ranked by absolute sensitivity, largest first.
    pub parameters: Vec<ParameterSensitivity>,
}

impl SensitivityReport {
    pub fn most_sensitive(&self) -> Option<&ParameterSensitivity> {
        self.parameters.first()
    }
}

/// Sample Pearson correlation; `None` with fewer than two points or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    Some(cov / (vx * vy).sqrt())
}

impl Optimizer<'_> {
    pub fn sensitivity_analysis(
        &self,
        strategy_type: &str,
        base: &ParamMap,
        ranges: &[ParameterRange],
        series: &MarketSeries,
    ) -> Result<SensitivityReport, OptitraderError> {
        let strategy_type = self
            .registry()
            .resolve(strategy_type)
            .ok_or_else(|| OptitraderError::UnknownStrategy {
                name: strategy_type.to_string(),
            })?
            .to_string();
        for range in ranges {
            range
                .validate()
                .map_err(|reason| OptitraderError::invalid_parameter(&range.name, reason))?;
        }

        let maximize = self.config.maximize;
        let mut parameters = Vec::with_capacity(ranges.len());
        for range in ranges {
            let values = range.values();
            let candidates: Vec<ParamMap> = values
                .iter()
                .map(|&v| base.clone().with(range.name.clone(), range.param_value(v)))
                .collect();
            let evaluations = self.evaluate_all(&strategy_type, &candidates, series);

            let mut scores = Vec::with_capacity(values.len());
            let mut ok_values = Vec::new();
            let mut ok_scores = Vec::new();
            for (value, eval) in values.iter().zip(&evaluations) {
                if eval.error.is_none() && eval.score.is_finite() {
                    scores.push(eval.score);
                    ok_values.push(*value);
                    ok_scores.push(eval.score);
                } else {
                    scores.push(0.0);
                }
            }

            let sensitivity = sweep_sensitivity(range, &ok_scores);
            let optimal = ok_values
                .iter()
                .zip(&ok_scores)
                .reduce(|best, cur| {
                    let better = if maximize { cur.1 > best.1 } else { cur.1 < best.1 };
                    if better { cur } else { best }
                })
                .map(|(v, s)| (*v, *s));

            info!(
                parameter = %range.name,
                points = values.len(),
                failures = values.len() - ok_values.len(),
                sensitivity,
                "sensitivity sweep done"
            );

            parameters.push(ParameterSensitivity {
                name: range.name.clone(),
                failures: values.len() - ok_values.len(),
                correlation: pearson(&ok_values, &ok_scores),
                sensitivity,
                optimal_value: optimal.map(|o| o.0),
                optimal_score: optimal.map(|o| o.1),
                values,
                scores,
            });
        }

        parameters.sort_by(|a, b| b.sensitivity.abs().total_cmp(&a.sensitivity.abs()));

        Ok(SensitivityReport {
            strategy_type,
            metric: self.config.metric,
            base_parameters: base.clone(),
            parameters,
        })
    }
}

/// Score spread per unit of the configured range.
fn sweep_sensitivity(range: &ParameterRange, scores: &[f64]) -> f64 {
    let width = range.max - range.min;
    if scores.len() < 2 || width <= 0.0 {
        return 0.0;
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    (max - min) / width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestConfig, Backtester};
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::optimizer::OptimizerConfig;
    use crate::domain::strategy::StrategyRegistry;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn series(n: usize) -> MarketSeries {
        let t0 = NaiveDate::from_ymd_opt(2022, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars: Vec<OhlcvBar> = (0..n)
            .map(|i| {
                let close = 80.0 + (i as f64 * 0.2).sin() * 8.0 + i as f64 * 0.05;
                OhlcvBar {
                    timestamp: t0 + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 100.0,
                }
            })
            .collect();
        MarketSeries::from_bars(&bars)
    }

    #[test]
    fn parse_integer_and_float_ranges() {
        let r = ParameterRange::parse("short_window", "5..20:4").unwrap();
        assert!(r.integer);
        assert_eq!(r.values(), vec![5.0, 10.0, 15.0, 20.0]);

        let r = ParameterRange::parse("num_std", "1.5..2.5:3").unwrap();
        assert!(!r.integer);
        assert_eq!(r.values(), vec![1.5, 2.0, 2.5]);

        assert!(ParameterRange::parse("x", "5..20").is_err());
        assert!(ParameterRange::parse("x", "20..5:3").is_err());
        assert!(ParameterRange::parse("x", "1..5:0").is_err());
    }

    #[test]
    fn integer_sweep_dedups() {
        let r = ParameterRange::new("w", 1.0, 3.0, 5, true);
        assert_eq!(r.values(), vec![1.0, 2.0, 3.0]);
        let single = ParameterRange::new("w", 7.0, 9.0, 1, true);
        assert_eq!(single.values(), vec![7.0]);
    }

    #[test]
    fn pearson_extremes() {
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0);
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0);
        assert_eq!(pearson(&[1.0, 2.0], &[5.0, 5.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn sensitivity_is_spread_ratio() {
        let range = ParameterRange::new("window", 0.0, 10.0, 3, true);
        assert_relative_eq!(sweep_sensitivity(&range, &[1.0, 4.0, 3.0]), 0.3);
        assert_eq!(sweep_sensitivity(&range, &[9.0]), 0.0);

        // Failed endpoints do not narrow the width.
        let wide = ParameterRange::new("window", 0.0, 20.0, 5, true);
        assert_relative_eq!(sweep_sensitivity(&wide, &[1.0, 4.0, 3.0]), 0.15);

        let point = ParameterRange::new("window", 5.0, 5.0, 1, true);
        assert_eq!(sweep_sensitivity(&point, &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn sweep_scores_failures_as_zero() {
        let registry = StrategyRegistry::with_defaults();
        let backtester = Backtester::new(BacktestConfig {
            attach_indicators: false,
            ..Default::default()
        });
        let opt = Optimizer::new(&registry, backtester, OptimizerConfig::default()).unwrap();
        let base = ParamMap::new().with("long_window", 20);
        let ranges = [
            ParameterRange::new("short_window", 5.0, 25.0, 5, true),
            ParameterRange::new("fee_rate", 0.0, 0.002, 3, false),
        ];
        let report = opt
            .sensitivity_analysis("moving_average", &base, &ranges, &series(150))
            .unwrap();

        assert_eq!(report.parameters.len(), 2);
        let short = report
            .parameters
            .iter()
            .find(|p| p.name == "short_window")
            .unwrap();
        // 20 and 25 are not below long_window.
        assert_eq!(short.failures, 2);
        assert_eq!(&short.scores[3..], &[0.0, 0.0]);
        assert!(short.optimal_value.unwrap() < 20.0);

        let ranked: Vec<f64> = report.parameters.iter().map(|p| p.sensitivity.abs()).collect();
        assert!(ranked[0] >= ranked[1]);
    }
}
