//! Parameter optimization over a strategy type.
//!
//! - grid search (optionally capped) and seeded random search
//! - optional contiguous k-fold cross-validation of each candidate
//! - walk-forward analysis ([`walk_forward`])
//! - one-at-a-time sensitivity sweeps ([`sensitivity`])
//!
//! Each candidate builds its own [`Strategy`](crate::domain::strategy::Strategy)
//! from the registry and runs on the worker pool. Rankings are sorted after
//! all work completes, so thread scheduling never changes the outcome.

pub mod grid;
pub mod pool;
pub mod sensitivity;
pub mod walk_forward;

pub use grid::{ParamDistribution, ParameterGrid, ParameterSpace};
pub use pool::WorkerPool;
pub use sensitivity::{ParameterRange, ParameterSensitivity, SensitivityReport};
pub use walk_forward::{WalkForwardReport, WindowResult};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::backtest::{BacktestResult, Backtester};
use super::error::OptitraderError;
use super::params::ParamMap;
use super::series::MarketSeries;
use super::strategy::StrategyRegistry;

/// Backtest result field an optimizer ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalReturnPercent,
    SharpeRatio,
    SortinoRatio,
    CalmarRatio,
    ProfitFactor,
    WinRatePercent,
    MaxDrawdownPercent,
    FinalBalance,
    Outperformance,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::TotalReturnPercent,
        Metric::SharpeRatio,
        Metric::SortinoRatio,
        Metric::CalmarRatio,
        Metric::ProfitFactor,
        Metric::WinRatePercent,
        Metric::MaxDrawdownPercent,
        Metric::FinalBalance,
        Metric::Outperformance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::TotalReturnPercent => "total_return_percent",
            Metric::SharpeRatio => "sharpe_ratio",
            Metric::SortinoRatio => "sortino_ratio",
            Metric::CalmarRatio => "calmar_ratio",
            Metric::ProfitFactor => "profit_factor",
            Metric::WinRatePercent => "win_rate_percent",
            Metric::MaxDrawdownPercent => "max_drawdown_percent",
            Metric::FinalBalance => "final_balance",
            Metric::Outperformance => "outperformance",
        }
    }

    pub fn extract(&self, result: &BacktestResult) -> f64 {
        let m = &result.metrics;
        match self {
            Metric::TotalReturnPercent => m.total_return_percent,
            Metric::SharpeRatio => m.sharpe_ratio,
            Metric::SortinoRatio => m.sortino_ratio,
            Metric::CalmarRatio => m.calmar_ratio,
            Metric::ProfitFactor => m.profit_factor,
            Metric::WinRatePercent => m.win_rate_percent,
            Metric::MaxDrawdownPercent => m.max_drawdown_percent,
            Metric::FinalBalance => result.final_balance,
            Metric::Outperformance => result.outperformance,
        }
    }
}

impl FromStr for Metric {
    type Err = OptitraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let key = match key.as_str() {
            "max_drawdown_pct" => "max_drawdown_percent",
            "total_return" => "total_return_percent",
            "win_rate" => "win_rate_percent",
            other => other,
        };
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == key)
            .ok_or_else(|| OptitraderError::invalid_parameter("metric", format!("unknown metric '{s}'")))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub metric: Metric,
    pub maximize: bool,
    /// Upper bound on evaluated grid combinations.
    pub max_combinations: Option<usize>,
    /// 0 = every core, 1 = sequential.
    pub threads: usize,
    /// Contiguous folds per candidate; 0 or 1 disables cross-validation.
    pub cv_folds: usize,
    /// Folds shorter than this are skipped.
    pub min_fold_bars: usize,
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            metric: Metric::TotalReturnPercent,
            maximize: true,
            max_combinations: None,
            threads: 0,
            cv_folds: 0,
            min_fold_bars: 10,
            seed: 42,
        }
    }
}

/// One scored parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Position in the candidate list; breaks score ties.
    pub index: usize,
    pub parameters: ParamMap,
    pub score: f64,
    /// Standard deviation across folds when cross-validating.
    pub score_std: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub strategy_type: String,
    pub metric: Metric,
    pub maximize: bool,
    pub best_parameters: ParamMap,
    pub best_score: f64,
    pub best_result: BacktestResult,
    /// Every evaluation, best first.
    pub ranked: Vec<Evaluation>,
}

impl SearchResult {
    pub fn evaluated(&self) -> usize {
        self.ranked.len()
    }

    pub fn failures(&self) -> usize {
        self.ranked.iter().filter(|e| e.error.is_some()).count()
    }
}

pub struct Optimizer<'a> {
    registry: &'a StrategyRegistry,
    backtester: Backtester,
    config: OptimizerConfig,
    pool: WorkerPool,
}

impl<'a> Optimizer<'a> {
    pub fn new(
        registry: &'a StrategyRegistry,
        backtester: Backtester,
        config: OptimizerConfig,
    ) -> Result<Self, OptitraderError> {
        let pool = WorkerPool::new(config.threads)?;
        Ok(Optimizer {
            registry,
            backtester,
            config,
            pool,
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        self.registry
    }

    /// Score assigned to failed candidates.
    pub fn worst_score(&self) -> f64 {
        if self.config.maximize {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    }

    /// Build a fresh strategy from `params` and run it over `series`.
    pub fn run_once(
        &self,
        strategy_type: &str,
        params: &ParamMap,
        series: &MarketSeries,
    ) -> Result<BacktestResult, OptitraderError> {
        let mut strategy = self.registry.create(strategy_type, params)?;
        self.backtester.run_backtest(&mut strategy, series)
    }

    fn score_on(
        &self,
        strategy_type: &str,
        params: &ParamMap,
        series: &MarketSeries,
    ) -> Result<f64, OptitraderError> {
        let result = self.run_once(strategy_type, params, series)?;
        Ok(self.config.metric.extract(&result))
    }

    /// Score one candidate, cross-validated when configured.
    fn score(
        &self,
        strategy_type: &str,
        params: &ParamMap,
        series: &MarketSeries,
    ) -> Result<(f64, Option<f64>), OptitraderError> {
        let k = self.config.cv_folds;
        if k < 2 {
            return Ok((self.score_on(strategy_type, params, series)?, None));
        }

        let len = series.len();
        let fold = len / k;
        let mut scores = Vec::with_capacity(k);
        for i in 0..k {
            let start = i * fold;
            let end = if i == k - 1 { len } else { start + fold };
            if end - start < self.config.min_fold_bars {
                continue;
            }
            scores.push(self.score_on(strategy_type, params, &series.slice(start..end))?);
        }

        if scores.is_empty() {
            debug!(
                bars = len,
                folds = k,
                min_fold_bars = self.config.min_fold_bars,
                "no fold long enough; scoring worst"
            );
            return Ok((self.worst_score(), Some(0.0)));
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
        Ok((mean, Some(std)))
    }

    /// Score every candidate on the pool. Failures are logged and scored worst.
    fn evaluate_all(
        &self,
        strategy_type: &str,
        candidates: &[ParamMap],
        series: &MarketSeries,
    ) -> Vec<Evaluation> {
        let worst = self.worst_score();
        self.pool.map(candidates, |index, params| {
            match self.score(strategy_type, params, series) {
                Ok((score, score_std)) => Evaluation {
                    index,
                    parameters: params.clone(),
                    score: if score.is_nan() { worst } else { score },
                    score_std,
                    error: None,
                },
                Err(e) => {
                    warn!(strategy_type, parameters = %params, error = %e, "candidate failed");
                    Evaluation {
                        index,
                        parameters: params.clone(),
                        score: worst,
                        score_std: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
    }

    /// Best first per `maximize`; equal scores keep candidate order.
    fn rank(&self, mut evaluations: Vec<Evaluation>) -> Vec<Evaluation> {
        let maximize = self.config.maximize;
        evaluations.sort_by(|a, b| {
            let by_score = if maximize {
                b.score.total_cmp(&a.score)
            } else {
                a.score.total_cmp(&b.score)
            };
            by_score.then(a.index.cmp(&b.index))
        });
        evaluations
    }

    fn search(
        &self,
        strategy_type: &str,
        candidates: Vec<ParamMap>,
        series: &MarketSeries,
    ) -> Result<SearchResult, OptitraderError> {
        let canonical = self
            .registry
            .resolve(strategy_type)
            .ok_or_else(|| OptitraderError::UnknownStrategy {
                name: strategy_type.to_string(),
            })?
            .to_string();

        if candidates.is_empty() {
            return Err(OptitraderError::Optimization {
                reason: "no parameter combinations to evaluate".to_string(),
            });
        }

        // Folds are cut by position, so rows must be in time order first.
        let series: Cow<'_, MarketSeries> = if series.is_sorted() {
            Cow::Borrowed(series)
        } else {
            Cow::Owned(series.clone().ensure_sorted())
        };
        let series = series.as_ref();

        info!(
            strategy_type = %canonical,
            candidates = candidates.len(),
            metric = %self.config.metric,
            threads = self.pool.threads(),
            "starting parameter search"
        );

        let ranked = self.rank(self.evaluate_all(&canonical, &candidates, series));
        let best = ranked
            .iter()
            .find(|e| e.error.is_none())
            .ok_or_else(|| OptitraderError::Optimization {
                reason: format!("all {} parameter combinations failed", ranked.len()),
            })?;

        let best_parameters = best.parameters.clone();
        let best_score = best.score;
        let best_result = self.run_once(&canonical, &best_parameters, series)?;

        info!(
            strategy_type = %canonical,
            best_score,
            best_parameters = %best_parameters,
            "parameter search complete"
        );

        Ok(SearchResult {
            strategy_type: canonical,
            metric: self.config.metric,
            maximize: self.config.maximize,
            best_parameters,
            best_score,
            best_result,
            ranked,
        })
    }

    /// Exhaustive search over `grid`, each combination layered over `base`.
    pub fn grid_search(
        &self,
        strategy_type: &str,
        grid: &ParameterGrid,
        base: &ParamMap,
        series: &MarketSeries,
    ) -> Result<SearchResult, OptitraderError> {
        let total = grid.combination_count();
        let candidates: Vec<ParamMap> = grid
            .combinations(self.config.max_combinations)
            .iter()
            .map(|combo| base.merged(combo))
            .collect();
        if candidates.len() < total {
            info!(
                total,
                evaluated = candidates.len(),
                "grid larger than max_combinations; sampling evenly"
            );
        }
        self.search(strategy_type, candidates, series)
    }

    /// `samples` independent draws from `space`, reproducible from the seed.
    pub fn random_search(
        &self,
        strategy_type: &str,
        space: &ParameterSpace,
        samples: usize,
        base: &ParamMap,
        series: &MarketSeries,
    ) -> Result<SearchResult, OptitraderError> {
        grid::require_non_empty(space.is_empty(), "parameter space")?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let candidates: Vec<ParamMap> = (0..samples)
            .map(|_| base.merged(&space.sample(&mut rng)))
            .collect();
        debug!(samples, seed = self.config.seed, "drew random candidates");
        self.search(strategy_type, candidates, series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::BacktestConfig;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::params::ParamValue;
    use chrono::NaiveDate;

    fn wave_series(n: usize) -> MarketSeries {
        MarketSeries::from_bars(&wave_bars(n))
    }

    fn wave_bars(n: usize) -> Vec<OhlcvBar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 10.0 + i as f64 * 0.1;
                OhlcvBar {
                    timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                        + chrono::Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn optimizer(registry: &StrategyRegistry, config: OptimizerConfig) -> Optimizer<'_> {
        let backtester = Backtester::new(BacktestConfig {
            attach_indicators: false,
            ..Default::default()
        });
        Optimizer::new(registry, backtester, config).unwrap()
    }

    fn ma_grid() -> ParameterGrid {
        ParameterGrid::new()
            .with("short_window", [3, 5, 8])
            .with("long_window", [10, 20])
    }

    #[test]
    fn metric_parse_and_name() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
        assert_eq!("Sharpe_Ratio".parse::<Metric>().unwrap(), Metric::SharpeRatio);
        assert_eq!("win_rate".parse::<Metric>().unwrap(), Metric::WinRatePercent);
        assert!("alpha".parse::<Metric>().is_err());
    }

    #[test]
    fn grid_search_ranks_best_first() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(&registry, OptimizerConfig::default());
        let result = opt
            .grid_search("ma", &ma_grid(), &ParamMap::new(), &wave_series(120))
            .unwrap();
        assert_eq!(result.strategy_type, "moving_average");
        assert_eq!(result.evaluated(), 6);
        let scores: Vec<f64> = result.ranked.iter().map(|e| e.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(result.best_score, scores[0]);
        assert_eq!(
            Metric::TotalReturnPercent.extract(&result.best_result),
            result.best_score
        );
    }

    #[test]
    fn minimize_reverses_order() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(
            &registry,
            OptimizerConfig {
                maximize: false,
                metric: Metric::MaxDrawdownPercent,
                ..Default::default()
            },
        );
        let result = opt
            .grid_search("ma", &ma_grid(), &ParamMap::new(), &wave_series(120))
            .unwrap();
        let scores: Vec<f64> = result.ranked.iter().map(|e| e.score).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn invalid_combinations_score_worst() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(&registry, OptimizerConfig::default());
        let grid = ParameterGrid::new()
            .with("short_window", [5, 30])
            .with("long_window", [20]);
        let result = opt
            .grid_search("ma", &grid, &ParamMap::new(), &wave_series(80))
            .unwrap();
        let last = result.ranked.last().unwrap();
        assert_eq!(last.score, f64::NEG_INFINITY);
        assert!(last.error.is_some());
        assert_eq!(last.parameters.get("short_window"), Some(&ParamValue::Int(30)));
        assert_eq!(result.failures(), 1);
    }

    #[test]
    fn all_failures_is_an_error() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(&registry, OptimizerConfig::default());
        let grid = ParameterGrid::new().with("short_window", [50]).with("long_window", [20]);
        let err = opt
            .grid_search("ma", &grid, &ParamMap::new(), &wave_series(80))
            .unwrap_err();
        assert!(matches!(err, OptitraderError::Optimization { .. }));
    }

    #[test]
    fn cap_limits_evaluations() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(
            &registry,
            OptimizerConfig {
                max_combinations: Some(4),
                ..Default::default()
            },
        );
        let result = opt
            .grid_search("ma", &ma_grid(), &ParamMap::new(), &wave_series(100))
            .unwrap();
        assert_eq!(result.evaluated(), 4);
    }

    #[test]
    fn unknown_strategy_fails_fast() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(&registry, OptimizerConfig::default());
        let err = opt
            .grid_search("turtle", &ma_grid(), &ParamMap::new(), &wave_series(50))
            .unwrap_err();
        assert!(matches!(err, OptitraderError::UnknownStrategy { .. }));
    }

    #[test]
    fn parallel_matches_sequential() {
        let registry = StrategyRegistry::with_defaults();
        let series = wave_series(150);
        let seq = optimizer(
            &registry,
            OptimizerConfig {
                threads: 1,
                ..Default::default()
            },
        )
        .grid_search("ma", &ma_grid(), &ParamMap::new(), &series)
        .unwrap();
        let par = optimizer(
            &registry,
            OptimizerConfig {
                threads: 4,
                ..Default::default()
            },
        )
        .grid_search("ma", &ma_grid(), &ParamMap::new(), &series)
        .unwrap();
        assert_eq!(seq.ranked, par.ranked);
        assert_eq!(seq.best_parameters, par.best_parameters);
    }

    #[test]
    fn random_search_is_reproducible() {
        let registry = StrategyRegistry::with_defaults();
        let space = ParameterSpace::new()
            .with("short_window", ParamDistribution::IntRange { low: 2, high: 8 })
            .with("long_window", ParamDistribution::IntRange { low: 10, high: 30 });
        let series = wave_series(120);
        let run = || {
            optimizer(&registry, OptimizerConfig::default())
                .random_search("ma", &space, 6, &ParamMap::new(), &series)
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.evaluated(), 6);
        assert_eq!(a.ranked, b.ranked);
    }

    #[test]
    fn random_search_rejects_empty_space() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(&registry, OptimizerConfig::default());
        let err = opt
            .random_search("ma", &ParameterSpace::new(), 5, &ParamMap::new(), &wave_series(50))
            .unwrap_err();
        assert!(matches!(err, OptitraderError::Optimization { .. }));
    }

    #[test]
    fn cross_validation_reports_spread() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(
            &registry,
            OptimizerConfig {
                cv_folds: 3,
                min_fold_bars: 10,
                ..Default::default()
            },
        );
        let result = opt
            .grid_search("ma", &ma_grid(), &ParamMap::new(), &wave_series(150))
            .unwrap();
        assert!(result.ranked.iter().all(|e| e.score_std.is_some()));
    }

    #[test]
    fn cross_validation_folds_follow_time_order() {
        let registry = StrategyRegistry::with_defaults();
        let config = OptimizerConfig {
            cv_folds: 2,
            ..Default::default()
        };
        let grid = ParameterGrid::new().with("short_window", [3]).with("long_window", [8]);

        let bars = wave_bars(120);
        let interleaved: Vec<OhlcvBar> = bars
            .iter()
            .step_by(2)
            .chain(bars.iter().skip(1).step_by(2))
            .cloned()
            .collect();

        let sorted = optimizer(&registry, config.clone())
            .grid_search("ma", &grid, &ParamMap::new(), &MarketSeries::from_bars(&bars))
            .unwrap();
        let shuffled = optimizer(&registry, config)
            .grid_search("ma", &grid, &ParamMap::new(), &MarketSeries::from_bars(&interleaved))
            .unwrap();
        assert_eq!(sorted.best_score, shuffled.best_score);
        assert_eq!(sorted.ranked[0].score_std, shuffled.ranked[0].score_std);
    }

    #[test]
    fn folds_too_short_score_worst_without_failing() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(
            &registry,
            OptimizerConfig {
                cv_folds: 3,
                min_fold_bars: 100,
                ..Default::default()
            },
        );
        let result = opt
            .grid_search("ma", &ma_grid(), &ParamMap::new(), &wave_series(120))
            .unwrap();
        assert_eq!(result.failures(), 0);
        for e in &result.ranked {
            assert_eq!(e.score, f64::NEG_INFINITY);
            assert_eq!(e.score_std, Some(0.0));
        }
        assert_eq!(result.ranked[0].index, 0);
        assert_eq!(result.best_result.prices.len(), 120);
    }

    #[test]
    fn base_parameters_are_kept() {
        let registry = StrategyRegistry::with_defaults();
        let opt = optimizer(&registry, OptimizerConfig::default());
        let base = ParamMap::new().with("fee_rate", 0.0).with("short_window", 99);
        let result = opt
            .grid_search("ma", &ma_grid(), &base, &wave_series(100))
            .unwrap();
        assert_eq!(result.best_parameters.get("fee_rate"), Some(&ParamValue::Float(0.0)));
        // Grid values override base values.
        assert_ne!(result.best_parameters.get("short_window"), Some(&ParamValue::Int(99)));
    }
}
