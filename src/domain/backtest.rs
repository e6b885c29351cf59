//! Backtest engine and event loop.
//!
//! One run drives one [`Strategy`] over one [`MarketSeries`] bar by bar. On
//! each bar an open position is first checked against its stop-loss and
//! take-profit levels; a trigger consumes the bar. Otherwise the strategy's
//! decision for the bar is executed at the close.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::OptitraderError;
use super::indicator::default_indicators;
use super::metrics::{PerformanceMetrics, DEFAULT_PERIODS_PER_YEAR};
use super::params::ParamMap;
use super::position::Trade;
use super::series::MarketSeries;
use super::strategy::{Action, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Bars per year, used to annualize returns and ratios.
    pub periods_per_year: f64,
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
    /// Attach the default indicator set before computing signals.
    pub attach_indicators: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            risk_free_rate: 0.0,
            attach_indicators: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub strategy_type: String,
    pub parameters: ParamMap,
    pub initial_balance: f64,
    /// Cash at the end of the run.
    pub final_balance: f64,
    /// Cash plus any open position at the last valid close.
    pub portfolio_value: f64,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    pub buy_hold_return: f64,
    pub outperformance: f64,
    pub trades: Vec<Trade>,
    pub timestamps: Vec<NaiveDateTime>,
    pub prices: Vec<f64>,
    pub portfolio_values: Vec<f64>,
    pub positions: Vec<f64>,
    pub balances: Vec<f64>,
}

impl BacktestResult {
    /// Result of a run that never traded.
    fn flat(strategy: &Strategy, series: &MarketSeries) -> Self {
        let initial = strategy.initial_balance();
        let prices = series.close().map(|c| c.to_vec()).unwrap_or_default();
        let n = series.len();
        let buy_hold_return = buy_and_hold_return(&prices);
        BacktestResult {
            strategy_name: strategy.name.clone(),
            strategy_type: strategy.type_name().to_string(),
            parameters: strategy.parameters.clone(),
            initial_balance: initial,
            final_balance: initial,
            portfolio_value: initial,
            metrics: PerformanceMetrics::flat(),
            buy_hold_return,
            outperformance: -buy_hold_return,
            trades: Vec::new(),
            timestamps: series.timestamps().to_vec(),
            prices,
            portfolio_values: vec![initial; n],
            positions: vec![0.0; n],
            balances: vec![initial; n],
        }
    }
}

/// Percent change from the first to the last valid close.
pub fn buy_and_hold_return(closes: &[f64]) -> f64 {
    let mut valid = closes.iter().copied().filter(|c| !c.is_nan());
    let Some(first) = valid.next() else {
        return 0.0;
    };
    let last = valid.last().unwrap_or(first);
    if first > 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Backtester {
    pub config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Backtester { config }
    }

    /// Run every strategy over the same series, highest total return first.
    /// Equal returns keep input order.
    pub fn compare_strategies(
        &self,
        strategies: &[Strategy],
        series: &MarketSeries,
    ) -> Result<Vec<BacktestResult>, OptitraderError> {
        let mut results = strategies
            .iter()
            .map(|strategy| self.run_backtest(&mut strategy.clone(), series))
            .collect::<Result<Vec<_>, _>>()?;
        results.sort_by(|a, b| {
            b.metrics
                .total_return_percent
                .total_cmp(&a.metrics.total_return_percent)
        });
        info!(strategies = results.len(), "strategy comparison complete");
        Ok(results)
    }

    pub fn run_backtest(
        &self,
        strategy: &mut Strategy,
        series: &MarketSeries,
    ) -> Result<BacktestResult, OptitraderError> {
        series.validate_schema()?;
        strategy.reset();

        let mut data = series.clone().ensure_sorted();

        let missing = data.missing_cells();
        if missing > 0 {
            warn!(
                strategy = %strategy.name,
                missing_cells = missing,
                "missing data in price series; affected bars will HOLD"
            );
        }

        if self.config.attach_indicators {
            for indicator in default_indicators() {
                indicator.attach(&mut data)?;
            }
        }

        let prepared = strategy.calculate_signals(&data)?;
        let n = prepared.len();
        let warmup = strategy.warmup();

        if n < 2 || n <= warmup {
            info!(
                strategy = %strategy.name,
                bars = n,
                warmup,
                "not enough bars to trade; returning flat result"
            );
            return Ok(BacktestResult::flat(strategy, &prepared));
        }

        debug!(
            strategy = %strategy.name,
            strategy_type = strategy.type_name(),
            bars = n,
            "starting backtest"
        );

        let closes = prepared.close()?.to_vec();
        let mut timestamps = Vec::with_capacity(n);
        let mut prices = Vec::with_capacity(n);
        let mut portfolio_values = Vec::with_capacity(n);
        let mut positions = Vec::with_capacity(n);
        let mut balances = Vec::with_capacity(n);
        let mut last_valid_close: Option<f64> = None;

        for row in prepared.rows() {
            let timestamp = row.timestamp();
            let close = closes[row.index()];
            if !close.is_nan() {
                last_valid_close = Some(close);
            }

            let triggered = strategy.has_position()
                && !close.is_nan()
                && strategy.check_exits(timestamp, close).is_some();

            if !triggered {
                match strategy.decide_action(&row) {
                    Action::Buy => {
                        let outcome = strategy.execute_buy(timestamp, close, None);
                        debug!(%timestamp, price = close, ?outcome, "buy signal");
                    }
                    Action::Sell => {
                        if let Some(exit) = strategy.execute_sell(timestamp, close) {
                            debug!(%timestamp, price = close, pnl = exit.profit_loss, "sell signal");
                        }
                    }
                    Action::Hold => {}
                }
            }

            let mark = last_valid_close.unwrap_or(0.0);
            timestamps.push(timestamp);
            prices.push(close);
            portfolio_values.push(strategy.portfolio_value(mark));
            positions.push(strategy.portfolio().position_quantity());
            balances.push(strategy.cash());
        }

        let metrics = PerformanceMetrics::compute(
            strategy.portfolio(),
            &portfolio_values,
            self.config.periods_per_year,
            self.config.risk_free_rate,
        );
        let buy_hold_return = buy_and_hold_return(&closes);
        let portfolio_value = portfolio_values
            .last()
            .copied()
            .unwrap_or(strategy.initial_balance());

        info!(
            strategy = %strategy.name,
            trades = metrics.total_trades,
            total_return_percent = metrics.total_return_percent,
            buy_hold_return,
            "backtest complete"
        );

        Ok(BacktestResult {
            strategy_name: strategy.name.clone(),
            strategy_type: strategy.type_name().to_string(),
            parameters: strategy.parameters.clone(),
            initial_balance: strategy.initial_balance(),
            final_balance: strategy.cash(),
            portfolio_value,
            outperformance: metrics.total_return_percent - buy_hold_return,
            metrics,
            buy_hold_return,
            trades: strategy.trades().to_vec(),
            timestamps,
            prices,
            portfolio_values,
            positions,
            balances,
        })
    }
}
