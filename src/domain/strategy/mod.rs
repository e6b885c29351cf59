//! Trading strategies.
//!
//! A [`Strategy`] couples a decision rule ([`StrategyKind`]) with its own
//! portfolio and execution settings. Every variant implements [`SignalRule`]:
//! it names the indicator columns it reads and decides one bar at a time from
//! a [`Row`]. The vectorized `signal` column produced by
//! [`Strategy::calculate_signals`] is built from the same per-row rule, so the
//! two never disagree.

pub mod bollinger;
pub mod ensemble;
pub mod ma_crossover;
pub mod macd;
pub mod model_signal;
pub mod registry;
pub mod rsi;

pub use bollinger::BollingerReversion;
pub use ensemble::EnsembleStrategy;
pub use ma_crossover::MaCrossover;
pub use macd::MacdCrossover;
pub use model_signal::ModelSignalStrategy;
pub use registry::{
    execution_from_params, StrategyBuilder, StrategyRegistry, COMMON_PARAMETERS,
    DEFAULT_INITIAL_BALANCE,
};
pub use rsi::RsiReversion;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use super::error::OptitraderError;
use super::execution::{
    check_triggers, enter_long, exit_long, EntryResult, ExecutionConfig, ExitResult,
};
use super::indicator::IndicatorType;
use super::params::ParamMap;
use super::portfolio::Portfolio;
use super::position::{Position, Trade, TradeReason};
use super::series::{MarketSeries, Row};
use super::signal::{Signal, SignalSource};

/// Column written by [`Strategy::calculate_signals`].
pub const SIGNAL_COLUMN: &str = "signal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Hold,
    Buy,
    Sell,
}

impl Action {
    /// +1 / -1 / 0 encoding used in the `signal` column.
    pub fn signal_value(&self) -> f64 {
        match self {
            Action::Buy => 1.0,
            Action::Sell => -1.0,
            Action::Hold => 0.0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "HOLD"),
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

/// `left` crossed above `right` between the previous bar and this one.
pub(crate) fn crossed_above(prev_diff: f64, diff: f64) -> bool {
    diff > 0.0 && prev_diff <= 0.0
}

pub(crate) fn crossed_below(prev_diff: f64, diff: f64) -> bool {
    diff < 0.0 && prev_diff >= 0.0
}

/// Per-bar decision rule implemented by every strategy variant.
pub trait SignalRule {
    /// Indicator columns the rule reads.
    fn indicators(&self) -> Vec<IndicatorType>;

    /// Bars that must pass before the rule can first act.
    fn warmup(&self) -> usize;

    fn evaluate(&self, row: &Row<'_>) -> Action;

    /// Copy of `series` with every column the rule reads attached.
    fn prepare(&self, series: &MarketSeries) -> Result<MarketSeries, OptitraderError> {
        let mut prepared = series.clone();
        for indicator in self.indicators() {
            indicator.attach(&mut prepared)?;
        }
        Ok(prepared)
    }
}

#[derive(Debug, Clone)]
pub enum StrategyKind {
    MovingAverage(MaCrossover),
    Rsi(RsiReversion),
    Bollinger(BollingerReversion),
    Macd(MacdCrossover),
    ModelSignal(ModelSignalStrategy),
    Ensemble(EnsembleStrategy),
}

impl StrategyKind {
    fn rule(&self) -> &dyn SignalRule {
        match self {
            StrategyKind::MovingAverage(r) => r,
            StrategyKind::Rsi(r) => r,
            StrategyKind::Bollinger(r) => r,
            StrategyKind::Macd(r) => r,
            StrategyKind::ModelSignal(r) => r,
            StrategyKind::Ensemble(r) => r,
        }
    }

    /// Canonical registry name of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            StrategyKind::MovingAverage(_) => "moving_average",
            StrategyKind::Rsi(_) => "rsi",
            StrategyKind::Bollinger(_) => "bollinger_bands",
            StrategyKind::Macd(_) => "macd",
            StrategyKind::ModelSignal(_) => "model_signal",
            StrategyKind::Ensemble(_) => "ensemble",
        }
    }

    pub fn indicators(&self) -> Vec<IndicatorType> {
        self.rule().indicators()
    }

    pub fn warmup(&self) -> usize {
        self.rule().warmup()
    }

    pub fn prepare(&self, series: &MarketSeries) -> Result<MarketSeries, OptitraderError> {
        self.rule().prepare(series)
    }

    pub fn evaluate(&self, row: &Row<'_>) -> Action {
        self.rule().evaluate(row)
    }
}

impl SignalSource for StrategyKind {
    fn name(&self) -> &str {
        self.type_name()
    }

    fn produce_signal(&self, row: &Row<'_>) -> Signal {
        Signal::new(self.evaluate(row).into(), 1.0, self.type_name())
    }
}

/// A configured strategy with its own simulated account.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: String,
    pub kind: StrategyKind,
    pub parameters: ParamMap,
    pub execution: ExecutionConfig,
    portfolio: Portfolio,
}

impl Strategy {
    pub fn new(
        name: impl Into<String>,
        kind: StrategyKind,
        initial_balance: f64,
        execution: ExecutionConfig,
    ) -> Self {
        Strategy {
            name: name.into(),
            kind,
            parameters: ParamMap::new(),
            execution,
            portfolio: Portfolio::new(initial_balance),
        }
    }

    /// Record the parameters the strategy was built from.
    pub fn with_parameters(mut self, parameters: ParamMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn initial_balance(&self) -> f64 {
        self.portfolio.initial_balance
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    pub fn position(&self) -> Option<&Position> {
        self.portfolio.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.portfolio.has_position()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.portfolio.trades
    }

    pub fn warmup(&self) -> usize {
        self.kind.warmup()
    }

    pub fn reset(&mut self) {
        self.portfolio.reset();
    }

    /// Attach the rule's indicator columns and a `signal` column.
    pub fn calculate_signals(&self, series: &MarketSeries) -> Result<MarketSeries, OptitraderError> {
        let prepared = self.kind.prepare(series)?;
        let signals: Vec<f64> = prepared
            .rows()
            .map(|row| self.decide_action(&row).signal_value())
            .collect();
        prepared.with_column(SIGNAL_COLUMN, signals)
    }

    /// Decision for one bar of a series returned by `calculate_signals`.
    pub fn decide_action(&self, row: &Row<'_>) -> Action {
        if row.close().is_none() {
            return Action::Hold;
        }
        self.kind.evaluate(row)
    }

    pub fn execute_buy(
        &mut self,
        timestamp: NaiveDateTime,
        price: f64,
        amount: Option<f64>,
    ) -> EntryResult {
        enter_long(&mut self.portfolio, timestamp, price, amount, &self.execution)
    }

    pub fn execute_sell(&mut self, timestamp: NaiveDateTime, price: f64) -> Option<ExitResult> {
        exit_long(
            &mut self.portfolio,
            timestamp,
            price,
            TradeReason::Signal,
            &self.execution,
        )
    }

    /// Close the position when `price` breaches its stop or target level.
    pub fn check_exits(&mut self, timestamp: NaiveDateTime, price: f64) -> Option<TradeReason> {
        let reason = check_triggers(&self.portfolio, price)?;
        exit_long(&mut self.portfolio, timestamp, price, reason, &self.execution)?;
        Some(reason)
    }

    pub fn portfolio_value(&self, price: f64) -> f64 {
        self.portfolio.total_value(price)
    }
}
