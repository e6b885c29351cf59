//! Technical indicator implementations.
//!
//! Every indicator is a stateless transform from input columns to one or more
//! output columns of the same length. Warmup bars are NaN. A NaN input makes
//! that bar's output NaN without disturbing the running state of recursive
//! indicators.
//!
//! - `IndicatorType`: indicator identity + parameters, names its output columns
//! - `compute`: evaluate against a [`MarketSeries`]
//! - `add_default_indicators`: the standard column set attached before a run

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdLines};
pub use obv::calculate_obv;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use stochastic::{calculate_stochastic, StochasticLines};

use std::fmt;
use tracing::debug;

use crate::domain::error::OptitraderError;
use crate::domain::series::MarketSeries;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Stddev(usize),
    Obv,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorType {
    pub fn bollinger(period: usize, num_std: f64) -> Self {
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (num_std * 100.0).round().max(0.0) as u32,
        }
    }

    /// Column name for single-output indicators and prefix for multi-output ones.
    pub fn base_name(&self) -> String {
        match self {
            IndicatorType::Sma(p) => format!("sma_{}", p),
            IndicatorType::Ema(p) => format!("ema_{}", p),
            IndicatorType::Rsi(p) => format!("rsi_{}", p),
            IndicatorType::Atr(p) => format!("atr_{}", p),
            IndicatorType::Stddev(p) => format!("stddev_{}", p),
            IndicatorType::Obv => "obv".to_string(),
            IndicatorType::Macd { fast, slow, signal } => {
                format!("macd_{}_{}_{}", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                format!("stoch_{}_{}", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => format!("bb_{}_{}", period, *stddev_mult_x100 as f64 / 100.0),
        }
    }

    /// Output names in the order `compute` returns them.
    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            IndicatorType::Macd { .. } => &["line", "signal", "hist"],
            IndicatorType::Stochastic { .. } => &["k", "d"],
            IndicatorType::Bollinger { .. } => &["upper", "middle", "lower"],
            _ => &[],
        }
    }

    /// Column holding one output of a multi-output indicator.
    pub fn output_column(&self, output: &str) -> String {
        format!("{}_{}", self.base_name(), output)
    }

    pub fn column_names(&self) -> Vec<String> {
        let outputs = self.outputs();
        if outputs.is_empty() {
            vec![self.base_name()]
        } else {
            outputs.iter().map(|o| self.output_column(o)).collect()
        }
    }

    /// Bars before the first valid value.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorType::Sma(p)
            | IndicatorType::Ema(p)
            | IndicatorType::Atr(p)
            | IndicatorType::Stddev(p) => p.saturating_sub(1),
            IndicatorType::Rsi(p) => *p,
            IndicatorType::Obv => 0,
            IndicatorType::Macd { slow, signal, .. } => (slow + signal).saturating_sub(2),
            IndicatorType::Stochastic { k_period, d_period } => {
                (k_period + d_period).saturating_sub(2)
            }
            IndicatorType::Bollinger { period, .. } => period.saturating_sub(1),
        }
    }

    pub fn compute(
        &self,
        series: &MarketSeries,
    ) -> Result<Vec<(String, Vec<f64>)>, OptitraderError> {
        let close = series.close()?;
        let out = match self {
            IndicatorType::Sma(p) => vec![calculate_sma(close, *p)],
            IndicatorType::Ema(p) => vec![calculate_ema(close, *p)],
            IndicatorType::Rsi(p) => vec![calculate_rsi(close, *p)],
            IndicatorType::Stddev(p) => vec![calculate_stddev(close, *p)],
            IndicatorType::Atr(p) => {
                let high = series.require("high")?;
                let low = series.require("low")?;
                vec![calculate_atr(high, low, close, *p)]
            }
            IndicatorType::Obv => {
                let volume = series.require("volume")?;
                vec![calculate_obv(close, volume)]
            }
            IndicatorType::Macd { fast, slow, signal } => {
                let m = calculate_macd(close, *fast, *slow, *signal);
                vec![m.line, m.signal, m.histogram]
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                let high = series.require("high")?;
                let low = series.require("low")?;
                let s = calculate_stochastic(high, low, close, *k_period, *d_period);
                vec![s.k, s.d]
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let b = calculate_bollinger(close, *period, *stddev_mult_x100 as f64 / 100.0);
                vec![b.upper, b.middle, b.lower]
            }
        };
        Ok(self.column_names().into_iter().zip(out).collect())
    }

    /// Append this indicator's columns to `series` unless they are already there.
    pub fn attach(&self, series: &mut MarketSeries) -> Result<(), OptitraderError> {
        if self.column_names().iter().all(|c| series.has_column(c)) {
            return Ok(());
        }
        for (name, values) in self.compute(series)? {
            series.insert_column(name, values)?;
        }
        debug!(indicator = %self, "attached indicator columns");
        Ok(())
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// The column set attached to every series before a backtest when enabled.
pub fn default_indicators() -> Vec<IndicatorType> {
    vec![
        IndicatorType::Sma(20),
        IndicatorType::Sma(50),
        IndicatorType::Ema(12),
        IndicatorType::Ema(26),
        IndicatorType::Rsi(14),
        IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        },
        IndicatorType::bollinger(20, 2.0),
        IndicatorType::Atr(14),
        IndicatorType::Stochastic {
            k_period: 14,
            d_period: 3,
        },
        IndicatorType::Obv,
    ]
}

pub fn add_default_indicators(series: &MarketSeries) -> Result<MarketSeries, OptitraderError> {
    let mut out = series.clone();
    for indicator in default_indicators() {
        indicator.attach(&mut out)?;
    }
    Ok(out)
}
