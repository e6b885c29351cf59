//! RSI mean reversion: act when RSI enters the oversold or overbought zone.

use super::{Action, SignalRule};
use crate::domain::error::OptitraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::params::ParamMap;
use crate::domain::series::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct RsiReversion {
    pub window: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiReversion {
    fn default() -> Self {
        RsiReversion {
            window: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl RsiReversion {
    pub fn new(window: usize, oversold: f64, overbought: f64) -> Result<Self, OptitraderError> {
        if window == 0 {
            return Err(OptitraderError::invalid_parameter("window", "must be positive"));
        }
        if !(0.0..100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
            return Err(OptitraderError::invalid_parameter(
                "oversold",
                "thresholds must lie within 0..100",
            ));
        }
        if oversold >= overbought {
            return Err(OptitraderError::invalid_parameter(
                "oversold",
                format!("must be below overbought ({oversold} >= {overbought})"),
            ));
        }
        Ok(RsiReversion {
            window,
            oversold,
            overbought,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, OptitraderError> {
        let d = RsiReversion::default();
        RsiReversion::new(
            params.get_usize("window", d.window)?,
            params.get_f64("oversold", d.oversold)?,
            params.get_f64("overbought", d.overbought)?,
        )
    }
}

impl SignalRule for RsiReversion {
    fn indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Rsi(self.window)]
    }

    fn warmup(&self) -> usize {
        self.window + 1
    }

    fn evaluate(&self, row: &Row<'_>) -> Action {
        let column = IndicatorType::Rsi(self.window).base_name();
        let (Some(prev), Some(rsi)) = (row.previous(&column), row.value(&column)) else {
            return Action::Hold;
        };
        if rsi < self.oversold && prev >= self.oversold {
            Action::Buy
        } else if rsi > self.overbought && prev <= self.overbought {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}
