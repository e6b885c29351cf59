//! Short/long moving-average crossover.

use super::{crossed_above, crossed_below, Action, SignalRule};
use crate::domain::error::OptitraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::params::ParamMap;
use crate::domain::series::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct MaCrossover {
    pub short_window: usize,
    pub long_window: usize,
    pub use_ema: bool,
}

impl Default for MaCrossover {
    fn default() -> Self {
        MaCrossover {
            short_window: 10,
            long_window: 50,
            use_ema: false,
        }
    }
}

impl MaCrossover {
    pub fn new(short_window: usize, long_window: usize, use_ema: bool) -> Result<Self, OptitraderError> {
        if short_window == 0 {
            return Err(OptitraderError::invalid_parameter(
                "short_window",
                "must be positive",
            ));
        }
        if short_window >= long_window {
            return Err(OptitraderError::invalid_parameter(
                "short_window",
                format!("must be less than long_window ({short_window} >= {long_window})"),
            ));
        }
        Ok(MaCrossover {
            short_window,
            long_window,
            use_ema,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, OptitraderError> {
        let d = MaCrossover::default();
        MaCrossover::new(
            params.get_usize("short_window", d.short_window)?,
            params.get_usize("long_window", d.long_window)?,
            params.get_bool("use_ema", d.use_ema)?,
        )
    }

    fn average(&self, period: usize) -> IndicatorType {
        if self.use_ema {
            IndicatorType::Ema(period)
        } else {
            IndicatorType::Sma(period)
        }
    }
}

impl SignalRule for MaCrossover {
    fn indicators(&self) -> Vec<IndicatorType> {
        vec![self.average(self.short_window), self.average(self.long_window)]
    }

    fn warmup(&self) -> usize {
        self.long_window
    }

    fn evaluate(&self, row: &Row<'_>) -> Action {
        let short = self.average(self.short_window).base_name();
        let long = self.average(self.long_window).base_name();
        let (Some(ps), Some(pl), Some(s), Some(l)) = (
            row.previous(&short),
            row.previous(&long),
            row.value(&short),
            row.value(&long),
        ) else {
            return Action::Hold;
        };
        if crossed_above(ps - pl, s - l) {
            Action::Buy
        } else if crossed_below(ps - pl, s - l) {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}
