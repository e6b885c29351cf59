//! MACD crossover against the signal line and the zero line.

use super::{crossed_above, crossed_below, Action, SignalRule};
use crate::domain::error::OptitraderError;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::IndicatorType;
use crate::domain::params::ParamMap;
use crate::domain::series::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for MacdCrossover {
    fn default() -> Self {
        MacdCrossover {
            fast_period: DEFAULT_FAST,
            slow_period: DEFAULT_SLOW,
            signal_period: DEFAULT_SIGNAL,
        }
    }
}

impl MacdCrossover {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, OptitraderError> {
        if fast_period == 0 || signal_period == 0 {
            return Err(OptitraderError::invalid_parameter(
                "fast_period",
                "periods must be positive",
            ));
        }
        if fast_period >= slow_period {
            return Err(OptitraderError::invalid_parameter(
                "fast_period",
                format!("must be less than slow_period ({fast_period} >= {slow_period})"),
            ));
        }
        Ok(MacdCrossover {
            fast_period,
            slow_period,
            signal_period,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, OptitraderError> {
        let d = MacdCrossover::default();
        MacdCrossover::new(
            params.get_usize("fast_period", d.fast_period)?,
            params.get_usize("slow_period", d.slow_period)?,
            params.get_usize("signal_period", d.signal_period)?,
        )
    }

    fn indicator(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.fast_period,
            slow: self.slow_period,
            signal: self.signal_period,
        }
    }
}

impl SignalRule for MacdCrossover {
    fn indicators(&self) -> Vec<IndicatorType> {
        vec![self.indicator()]
    }

    /// The zero-line cross is possible as soon as the line has two values.
    fn warmup(&self) -> usize {
        self.slow_period
    }

    fn evaluate(&self, row: &Row<'_>) -> Action {
        let macd = self.indicator();
        let line = macd.output_column("line");
        let signal = macd.output_column("signal");

        let (Some(prev_line), Some(cur_line)) = (row.previous(&line), row.value(&line)) else {
            return Action::Hold;
        };
        let mut buy = crossed_above(prev_line, cur_line);
        let mut sell = crossed_below(prev_line, cur_line);

        if let (Some(prev_signal), Some(cur_signal)) = (row.previous(&signal), row.value(&signal)) {
            let (prev_diff, diff) = (prev_line - prev_signal, cur_line - cur_signal);
            buy |= crossed_above(prev_diff, diff);
            sell |= crossed_below(prev_diff, diff);
        }

        if sell {
            Action::Sell
        } else if buy {
            Action::Buy
        } else {
            Action::Hold
        }
    }
}
