//! Bollinger band reversion.
//!
//! BUY when the previous close sat at or below the lower band and this close
//! is back above it. SELL on the mirror condition at the upper band. A bar
//! satisfying both resolves to BUY.

use super::{Action, SignalRule};
use crate::domain::error::OptitraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::params::ParamMap;
use crate::domain::series::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerReversion {
    pub window: usize,
    pub num_std: f64,
}

impl Default for BollingerReversion {
    fn default() -> Self {
        BollingerReversion {
            window: 20,
            num_std: 2.0,
        }
    }
}

impl BollingerReversion {
    pub fn new(window: usize, num_std: f64) -> Result<Self, OptitraderError> {
        if window < 2 {
            return Err(OptitraderError::invalid_parameter("window", "must be at least 2"));
        }
        if !num_std.is_finite() || num_std <= 0.0 {
            return Err(OptitraderError::invalid_parameter("num_std", "must be positive"));
        }
        Ok(BollingerReversion { window, num_std })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, OptitraderError> {
        let d = BollingerReversion::default();
        BollingerReversion::new(
            params.get_usize("window", d.window)?,
            params.get_f64("num_std", d.num_std)?,
        )
    }

    fn bands(&self) -> IndicatorType {
        IndicatorType::bollinger(self.window, self.num_std)
    }
}

impl SignalRule for BollingerReversion {
    fn indicators(&self) -> Vec<IndicatorType> {
        vec![self.bands()]
    }

    fn warmup(&self) -> usize {
        self.window
    }

    fn evaluate(&self, row: &Row<'_>) -> Action {
        let bands = self.bands();
        let upper = bands.output_column("upper");
        let lower = bands.output_column("lower");
        let (Some(prev_close), Some(close)) = (row.previous("close"), row.close()) else {
            return Action::Hold;
        };

        let buy = match (row.previous(&lower), row.value(&lower)) {
            (Some(prev_lower), Some(lower)) => prev_close <= prev_lower && close > lower,
            _ => false,
        };
        if buy {
            return Action::Buy;
        }
        let sell = match (row.previous(&upper), row.value(&upper)) {
            (Some(prev_upper), Some(upper)) => prev_close >= prev_upper && close < upper,
            _ => false,
        };
        if sell {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}
