//! Strategy driven by externally supplied price predictions.
//!
//! Each prediction column becomes a [`PredictionSignal`] source. The sources
//! vote through a [`SignalManager`], and the combined signal is acted on only
//! when its confidence reaches `confidence_threshold`.

use std::sync::Arc;
use tracing::warn;

use super::{Action, SignalRule};
use crate::domain::error::OptitraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::params::ParamMap;
use crate::domain::series::{MarketSeries, Row};
use crate::domain::signal::{PredictionSignal, SignalManager, SignalThresholds, VotingRule};

pub const DEFAULT_PREDICTION_COLUMN: &str = "predicted_price";
pub const DEFAULT_CONFIDENCE_COLUMN: &str = "prediction_confidence";

#[derive(Debug, Clone)]
pub struct ModelSignalStrategy {
    prediction_columns: Vec<String>,
    confidence_threshold: f64,
    manager: SignalManager,
}

impl ModelSignalStrategy {
    pub fn new(
        prediction_columns: Vec<String>,
        confidence_column: Option<String>,
        thresholds: SignalThresholds,
        confidence_threshold: f64,
        rule: VotingRule,
    ) -> Result<Self, OptitraderError> {
        if prediction_columns.is_empty() {
            return Err(OptitraderError::invalid_parameter(
                "prediction_columns",
                "at least one prediction column is required",
            ));
        }
        if thresholds.buy <= thresholds.sell {
            return Err(OptitraderError::invalid_parameter(
                "buy_threshold",
                "must be greater than sell_threshold",
            ));
        }
        if thresholds.strong < thresholds.buy {
            return Err(OptitraderError::invalid_parameter(
                "strong_threshold",
                "must not be below buy_threshold",
            ));
        }
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(OptitraderError::invalid_parameter(
                "confidence_threshold",
                "must lie within 0..1",
            ));
        }

        let mut manager = SignalManager::new(rule);
        for column in &prediction_columns {
            let mut source = PredictionSignal::new(column.as_str()).with_thresholds(thresholds);
            if let Some(c) = &confidence_column {
                source = source.with_confidence_column(c.as_str());
            }
            manager.add_source(Arc::new(source), 1.0);
        }

        Ok(ModelSignalStrategy {
            prediction_columns,
            confidence_threshold,
            manager,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self, OptitraderError> {
        let columns = params
            .get_list("prediction_columns")
            .unwrap_or_else(|| vec![DEFAULT_PREDICTION_COLUMN.to_string()]);
        let confidence_column = params.get_string("confidence_column", DEFAULT_CONFIDENCE_COLUMN);
        let confidence_column = (!confidence_column.is_empty()).then_some(confidence_column);

        let d = SignalThresholds::default();
        let thresholds = SignalThresholds {
            buy: params.get_f64("buy_threshold", d.buy)?,
            sell: params.get_f64("sell_threshold", d.sell)?,
            strong: params.get_f64("strong_threshold", d.strong)?,
        };

        let voting = params.get_string("voting", "majority");
        let rule = VotingRule::parse(
            &voting,
            params.get_f64("vote_threshold", 0.6)?,
            params.get_f64("min_total_confidence", 0.0)?,
        )?;

        ModelSignalStrategy::new(
            columns,
            confidence_column,
            thresholds,
            params.get_f64("confidence_threshold", 0.5)?,
            rule,
        )
    }

    pub fn prediction_columns(&self) -> &[String] {
        &self.prediction_columns
    }
}

impl SignalRule for ModelSignalStrategy {
    fn indicators(&self) -> Vec<IndicatorType> {
        Vec::new()
    }

    fn warmup(&self) -> usize {
        0
    }

    fn prepare(&self, series: &MarketSeries) -> Result<MarketSeries, OptitraderError> {
        for column in &self.prediction_columns {
            if !series.has_column(column) {
                warn!(column = %column, "prediction column not present; its votes will be HOLD");
            }
        }
        Ok(series.clone())
    }

    fn evaluate(&self, row: &Row<'_>) -> Action {
        let combined = self.manager.combine(row);
        if combined.confidence < self.confidence_threshold {
            return Action::Hold;
        }
        combined.action()
    }
}
