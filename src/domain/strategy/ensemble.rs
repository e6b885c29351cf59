//! Weighted vote over member strategies.

use std::sync::Arc;

use super::{Action, SignalRule, StrategyKind};
use crate::domain::error::OptitraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::series::Row;
use crate::domain::signal::{SignalManager, VotingRule};

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct EnsembleStrategy {
    members: Vec<StrategyKind>,
    weights: Vec<f64>,
    manager: SignalManager,
}

impl EnsembleStrategy {
    /// `weights` default to equal shares. Supplied weights must be
    /// non-negative and sum to 1.
    pub fn new(
        members: Vec<StrategyKind>,
        weights: Option<Vec<f64>>,
        rule: VotingRule,
    ) -> Result<Self, OptitraderError> {
        if members.is_empty() {
            return Err(OptitraderError::invalid_parameter(
                "strategies",
                "an ensemble needs at least one member",
            ));
        }
        if members
            .iter()
            .any(|m| matches!(m, StrategyKind::Ensemble(_)))
        {
            return Err(OptitraderError::invalid_parameter(
                "strategies",
                "ensembles cannot contain ensembles",
            ));
        }

        let weights = match weights {
            None => vec![1.0 / members.len() as f64; members.len()],
            Some(w) => {
                if w.len() != members.len() {
                    return Err(OptitraderError::invalid_parameter(
                        "weights",
                        format!("expected {} weights, got {}", members.len(), w.len()),
                    ));
                }
                if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
                    return Err(OptitraderError::invalid_parameter(
                        "weights",
                        "weights must be non-negative",
                    ));
                }
                let total: f64 = w.iter().sum();
                if (total - 1.0).abs() > WEIGHT_TOLERANCE {
                    return Err(OptitraderError::invalid_parameter(
                        "weights",
                        format!("weights must sum to 1, got {total}"),
                    ));
                }
                w
            }
        };

        let mut manager = SignalManager::new(rule);
        for (member, weight) in members.iter().zip(&weights) {
            manager.add_source(Arc::new(member.clone()), *weight);
        }

        Ok(EnsembleStrategy {
            members,
            weights,
            manager,
        })
    }

    pub fn members(&self) -> &[StrategyKind] {
        &self.members
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl SignalRule for EnsembleStrategy {
    fn indicators(&self) -> Vec<IndicatorType> {
        let mut out: Vec<IndicatorType> = Vec::new();
        for indicator in self.members.iter().flat_map(|m| m.indicators()) {
            if !out.contains(&indicator) {
                out.push(indicator);
            }
        }
        out
    }

    fn warmup(&self) -> usize {
        self.members.iter().map(|m| m.warmup()).min().unwrap_or(0)
    }

    fn evaluate(&self, row: &Row<'_>) -> Action {
        self.manager.decide(row)
    }
}
