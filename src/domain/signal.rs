//! Named signal sources and the voting layer that combines them.
//!
//! A [`SignalSource`] looks at one bar and emits a [`Signal`]: a five-level
//! [`SignalKind`] plus a confidence in `[0, 1]`. A [`SignalManager`] holds
//! weighted sources and reduces their signals to one decision under a
//! [`VotingRule`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::error::OptitraderError;
use super::series::Row;
use super::strategy::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl SignalKind {
    /// +1 for buys, -1 for sells, 0 for hold.
    pub fn direction(&self) -> i8 {
        match self {
            SignalKind::StrongBuy | SignalKind::Buy => 1,
            SignalKind::Hold => 0,
            SignalKind::Sell | SignalKind::StrongSell => -1,
        }
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, SignalKind::StrongBuy | SignalKind::StrongSell)
    }

    /// Classify a predicted percentage move.
    pub fn from_change_percent(change_percent: f64, thresholds: &SignalThresholds) -> Self {
        if change_percent.is_nan() {
            SignalKind::Hold
        } else if change_percent >= thresholds.strong {
            SignalKind::StrongBuy
        } else if change_percent >= thresholds.buy {
            SignalKind::Buy
        } else if change_percent <= -thresholds.strong {
            SignalKind::StrongSell
        } else if change_percent <= thresholds.sell {
            SignalKind::Sell
        } else {
            SignalKind::Hold
        }
    }
}

impl From<Action> for SignalKind {
    fn from(action: Action) -> Self {
        match action {
            Action::Buy => SignalKind::Buy,
            Action::Sell => SignalKind::Sell,
            Action::Hold => SignalKind::Hold,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::StrongBuy => "STRONG_BUY",
            SignalKind::Buy => "BUY",
            SignalKind::Hold => "HOLD",
            SignalKind::Sell => "SELL",
            SignalKind::StrongSell => "STRONG_SELL",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub confidence: f64,
    pub source: String,
}

impl Signal {
    pub fn new(kind: SignalKind, confidence: f64, source: impl Into<String>) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Signal {
            kind,
            confidence,
            source: source.into(),
        }
    }

    pub fn hold(source: impl Into<String>) -> Self {
        Signal::new(SignalKind::Hold, 0.0, source)
    }

    pub fn action(&self) -> Action {
        match self.kind.direction() {
            1 => Action::Buy,
            -1 => Action::Sell,
            _ => Action::Hold,
        }
    }
}

/// Anything that can vote on a bar.
pub trait SignalSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn produce_signal(&self, row: &Row<'_>) -> Signal;
}

/// Percentage-move thresholds for classifying predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub buy: f64,
    pub sell: f64,
    pub strong: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds {
            buy: 2.0,
            sell: -2.0,
            strong: 5.0,
        }
    }
}

/// Signal derived from an externally supplied price prediction column.
///
/// The predicted move is `(prediction - close) / close * 100`. Confidence is
/// read from `confidence_column` when present and defaults to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSignal {
    pub prediction_column: String,
    pub confidence_column: Option<String>,
    pub thresholds: SignalThresholds,
}

impl PredictionSignal {
    pub fn new(prediction_column: impl Into<String>) -> Self {
        PredictionSignal {
            prediction_column: prediction_column.into(),
            confidence_column: None,
            thresholds: SignalThresholds::default(),
        }
    }

    pub fn with_confidence_column(mut self, column: impl Into<String>) -> Self {
        self.confidence_column = Some(column.into());
        self
    }

    pub fn with_thresholds(mut self, thresholds: SignalThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

impl SignalSource for PredictionSignal {
    fn name(&self) -> &str {
        &self.prediction_column
    }

    fn produce_signal(&self, row: &Row<'_>) -> Signal {
        let (Some(close), Some(predicted)) = (row.close(), row.value(&self.prediction_column))
        else {
            return Signal::hold(self.name());
        };
        if close == 0.0 {
            return Signal::hold(self.name());
        }
        let change_percent = (predicted - close) / close * 100.0;
        let confidence = self
            .confidence_column
            .as_deref()
            .and_then(|c| row.value(c))
            .unwrap_or(1.0);
        Signal::new(
            SignalKind::from_change_percent(change_percent, &self.thresholds),
            confidence,
            self.name(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VotingRule {
    /// More than half of all sources point the same way.
    Majority,
    /// Every source points the same way.
    Unanimous,
    /// Normalized weighted direction sum beyond ±threshold.
    Weighted { threshold: f64 },
    /// Confidence-weighted share of the winning side above threshold, once
    /// total directional confidence reaches the minimum.
    ConfidenceWeighted {
        min_total_confidence: f64,
        threshold: f64,
    },
}

impl VotingRule {
    pub fn parse(
        name: &str,
        threshold: f64,
        min_total_confidence: f64,
    ) -> Result<Self, OptitraderError> {
        match name.trim().to_lowercase().as_str() {
            "majority" => Ok(VotingRule::Majority),
            "unanimous" => Ok(VotingRule::Unanimous),
            "weighted" => Ok(VotingRule::Weighted { threshold }),
            "confidence" | "confidence_weighted" => Ok(VotingRule::ConfidenceWeighted {
                min_total_confidence,
                threshold,
            }),
            other => Err(OptitraderError::invalid_parameter(
                "voting",
                format!("unknown voting rule '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone)]
struct WeightedSource {
    source: Arc<dyn SignalSource>,
    weight: f64,
}

#[derive(Debug, Clone)]
pub struct SignalManager {
    sources: Vec<WeightedSource>,
    rule: VotingRule,
}

impl SignalManager {
    pub fn new(rule: VotingRule) -> Self {
        SignalManager {
            sources: Vec::new(),
            rule,
        }
    }

    pub fn add_source(&mut self, source: Arc<dyn SignalSource>, weight: f64) {
        self.sources.push(WeightedSource { source, weight });
    }

    pub fn with_source(mut self, source: Arc<dyn SignalSource>, weight: f64) -> Self {
        self.add_source(source, weight);
        self
    }

    pub fn rule(&self) -> VotingRule {
        self.rule
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source.name()).collect()
    }

    /// Every source's signal for this bar, in registration order.
    pub fn signals(&self, row: &Row<'_>) -> Vec<Signal> {
        self.sources
            .iter()
            .map(|s| s.source.produce_signal(row))
            .collect()
    }

    pub fn combine(&self, row: &Row<'_>) -> Signal {
        let signals = self.signals(row);
        let weights: Vec<f64> = self.sources.iter().map(|s| s.weight).collect();
        combine_signals(&signals, &weights, self.rule)
    }

    pub fn decide(&self, row: &Row<'_>) -> Action {
        self.combine(row).action()
    }
}

const COMBINED_SOURCE: &str = "ensemble";

/// Reduce already-produced signals under `rule`. `weights` pairs with `signals`.
pub fn combine_signals(signals: &[Signal], weights: &[f64], rule: VotingRule) -> Signal {
    let n = signals.len();
    if n == 0 {
        return Signal::hold(COMBINED_SOURCE);
    }

    let buys: Vec<&Signal> = signals.iter().filter(|s| s.kind.direction() > 0).collect();
    let sells: Vec<&Signal> = signals.iter().filter(|s| s.kind.direction() < 0).collect();

    let direction = match rule {
        VotingRule::Majority => {
            if buys.len() * 2 > n {
                1
            } else if sells.len() * 2 > n {
                -1
            } else {
                0
            }
        }
        VotingRule::Unanimous => {
            if buys.len() == n {
                1
            } else if sells.len() == n {
                -1
            } else {
                0
            }
        }
        VotingRule::Weighted { threshold } => {
            let total: f64 = weights.iter().take(n).sum();
            if total <= 0.0 {
                0
            } else {
                let score: f64 = signals
                    .iter()
                    .zip(weights)
                    .map(|(s, w)| s.kind.direction() as f64 * w)
                    .sum::<f64>()
                    / total;
                if score > threshold {
                    1
                } else if score < -threshold {
                    -1
                } else {
                    0
                }
            }
        }
        VotingRule::ConfidenceWeighted {
            min_total_confidence,
            threshold,
        } => {
            let side = |dir: i8| -> f64 {
                signals
                    .iter()
                    .zip(weights)
                    .filter(|(s, _)| s.kind.direction() == dir)
                    .map(|(s, w)| s.confidence * w)
                    .sum()
            };
            let buy_conf = side(1);
            let sell_conf = side(-1);
            let total = buy_conf + sell_conf;
            if total <= 0.0 || total < min_total_confidence {
                0
            } else if buy_conf / total > threshold {
                1
            } else if sell_conf / total > threshold {
                -1
            } else {
                0
            }
        }
    };

    let agreeing = match direction {
        1 => &buys,
        -1 => &sells,
        _ => return Signal::hold(COMBINED_SOURCE),
    };
    let confidence = agreeing.iter().map(|s| s.confidence).sum::<f64>() / agreeing.len() as f64;
    let strong = agreeing.iter().all(|s| s.kind.is_strong());
    let kind = match (direction, strong) {
        (1, true) => SignalKind::StrongBuy,
        (1, false) => SignalKind::Buy,
        (_, true) => SignalKind::StrongSell,
        (_, false) => SignalKind::Sell,
    };
    Signal::new(kind, confidence, COMBINED_SOURCE)
}
