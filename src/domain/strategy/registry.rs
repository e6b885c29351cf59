//! Strategy type name → builder lookup.

use std::collections::BTreeMap;

use super::{
    BollingerReversion, EnsembleStrategy, MaCrossover, MacdCrossover, ModelSignalStrategy,
    RsiReversion, Strategy, StrategyKind,
};
use crate::domain::error::OptitraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::params::ParamMap;
use crate::domain::signal::VotingRule;

pub type StrategyBuilder = fn(&StrategyRegistry, &ParamMap) -> Result<StrategyKind, OptitraderError>;

pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;

/// Parameters every strategy type accepts.
pub const COMMON_PARAMETERS: [&str; 6] = [
    "name",
    "initial_balance",
    "fee_rate",
    "position_size",
    "stop_loss",
    "take_profit",
];

#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    builders: BTreeMap<String, StrategyBuilder>,
    aliases: BTreeMap<String, String>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        StrategyRegistry::with_defaults()
    }
}

impl StrategyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        StrategyRegistry {
            builders: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// Registry holding the six built-in strategy types and their aliases.
    pub fn with_defaults() -> Self {
        let mut registry = StrategyRegistry::new();
        registry.register("moving_average", build_moving_average);
        registry.register("rsi", build_rsi);
        registry.register("bollinger_bands", build_bollinger);
        registry.register("macd", build_macd);
        registry.register("model_signal", build_model_signal);
        registry.register("ensemble", build_ensemble);
        registry.alias("ma", "moving_average");
        registry.alias("bb", "bollinger_bands");
        registry.alias("bollinger", "bollinger_bands");
        registry.alias("ml_model", "model_signal");
        registry.alias("model_driven", "model_signal");
        registry
    }

    pub fn register(&mut self, name: &str, builder: StrategyBuilder) {
        self.builders.insert(name.to_lowercase(), builder);
    }

    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_lowercase(), target.to_lowercase());
    }

    /// Canonical type name for `name` or one of its aliases.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let key = name.trim().to_lowercase();
        if let Some((canonical, _)) = self.builders.get_key_value(&key) {
            return Some(canonical.as_str());
        }
        self.aliases
            .get(&key)
            .and_then(|target| self.builders.get_key_value(target))
            .map(|(canonical, _)| canonical.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Registered canonical names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Aliases pointing at `name`.
    pub fn aliases_of(&self, name: &str) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Build only the decision rule of a strategy type.
    pub fn build_kind(&self, type_name: &str, params: &ParamMap) -> Result<StrategyKind, OptitraderError> {
        let canonical = self
            .resolve(type_name)
            .ok_or_else(|| OptitraderError::UnknownStrategy {
                name: type_name.to_string(),
            })?;
        let builder = self.builders[canonical];
        builder(self, params)
    }

    /// Build a fresh strategy with its own account from `params`.
    pub fn create(&self, type_name: &str, params: &ParamMap) -> Result<Strategy, OptitraderError> {
        let kind = self.build_kind(type_name, params)?;
        let (initial_balance, execution) = execution_from_params(params)?;
        let name = params.get_string("name", kind.type_name());
        Ok(Strategy::new(name, kind, initial_balance, execution).with_parameters(params.clone()))
    }
}

/// Read and validate the common account parameters.
pub fn execution_from_params(params: &ParamMap) -> Result<(f64, ExecutionConfig), OptitraderError> {
    let d = ExecutionConfig::default();

    let initial_balance = params.get_f64("initial_balance", DEFAULT_INITIAL_BALANCE)?;
    if !initial_balance.is_finite() || initial_balance <= 0.0 {
        return Err(OptitraderError::invalid_parameter(
            "initial_balance",
            "must be positive",
        ));
    }

    let fee_rate = params.get_f64("fee_rate", d.fee_rate)?;
    if !(0.0..1.0).contains(&fee_rate) {
        return Err(OptitraderError::invalid_parameter("fee_rate", "must lie within [0, 1)"));
    }

    let position_size = params.get_f64("position_size", d.position_size)?;
    if !(position_size > 0.0 && position_size <= 1.0) {
        return Err(OptitraderError::invalid_parameter(
            "position_size",
            "must lie within (0, 1]",
        ));
    }

    let fraction = |name: &str| -> Result<Option<f64>, OptitraderError> {
        let v = params.get_f64(name, 0.0)?;
        if !(0.0..1.0).contains(&v) {
            return Err(OptitraderError::invalid_parameter(name, "must lie within [0, 1)"));
        }
        Ok((v > 0.0).then_some(v))
    };

    Ok((
        initial_balance,
        ExecutionConfig {
            fee_rate,
            position_size,
            stop_loss_pct: fraction("stop_loss")?,
            take_profit_pct: fraction("take_profit")?,
        },
    ))
}

fn build_moving_average(_: &StrategyRegistry, params: &ParamMap) -> Result<StrategyKind, OptitraderError> {
    Ok(StrategyKind::MovingAverage(MaCrossover::from_params(params)?))
}

fn build_rsi(_: &StrategyRegistry, params: &ParamMap) -> Result<StrategyKind, OptitraderError> {
    Ok(StrategyKind::Rsi(RsiReversion::from_params(params)?))
}

fn build_bollinger(_: &StrategyRegistry, params: &ParamMap) -> Result<StrategyKind, OptitraderError> {
    Ok(StrategyKind::Bollinger(BollingerReversion::from_params(params)?))
}

fn build_macd(_: &StrategyRegistry, params: &ParamMap) -> Result<StrategyKind, OptitraderError> {
    Ok(StrategyKind::Macd(MacdCrossover::from_params(params)?))
}

fn build_model_signal(_: &StrategyRegistry, params: &ParamMap) -> Result<StrategyKind, OptitraderError> {
    Ok(StrategyKind::ModelSignal(ModelSignalStrategy::from_params(params)?))
}

/// Members are named in `strategies`; each reads its own parameters from
/// `<member>.<param>` entries.
fn build_ensemble(registry: &StrategyRegistry, params: &ParamMap) -> Result<StrategyKind, OptitraderError> {
    let names = params
        .get_list("strategies")
        .unwrap_or_else(|| vec!["moving_average".into(), "rsi".into(), "macd".into()]);

    let mut members = Vec::with_capacity(names.len());
    for name in &names {
        if registry.resolve(name) == Some("ensemble") {
            return Err(OptitraderError::invalid_parameter(
                "strategies",
                "ensembles cannot contain ensembles",
            ));
        }
        members.push(registry.build_kind(name, &params.scoped(name))?);
    }

    let weights = match params.get_list("weights") {
        None => None,
        Some(raw) => Some(
            raw.iter()
                .map(|w| {
                    w.parse::<f64>().map_err(|_| {
                        OptitraderError::invalid_parameter("weights", format!("not a number: {w}"))
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?,
        ),
    };

    let rule = VotingRule::parse(
        &params.get_string("voting", "weighted"),
        params.get_f64("threshold", 0.25)?,
        params.get_f64("min_total_confidence", 0.0)?,
    )?;

    Ok(StrategyKind::Ensemble(EnsembleStrategy::new(members, weights, rule)?))
}
