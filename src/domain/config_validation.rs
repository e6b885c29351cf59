//! Configuration validation.
//!
//! Each `load_*` function checks one INI section and returns the domain value
//! it describes, so a run never starts from a half-valid config. Errors name
//! the offending section and key.

use std::str::FromStr;

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::OptitraderError;
use crate::domain::optimizer::{
    Metric, OptimizerConfig, ParamDistribution, ParameterGrid, ParameterRange, ParameterSpace,
};
use crate::domain::params::ParamMap;
use crate::domain::strategy::StrategyRegistry;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SAMPLES: usize = 50;

/// Strategy type plus its parameters, as read from `[strategy]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    pub strategy_type: String,
    pub parameters: ParamMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    Grid,
    Random,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    pub method: SearchMethod,
    pub samples: usize,
    pub config: OptimizerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkForwardSettings {
    pub window_size: usize,
    pub step_size: usize,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> OptitraderError {
    OptitraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> OptitraderError {
    OptitraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Parse an optional key. Present but unparsable is an error, never a default.
fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, OptitraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
    }
}

fn parse_bool_key(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, OptitraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(invalid(section, key, format!("expected a boolean, got '{}'", raw.trim()))),
        },
    }
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, OptitraderError> {
    let defaults = BacktestConfig::default();

    let periods_per_year = parse_key::<f64>(config, "backtest", "periods_per_year")?
        .unwrap_or(defaults.periods_per_year);
    if !periods_per_year.is_finite() || periods_per_year <= 0.0 {
        return Err(invalid(
            "backtest",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }

    let risk_free_rate =
        parse_key::<f64>(config, "backtest", "risk_free_rate")?.unwrap_or(defaults.risk_free_rate);
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let attach_indicators =
        parse_bool_key(config, "backtest", "attach_indicators", defaults.attach_indicators)?;

    Ok(BacktestConfig {
        periods_per_year,
        risk_free_rate,
        attach_indicators,
    })
}

/// Read `[strategy]` and prove it builds against `registry`.
pub fn load_strategy_settings(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
) -> Result<StrategySettings, OptitraderError> {
    load_strategy_section(config, registry, "strategy", ParamMap::new())
}

/// Read `[compare] strategies = a, b, ...`. Each name is a section shaped
/// like `[strategy]`; its `name` defaults to the section name.
pub fn load_comparison(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
) -> Result<Vec<StrategySettings>, OptitraderError> {
    const SECTION: &str = "compare";
    let raw = config
        .get_string(SECTION, "strategies")
        .ok_or_else(|| missing(SECTION, "strategies"))?;
    let labels: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if labels.len() < 2 {
        return Err(invalid(SECTION, "strategies", "list at least two strategy sections"));
    }

    labels
        .iter()
        .map(|label| {
            if !config.has_section(label) {
                return Err(invalid(SECTION, "strategies", format!("no section [{label}]")));
            }
            load_strategy_section(config, registry, label, ParamMap::new().with("name", label.as_str()))
        })
        .collect()
}

fn load_strategy_section(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
    section: &str,
    defaults: ParamMap,
) -> Result<StrategySettings, OptitraderError> {
    let strategy_type = match config.get_string(section, "type") {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(missing(section, "type")),
    };
    let parameters = defaults.merged(&config.params(section, &["type"]));

    registry
        .create(&strategy_type, &parameters)
        .map_err(|e| match e {
            OptitraderError::UnknownStrategy { name } => invalid(
                section,
                "type",
                format!("unknown strategy type '{}'; known: {}", name, registry.names().join(", ")),
            ),
            OptitraderError::InvalidParameter { name, reason } => invalid(section, &name, reason),
            other => other,
        })?;

    Ok(StrategySettings {
        strategy_type,
        parameters,
    })
}

pub fn load_optimizer_settings(
    config: &dyn ConfigPort,
) -> Result<OptimizerSettings, OptitraderError> {
    const SECTION: &str = "optimizer";
    let defaults = OptimizerConfig::default();

    let method = match config
        .get_string(SECTION, "method")
        .map(|m| m.trim().to_lowercase())
        .as_deref()
    {
        None | Some("") | Some("grid") => SearchMethod::Grid,
        Some("random") => SearchMethod::Random,
        Some(other) => {
            return Err(invalid(
                SECTION,
                "method",
                format!("expected grid or random, got '{}'", other),
            ))
        }
    };

    let metric = match config.get_string(SECTION, "metric") {
        Some(raw) if !raw.trim().is_empty() => Metric::from_str(&raw)
            .map_err(|e| invalid(SECTION, "metric", e.to_string()))?,
        _ => defaults.metric,
    };
    // Drawdown is a cost; everything else is a reward.
    let maximize = parse_bool_key(
        config,
        SECTION,
        "maximize",
        metric != Metric::MaxDrawdownPercent,
    )?;

    let max_combinations = match parse_key::<usize>(config, SECTION, "max_combinations")? {
        None | Some(0) => None,
        Some(cap) => Some(cap),
    };
    let threads = parse_key(config, SECTION, "threads")?.unwrap_or(defaults.threads);
    let cv_folds = parse_key(config, SECTION, "cv_folds")?.unwrap_or(defaults.cv_folds);
    let min_fold_bars: usize =
        parse_key(config, SECTION, "min_fold_bars")?.unwrap_or(defaults.min_fold_bars);
    if min_fold_bars < 2 {
        return Err(invalid(SECTION, "min_fold_bars", "min_fold_bars must be at least 2"));
    }
    let samples: usize = parse_key(config, SECTION, "samples")?.unwrap_or(DEFAULT_SAMPLES);
    if method == SearchMethod::Random && samples == 0 {
        return Err(invalid(SECTION, "samples", "samples must be positive"));
    }
    let seed = parse_key(config, SECTION, "seed")?.unwrap_or(defaults.seed);

    Ok(OptimizerSettings {
        method,
        samples,
        config: OptimizerConfig {
            metric,
            maximize,
            max_combinations,
            threads,
            cv_folds,
            min_fold_bars,
            seed,
        },
    })
}

/// `[grid]`: `name = v1, v2, …` per axis, axes in key order.
pub fn load_grid(config: &dyn ConfigPort) -> Result<ParameterGrid, OptitraderError> {
    let mut grid = ParameterGrid::new();
    for key in config.keys("grid") {
        let raw = config.get_string("grid", &key).unwrap_or_default();
        let values = ParameterGrid::parse_values(&raw);
        if values.is_empty() {
            return Err(invalid("grid", &key, "at least one value is required"));
        }
        grid.add(key, values);
    }
    if grid.is_empty() {
        return Err(missing("grid", "<parameter>"));
    }
    Ok(grid)
}

/// `[space]`: `name = int:a..b`, `float:a..b` or `choice:x,y`.
pub fn load_space(config: &dyn ConfigPort) -> Result<ParameterSpace, OptitraderError> {
    let mut space = ParameterSpace::new();
    for key in config.keys("space") {
        let raw = config.get_string("space", &key).unwrap_or_default();
        let distribution = ParamDistribution::parse(&raw).map_err(|reason| invalid("space", &key, reason))?;
        space.add(key, distribution);
    }
    if space.is_empty() {
        return Err(missing("space", "<parameter>"));
    }
    Ok(space)
}

pub fn load_walk_forward(config: &dyn ConfigPort) -> Result<WalkForwardSettings, OptitraderError> {
    const SECTION: &str = "walk_forward";
    let window_size: usize =
        parse_key(config, SECTION, "window_size")?.ok_or_else(|| missing(SECTION, "window_size"))?;
    if window_size < 2 {
        return Err(invalid(SECTION, "window_size", "window_size must be at least 2"));
    }
    let step_size: usize =
        parse_key(config, SECTION, "step_size")?.ok_or_else(|| missing(SECTION, "step_size"))?;
    if step_size == 0 {
        return Err(invalid(SECTION, "step_size", "step_size must be positive"));
    }
    Ok(WalkForwardSettings {
        window_size,
        step_size,
    })
}

/// `[sensitivity]`: `name = min..max:steps`.
pub fn load_sensitivity_ranges(
    config: &dyn ConfigPort,
) -> Result<Vec<ParameterRange>, OptitraderError> {
    let ranges = config
        .keys("sensitivity")
        .into_iter()
        .map(|key| {
            let raw = config.get_string("sensitivity", &key).unwrap_or_default();
            ParameterRange::parse(&key, &raw).map_err(|reason| invalid("sensitivity", &key, reason))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ranges.is_empty() {
        return Err(missing("sensitivity", "<parameter>"));
    }
    Ok(ranges)
}

/// Check every section present in `config`. `[strategy]` is always required.
pub fn validate_config(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
) -> Result<(), OptitraderError> {
    load_backtest_config(config)?;
    // A comparison-only file may leave out [strategy].
    if config.has_section("strategy") || !config.has_section("compare") {
        load_strategy_settings(config, registry)?;
    }
    if config.has_section("compare") {
        load_comparison(config, registry)?;
    }
    if config.has_section("optimizer") {
        load_optimizer_settings(config)?;
    }
    if config.has_section("grid") {
        load_grid(config)?;
    }
    if config.has_section("space") {
        load_space(config)?;
    }
    if config.has_section("walk_forward") {
        load_walk_forward(config)?;
    }
    if config.has_section("sensitivity") {
        load_sensitivity_ranges(config)?;
    }
    Ok(())
}
