//! Parameter grids (exhaustive search) and spaces (random search).

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;

use crate::domain::error::OptitraderError;
use crate::domain::params::{ParamMap, ParamValue};

/// Ordered name → candidate values. Combinations enumerate in mixed-radix
/// order with the last parameter varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        ParameterGrid { axes: Vec::new() }
    }

    /// Add or replace an axis.
    pub fn add(&mut self, name: impl Into<String>, values: Vec<ParamValue>) {
        let name = name.into();
        match self.axes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.axes.push((name, values)),
        }
    }

    pub fn with<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.add(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Parse a `v1, v2, …` list of values.
    pub fn parse_values(raw: &str) -> Vec<ParamValue> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ParamValue::parse)
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Cartesian product size. An axis without values empties the grid.
    pub fn combination_count(&self) -> usize {
        self.axes
            .iter()
            .map(|(_, v)| v.len())
            .fold(1usize, |acc, n| acc.saturating_mul(n))
    }

    /// The `index`-th combination, or `None` past the end.
    pub fn combination(&self, index: usize) -> Option<ParamMap> {
        if index >= self.combination_count() {
            return None;
        }
        let mut remainder = index;
        let mut picks = Vec::with_capacity(self.axes.len());
        for (name, values) in self.axes.iter().rev() {
            let radix = values.len();
            picks.push((name.clone(), values[remainder % radix].clone()));
            remainder /= radix;
        }
        picks.reverse();
        Some(picks.into_iter().collect())
    }

    /// Every combination in order, or exactly `cap` of them chosen at
    /// indices ⌊i·N/cap⌋ when the grid is larger than `cap`.
    pub fn combinations(&self, cap: Option<usize>) -> Vec<ParamMap> {
        let total = self.combination_count();
        let indices: Vec<usize> = match cap {
            Some(cap) if cap < total => (0..cap)
                .map(|i| ((i as u128 * total as u128) / cap as u128) as usize)
                .collect(),
            _ => (0..total).collect(),
        };
        indices
            .into_iter()
            .filter_map(|i| self.combination(i))
            .collect()
    }
}

/// How one parameter is drawn during random search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamDistribution {
    Choice { values: Vec<ParamValue> },
    /// Inclusive integer range.
    IntRange { low: i64, high: i64 },
    /// Half-open float range `[low, high)`.
    FloatRange { low: f64, high: f64 },
}

impl ParamDistribution {
    /// Parse `int:a..b`, `float:a..b` or `choice:x,y,…`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (kind, body) = raw
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected '<kind>:<values>', got '{raw}'"))?;
        match kind.trim().to_lowercase().as_str() {
            "choice" => {
                let values = ParameterGrid::parse_values(body);
                if values.is_empty() {
                    return Err("choice needs at least one value".to_string());
                }
                Ok(ParamDistribution::Choice { values })
            }
            "int" => {
                let (low, high) = split_range(body)?;
                let low: i64 = low.parse().map_err(|_| format!("not an integer: {low}"))?;
                let high: i64 = high.parse().map_err(|_| format!("not an integer: {high}"))?;
                if low > high {
                    return Err(format!("empty range {low}..{high}"));
                }
                Ok(ParamDistribution::IntRange { low, high })
            }
            "float" => {
                let (low, high) = split_range(body)?;
                let low: f64 = low.parse().map_err(|_| format!("not a number: {low}"))?;
                let high: f64 = high.parse().map_err(|_| format!("not a number: {high}"))?;
                if !(low.is_finite() && high.is_finite()) || low > high {
                    return Err(format!("empty range {low}..{high}"));
                }
                Ok(ParamDistribution::FloatRange { low, high })
            }
            other => Err(format!("unknown distribution '{other}'")),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            ParamDistribution::Choice { values } => values
                .choose(rng)
                .cloned()
                .unwrap_or(ParamValue::Int(0)),
            ParamDistribution::IntRange { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
            ParamDistribution::FloatRange { low, high } => {
                if low == high {
                    ParamValue::Float(*low)
                } else {
                    ParamValue::Float(rng.gen_range(*low..*high))
                }
            }
        }
    }
}

impl fmt::Display for ParamDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamDistribution::Choice { values } => {
                let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "choice:{}", joined.join(","))
            }
            ParamDistribution::IntRange { low, high } => write!(f, "int:{low}..{high}"),
            ParamDistribution::FloatRange { low, high } => write!(f, "float:{low}..{high}"),
        }
    }
}

pub(crate) fn split_range(body: &str) -> Result<(&str, &str), String> {
    body.split_once("..")
        .map(|(a, b)| (a.trim(), b.trim()))
        .ok_or_else(|| format!("expected 'low..high', got '{body}'"))
}

/// Ordered name → distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSpace {
    dimensions: Vec<(String, ParamDistribution)>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        ParameterSpace {
            dimensions: Vec::new(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, distribution: ParamDistribution) {
        let name = name.into();
        match self.dimensions.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = distribution,
            None => self.dimensions.push((name, distribution)),
        }
    }

    pub fn with(mut self, name: &str, distribution: ParamDistribution) -> Self {
        self.add(name, distribution);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// One independent draw of every dimension, in declaration order.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamMap {
        self.dimensions
            .iter()
            .map(|(name, dist)| (name.clone(), dist.sample(rng)))
            .collect()
    }
}

/// Validate that a grid or space has something to search over.
pub(crate) fn require_non_empty(empty: bool, what: &str) -> Result<(), OptitraderError> {
    if empty {
        Err(OptitraderError::Optimization {
            reason: format!("{what} is empty"),
        })
    } else {
        Ok(())
    }
}
