//! Strategy parameter values.
//!
//! Strategy configuration is a flat name → value mapping. Values are loosely
//! typed (integer, float, boolean, text) and converted on access; parameters a
//! strategy does not read are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::error::OptitraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Parse a config string: booleans, then integers, then floats, else text.
    pub fn parse(raw: &str) -> ParamValue {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return ParamValue::Float(f);
        }
        ParamValue::Text(trimmed.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Text(s) => s.trim().parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }

    /// Integer view. Floats convert only when they carry no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            ParamValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(0) => Some(false),
            ParamValue::Int(1) => Some(true),
            ParamValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Ordered parameter name → value mapping with typed getters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        ParamMap(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Copy of `self` with every entry of `overrides` applied on top.
    pub fn merged(&self, overrides: &ParamMap) -> ParamMap {
        let mut out = self.clone();
        for (k, v) in overrides.iter() {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    /// Entries named `<prefix>.<key>`, returned with the prefix stripped.
    pub fn scoped(&self, prefix: &str) -> ParamMap {
        let lead = format!("{prefix}.");
        self.0
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&lead).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    pub fn get_f64(&self, name: &str, default: f64) -> Result<f64, OptitraderError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| OptitraderError::invalid_parameter(name, format!("expected a number, got {v}"))),
        }
    }

    pub fn get_usize(&self, name: &str, default: usize) -> Result<usize, OptitraderError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => match v.as_i64() {
                Some(i) if i >= 0 => Ok(i as usize),
                _ => Err(OptitraderError::invalid_parameter(
                    name,
                    format!("expected a non-negative integer, got {v}"),
                )),
            },
        }
    }

    pub fn get_bool(&self, name: &str, default: bool) -> Result<bool, OptitraderError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| OptitraderError::invalid_parameter(name, format!("expected a boolean, got {v}"))),
        }
    }

    /// Text view of any value; numbers and booleans are rendered.
    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get(name)
            .map(|v| v.to_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// Comma-separated list, with whitespace trimmed and empty items dropped.
    pub fn get_list(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|v| {
            v.to_string()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}

impl FromIterator<(String, ParamValue)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        ParamMap(iter.into_iter().collect())
    }
}

impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
            first = false;
        }
        Ok(())
    }
}
