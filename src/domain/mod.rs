//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod params;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod optimizer;
pub mod config_validation;
pub mod error;
