//! optitrader: strategy backtester and parameter optimizer.
//!
//! Hexagonal architecture: simulation and search logic in [`domain`], port
//! traits in [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
