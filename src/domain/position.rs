//! Open position and executed trade records.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Relative slack on protective levels. `entry * (1 + pct)` rarely lands on
/// the exact float the market prints.
const LEVEL_TOLERANCE: f64 = 1e-12;

/// A long holding. A strategy owns at most one at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub quantity: f64,
    pub entry_fee: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        match self.stop_loss {
            Some(level) => price <= level * (1.0 + LEVEL_TOLERANCE),
            None => false,
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        match self.take_profit {
            Some(level) => price >= level * (1.0 - LEVEL_TOLERANCE),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Why a trade happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeReason {
    Signal,
    StopLoss,
    TakeProfit,
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeReason::Signal => write!(f, "signal"),
            TradeReason::StopLoss => write!(f, "stop_loss"),
            TradeReason::TakeProfit => write!(f, "take_profit"),
        }
    }
}

/// Executed order. `profit_loss` is set on SELL trades only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub timestamp: NaiveDateTime,
    #[serde(rename = "action")]
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub profit_loss: Option<f64>,
    pub reason: TradeReason,
}
