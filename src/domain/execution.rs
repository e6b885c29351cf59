//! Trade execution and fill simulation.
//!
//! Long-only entry/exit with a proportional fee on both legs, position sizing
//! as a fraction of cash, and stop-loss/take-profit levels fixed at entry.

use chrono::NaiveDateTime;

use super::portfolio::Portfolio;
use super::position::{Position, Trade, TradeReason, TradeSide};

/// Execution parameters shared by every strategy type.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Fraction of trade value charged per leg.
    pub fee_rate: f64,
    /// Fraction of cash committed by a default-sized entry.
    pub position_size: f64,
    /// Fractional drop from entry that forces an exit.
    pub stop_loss_pct: Option<f64>,
    /// Fractional gain from entry that forces an exit.
    pub take_profit_pct: Option<f64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fee_rate: 0.001,
            position_size: 1.0,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }
}

pub fn calculate_fee(trade_value: f64, fee_rate: f64) -> f64 {
    trade_value * fee_rate
}

/// Result of an entry attempt. Only `Entered` changes the portfolio.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        price: f64,
        cost: f64,
        fee: f64,
    },
    PositionOpen,
    InsufficientBalance,
    InvalidOrder,
}

/// Open a long position.
///
/// Without an explicit `amount`, the quantity is
/// `cash * position_size * (1 - fee_rate) / price`, which always leaves room
/// for the entry fee.
pub fn enter_long(
    portfolio: &mut Portfolio,
    timestamp: NaiveDateTime,
    price: f64,
    amount: Option<f64>,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.has_position() {
        return EntryResult::PositionOpen;
    }
    if !price.is_finite() || price <= 0.0 {
        return EntryResult::InvalidOrder;
    }

    let quantity = match amount {
        Some(q) if q.is_finite() && q > 0.0 => q,
        Some(_) => return EntryResult::InvalidOrder,
        None => portfolio.cash * config.position_size * (1.0 - config.fee_rate) / price,
    };

    if quantity <= 0.0 {
        return EntryResult::InsufficientBalance;
    }

    let cost = quantity * price;
    let fee = calculate_fee(cost, config.fee_rate);
    if cost + fee > portfolio.cash {
        return EntryResult::InsufficientBalance;
    }

    portfolio.cash -= cost + fee;

    let stop_loss = config
        .stop_loss_pct
        .filter(|pct| *pct > 0.0)
        .map(|pct| price * (1.0 - pct));
    let take_profit = config
        .take_profit_pct
        .filter(|pct| *pct > 0.0)
        .map(|pct| price * (1.0 + pct));

    portfolio.position = Some(Position {
        entry_price: price,
        entry_time: timestamp,
        quantity,
        entry_fee: fee,
        stop_loss,
        take_profit,
    });

    portfolio.record_trade(Trade {
        timestamp,
        side: TradeSide::Buy,
        price,
        quantity,
        fee,
        profit_loss: None,
        reason: TradeReason::Signal,
    });

    EntryResult::Entered {
        quantity,
        price,
        cost,
        fee,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub quantity: f64,
    pub price: f64,
    pub proceeds: f64,
    pub fee: f64,
    pub profit_loss: f64,
}

/// Close the open position at `price`.
///
/// Profit/loss = (exit - entry) * quantity - entry fee - exit fee.
/// Returns `None` with no state change when nothing is open or the price is unusable.
pub fn exit_long(
    portfolio: &mut Portfolio,
    timestamp: NaiveDateTime,
    price: f64,
    reason: TradeReason,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let position = portfolio.position.take()?;

    let proceeds = position.quantity * price;
    let fee = calculate_fee(proceeds, config.fee_rate);
    let profit_loss = position.quantity * (price - position.entry_price) - position.entry_fee - fee;

    portfolio.cash += proceeds - fee;

    portfolio.record_trade(Trade {
        timestamp,
        side: TradeSide::Sell,
        price,
        quantity: position.quantity,
        fee,
        profit_loss: Some(profit_loss),
        reason,
    });

    Some(ExitResult {
        quantity: position.quantity,
        price,
        proceeds,
        fee,
        profit_loss,
    })
}

/// Which protective level, if any, `price` breaches. Stop-loss is checked first.
pub fn check_triggers(portfolio: &Portfolio, price: f64) -> Option<TradeReason> {
    let position = portfolio.position.as_ref()?;
    if position.should_stop_loss(price) {
        Some(TradeReason::StopLoss)
    } else if position.should_take_profit(price) {
        Some(TradeReason::TakeProfit)
    } else {
        None
    }
}
