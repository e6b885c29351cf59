//! Cash, open position and trade history for a single strategy.

use super::position::{Position, Trade, TradeSide};

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_balance: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
}

impl Portfolio {
    pub fn new(initial_balance: f64) -> Self {
        Portfolio {
            cash: initial_balance,
            initial_balance,
            position: None,
            trades: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.cash = self.initial_balance;
        self.position = None;
        self.trades.clear();
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Cash plus the open position marked at `price`.
    pub fn total_value(&self, price: f64) -> f64 {
        let position_value = self
            .position
            .as_ref()
            .map(|p| p.market_value(price))
            .unwrap_or(0.0);
        self.cash + position_value
    }

    pub fn position_quantity(&self) -> f64 {
        self.position.as_ref().map(|p| p.quantity).unwrap_or(0.0)
    }

    /// Realized profit/loss of every closed position, in order.
    pub fn realized_pnls(&self) -> Vec<f64> {
        self.trades
            .iter()
            .filter(|t| t.side == TradeSide::Sell)
            .filter_map(|t| t.profit_loss)
            .collect()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnls().iter().sum()
    }

    /// Round trips: ⌊trades / 2⌋. An open entry at the end is not counted.
    pub fn closed_trade_count(&self) -> usize {
        self.trades.len() / 2
    }
}
