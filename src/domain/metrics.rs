//! Performance metrics computed from a finished run.

use serde::Serialize;

use super::portfolio::Portfolio;

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: f64,
    pub win_rate_percent: f64,
    pub profit_factor: f64,
    pub total_profit: f64,
    pub total_return_percent: f64,
    pub annualized_return_percent: f64,
    pub max_drawdown_percent: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Mean profit of winning trades.
    pub avg_profit_per_trade: f64,
    /// Mean (negative) profit of losing trades.
    pub avg_loss_per_trade: f64,
}

impl PerformanceMetrics {
    /// Metrics for an account that never traded and never moved.
    pub fn flat() -> Self {
        PerformanceMetrics {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            breakeven_trades: 0,
            win_rate: 0.0,
            win_rate_percent: 0.0,
            profit_factor: 0.0,
            total_profit: 0.0,
            total_return_percent: 0.0,
            annualized_return_percent: 0.0,
            max_drawdown_percent: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            avg_profit_per_trade: 0.0,
            avg_loss_per_trade: 0.0,
        }
    }

    /// `values` is the per-bar portfolio value curve of the run.
    pub fn compute(
        portfolio: &Portfolio,
        values: &[f64],
        periods_per_year: f64,
        risk_free_rate: f64,
    ) -> Self {
        let pnls = portfolio.realized_pnls();
        let initial = portfolio.initial_balance;
        let final_value = values.last().copied().unwrap_or(initial);

        let total_return_percent = if initial > 0.0 {
            (final_value - initial) / initial * 100.0
        } else {
            0.0
        };

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut breakeven_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;

        for &pnl in &pnls {
            if pnl > 0.0 {
                winning_trades += 1;
                gross_profit += pnl;
            } else if pnl < 0.0 {
                losing_trades += 1;
                gross_loss += pnl;
            } else {
                breakeven_trades += 1;
            }
        }

        let total_trades = portfolio.closed_trade_count();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss < 0.0 {
            gross_profit / gross_loss.abs()
        } else {
            0.0
        };

        let avg_profit_per_trade = if winning_trades > 0 {
            gross_profit / winning_trades as f64
        } else {
            0.0
        };
        let avg_loss_per_trade = if losing_trades > 0 {
            gross_loss / losing_trades as f64
        } else {
            0.0
        };

        let max_drawdown_percent = compute_drawdown(values) * 100.0;
        let annualized_return_percent = compute_annualized_return(values, periods_per_year);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(values, risk_free_rate / periods_per_year, periods_per_year);
        let calmar_ratio = if max_drawdown_percent > 0.0 {
            annualized_return_percent / max_drawdown_percent
        } else {
            0.0
        };
        let (max_consecutive_wins, max_consecutive_losses) = compute_streaks(&pnls);

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            breakeven_trades,
            win_rate,
            win_rate_percent: win_rate * 100.0,
            profit_factor,
            total_profit: pnls.iter().sum(),
            total_return_percent,
            annualized_return_percent,
            max_drawdown_percent,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_consecutive_wins,
            max_consecutive_losses,
            avg_profit_per_trade,
            avg_loss_per_trade,
        }
    }
}

/// Largest peak-to-trough decline as a fraction of the running peak.
fn compute_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in values {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn compute_annualized_return(values: &[f64], periods_per_year: f64) -> f64 {
    let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
        return 0.0;
    };
    if first <= 0.0 || last < 0.0 {
        return 0.0;
    }
    let annualized = ((last / first).powf(periods_per_year / values.len() as f64) - 1.0) * 100.0;
    if annualized.is_finite() {
        annualized
    } else {
        0.0
    }
}

fn compute_risk_adjusted(values: &[f64], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    if values.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - period_rf;
    let annualizer = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * annualizer
    } else {
        0.0
    };

    // Spread of the losing periods around their own mean.
    let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_stddev = if negatives.is_empty() {
        0.0
    } else {
        let k = negatives.len() as f64;
        let neg_mean = negatives.iter().sum::<f64>() / k;
        (negatives.iter().map(|r| (r - neg_mean).powi(2)).sum::<f64>() / k).sqrt()
    };

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * annualizer
    } else {
        0.0
    };

    (sharpe, sortino)
}

/// Longest runs of winning and losing trades. A breakeven trade ends either run.
fn compute_streaks(pnls: &[f64]) -> (usize, usize) {
    let sign = |p: f64| {
        if p > 0.0 {
            1
        } else if p < 0.0 {
            -1
        } else {
            0
        }
    };

    let mut max_wins = 0usize;
    let mut max_losses = 0usize;
    let mut current = 0usize;
    let mut current_sign = 0i8;

    for &pnl in pnls {
        let s = sign(pnl);
        if current > 0 && s == current_sign {
            current += 1;
        } else {
            current = 1;
            current_sign = s;
        }
        match current_sign {
            1 => max_wins = max_wins.max(current),
            -1 => max_losses = max_losses.max(current),
            _ => {}
        }
    }

    (max_wins, max_losses)
}
