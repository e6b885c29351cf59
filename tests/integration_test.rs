//! End-to-end backtest scenarios.
//!
//! Tests cover:
//! - Scripted BUY/SELL runs with exact accounting
//! - All-HOLD, short-series and missing-data behaviour
//! - Stop-loss and take-profit exits
//! - Schema validation before the simulation loop
//! - DataPort and ReportPort plumbing with mocks and real CSV files
//! - Accounting invariants under random signal scripts

mod common;

use approx::assert_relative_eq;
use common::*;
use optitrader::adapters::csv_adapter::CsvAdapter;
use optitrader::domain::backtest::{BacktestResult, Backtester};
use optitrader::domain::error::OptitraderError;
use optitrader::domain::optimizer::{SearchResult, SensitivityReport, WalkForwardReport};
use optitrader::domain::params::ParamMap;
use optitrader::domain::position::{TradeReason, TradeSide};
use optitrader::domain::series::MarketSeries;
use optitrader::domain::strategy::{Strategy, StrategyRegistry};
use optitrader::ports::data_port::DataPort;
use optitrader::ports::report_port::ReportPort;
use std::cell::RefCell;

const CLOSES: [f64; 10] = [100.0, 101.0, 102.0, 104.0, 103.0, 106.0, 108.0, 107.0, 105.0, 109.0];

fn model_strategy(params: ParamMap) -> Strategy {
    StrategyRegistry::with_defaults()
        .create("model_signal", &params)
        .unwrap()
}

fn run(strategy: &mut Strategy, series: &MarketSeries) -> BacktestResult {
    Backtester::default().run_backtest(strategy, series).unwrap()
}

mod scripted_backtests {
    use super::*;

    #[test]
    fn buy_at_two_sell_at_six() {
        let series = scripted_series(&CLOSES, &[2], &[6]);
        let mut strategy = model_strategy(ParamMap::new());
        let result = run(&mut strategy, &series);

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.metrics.total_trades, 1);
        let (buy, sell) = (&result.trades[0], &result.trades[1]);
        assert_eq!(buy.side, TradeSide::Buy);
        assert_eq!(buy.timestamp, ts(2));
        assert_eq!(sell.side, TradeSide::Sell);
        assert_eq!(sell.timestamp, ts(6));
        assert_eq!(sell.reason, TradeReason::Signal);

        let qty = 10_000.0 * 0.999 / CLOSES[2];
        let expected = qty * (CLOSES[6] - CLOSES[2]) - qty * CLOSES[2] * 0.001 - qty * CLOSES[6] * 0.001;
        let pnl = sell.profit_loss.unwrap();
        assert_relative_eq!(pnl, expected, epsilon = 1e-9);
        assert!(pnl > 0.0);
        assert_relative_eq!(result.final_balance, 10_000.0 + pnl, epsilon = 1e-9);
        assert_eq!(result.metrics.winning_trades, 1);
        assert_eq!(result.metrics.profit_factor, 0.0);
    }

    #[test]
    fn all_hold_leaves_balance_untouched() {
        let series = scripted_series(&CLOSES, &[], &[]);
        let mut strategy = model_strategy(ParamMap::new());
        let result = run(&mut strategy, &series);

        assert!(result.trades.is_empty());
        assert_eq!(result.metrics.total_trades, 0);
        assert_eq!(result.final_balance, result.initial_balance);
        assert!(result.portfolio_values.iter().all(|v| *v == 10_000.0));
    }

    #[test]
    fn open_position_is_marked_at_last_close() {
        let series = scripted_series(&CLOSES, &[2], &[]);
        let mut strategy = model_strategy(ParamMap::new());
        let result = run(&mut strategy, &series);

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.metrics.total_trades, 0);
        let qty = result.trades[0].quantity;
        assert_relative_eq!(
            result.portfolio_value,
            result.final_balance + qty * CLOSES[9],
            epsilon = 1e-9
        );
        assert_eq!(result.positions[9], qty);
    }

    #[test]
    fn sell_without_position_is_ignored() {
        let series = scripted_series(&CLOSES, &[], &[1, 3]);
        let mut strategy = model_strategy(ParamMap::new());
        let result = run(&mut strategy, &series);
        assert!(result.trades.is_empty());

        let mut fresh = model_strategy(ParamMap::new());
        assert!(fresh.execute_sell(ts(0), 100.0).is_none());
    }

    #[test]
    fn second_buy_while_open_is_ignored() {
        let series = scripted_series(&CLOSES, &[1, 3], &[5]);
        let mut strategy = model_strategy(ParamMap::new());
        let result = run(&mut strategy, &series);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].timestamp, ts(1));
    }

    #[test]
    fn position_size_scales_quantity() {
        let series = scripted_series(&CLOSES, &[2], &[6]);
        let mut half = model_strategy(ParamMap::new().with("position_size", 0.5).with("fee_rate", 0.0));
        let result = run(&mut half, &series);
        assert_relative_eq!(result.trades[0].quantity, 5_000.0 / CLOSES[2], epsilon = 1e-9);
    }
}

mod protective_exits {
    use super::*;

    #[test]
    fn stop_loss_closes_first_bar_at_or_below_threshold() {
        let closes = [100.0, 100.0, 99.0, 96.0, 94.9, 93.0, 97.0];
        let series = scripted_series(&closes, &[1], &[]);
        let mut strategy = model_strategy(ParamMap::new().with("stop_loss", 0.05));
        let result = run(&mut strategy, &series);

        assert_eq!(result.trades.len(), 2);
        let exit = &result.trades[1];
        assert_eq!(exit.side, TradeSide::Sell);
        assert_eq!(exit.reason, TradeReason::StopLoss);
        assert_eq!(exit.timestamp, ts(4));
        assert_eq!(exit.price, 94.9);
        assert!(exit.profit_loss.unwrap() < 0.0);
        assert_eq!(result.metrics.losing_trades, 1);
    }

    #[test]
    fn take_profit_closes_on_target() {
        let closes = [100.0, 100.0, 104.0, 110.5, 120.0];
        let series = scripted_series(&closes, &[1], &[]);
        let mut strategy = model_strategy(ParamMap::new().with("take_profit", 0.10));
        let result = run(&mut strategy, &series);

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[1].reason, TradeReason::TakeProfit);
        assert_eq!(result.trades[1].timestamp, ts(3));
    }

    #[test]
    fn stop_loss_takes_precedence_over_signal() {
        let closes = [100.0, 100.0, 90.0, 95.0];
        let series = scripted_series(&closes, &[1], &[2]);
        let mut strategy = model_strategy(ParamMap::new().with("stop_loss", 0.05));
        let result = run(&mut strategy, &series);
        assert_eq!(result.trades[1].reason, TradeReason::StopLoss);
        assert_eq!(result.trades.len(), 2);
    }
}

mod data_quality {
    use super::*;

    #[test]
    fn missing_close_holds_that_bar() {
        let mut closes = CLOSES.to_vec();
        closes[2] = f64::NAN;
        let series = scripted_series(&closes, &[2, 3], &[6]);
        let mut strategy = model_strategy(ParamMap::new());
        let result = run(&mut strategy, &series);

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].timestamp, ts(3));
        assert!(result.prices[2].is_nan());
        assert!(result.portfolio_values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let series = MarketSeries::from_columns(
            (0..5).map(ts).collect(),
            columns(&[
                ("open", vec![1.0; 5]),
                ("high", vec![1.0; 5]),
                ("low", vec![1.0; 5]),
                ("close", vec![1.0; 5]),
            ]),
        )
        .unwrap();
        let mut strategy = model_strategy(ParamMap::new());
        let err = Backtester::default()
            .run_backtest(&mut strategy, &series)
            .unwrap_err();
        assert!(matches!(err, OptitraderError::Schema { missing } if missing == vec!["volume".to_string()]));
    }

    #[test]
    fn single_bar_is_flat() {
        let series = scripted_series(&[100.0], &[0], &[]);
        let mut strategy = model_strategy(ParamMap::new());
        let result = run(&mut strategy, &series);
        assert!(result.trades.is_empty());
        assert_eq!(result.final_balance, 10_000.0);
        assert_eq!(result.metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn warmup_longer_than_series_is_flat() {
        let series = series_from_closes(&CLOSES);
        let params = ParamMap::new().with("short_window", 5).with("long_window", 50);
        let mut strategy = StrategyRegistry::with_defaults()
            .create("moving_average", &params)
            .unwrap();
        let result = run(&mut strategy, &series);
        assert!(result.trades.is_empty());
        assert_eq!(result.portfolio_values.len(), CLOSES.len());
    }

    #[test]
    fn unsorted_input_is_sorted_before_simulation() {
        let sorted = scripted_series(&CLOSES, &[2], &[6]);
        let bars: Vec<OhlcvBar> = (0..sorted.len()).rev().map(|i| sorted.bar(i).unwrap()).collect();
        let predicted: Vec<f64> = (0..sorted.len())
            .rev()
            .map(|i| sorted.column("predicted_price").unwrap()[i])
            .collect();
        let reversed = MarketSeries::from_bars(&bars)
            .with_column("predicted_price", predicted)
            .unwrap();

        let a = run(&mut model_strategy(ParamMap::new()), &sorted);
        let b = run(&mut model_strategy(ParamMap::new()), &reversed);
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.final_balance, b.final_balance);
    }
}

mod ports {
    use super::*;

    struct CapturingReport {
        written: RefCell<Vec<(String, String)>>,
    }

    impl CapturingReport {
        fn new() -> Self {
            Self {
                written: RefCell::new(Vec::new()),
            }
        }
    }

    impl ReportPort for CapturingReport {
        fn write_backtest(&self, result: &BacktestResult, output_path: &str) -> Result<(), OptitraderError> {
            self.written
                .borrow_mut()
                .push((output_path.to_string(), result.strategy_name.clone()));
            Ok(())
        }

        fn write_comparison(&self, results: &[BacktestResult], output_path: &str) -> Result<(), OptitraderError> {
            for result in results {
                self.written
                    .borrow_mut()
                    .push((output_path.to_string(), result.strategy_name.clone()));
            }
            Ok(())
        }

        fn write_search(&self, result: &SearchResult, output_path: &str) -> Result<(), OptitraderError> {
            self.written
                .borrow_mut()
                .push((output_path.to_string(), result.strategy_type.clone()));
            Ok(())
        }

        fn write_walk_forward(&self, report: &WalkForwardReport, output_path: &str) -> Result<(), OptitraderError> {
            self.written
                .borrow_mut()
                .push((output_path.to_string(), report.strategy_type.clone()));
            Ok(())
        }

        fn write_sensitivity(&self, report: &SensitivityReport, output_path: &str) -> Result<(), OptitraderError> {
            self.written
                .borrow_mut()
                .push((output_path.to_string(), report.strategy_type.clone()));
            Ok(())
        }
    }

    #[test]
    fn mock_data_port_feeds_backtest_and_report() {
        let port = MockDataPort::new()
            .with_series("AAA", scripted_series(&CLOSES, &[2], &[6]))
            .with_error("BBB", "feed offline");

        assert!(port.fetch_series("BBB").is_err());
        assert!(matches!(port.fetch_series("CCC"), Err(OptitraderError::NoData { .. })));

        let series = port.fetch_series("AAA").unwrap();
        let mut strategy = model_strategy(ParamMap::new().with("name", "scripted"));
        let result = run(&mut strategy, &series);

        let report = CapturingReport::new();
        report.write_backtest(&result, "aaa.json").unwrap();
        assert_eq!(
            report.written.borrow().as_slice(),
            &[("aaa.json".to_string(), "scripted".to_string())]
        );
    }

    #[test]
    fn csv_round_trip_gives_identical_backtest() {
        let dir = tempfile::TempDir::new().unwrap();
        let series = scripted_series(&CLOSES, &[2], &[6]);
        std::fs::write(dir.path().join("AAA.csv"), series_to_csv(&series)).unwrap();

        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let loaded = adapter.fetch_series("AAA").unwrap();
        assert_eq!(loaded.len(), CLOSES.len());

        let direct = run(&mut model_strategy(ParamMap::new()), &series);
        let via_csv = run(&mut model_strategy(ParamMap::new()), &loaded);
        assert_eq!(direct.trades, via_csv.trades);
        assert_relative_eq!(direct.final_balance, via_csv.final_balance);
    }
}

mod builtin_strategies {
    use super::*;

    #[test]
    fn every_registered_type_runs_on_wave_data() {
        let registry = StrategyRegistry::with_defaults();
        let series = scripted_series(&wave_closes(200, 100.0), &[20, 90], &[60, 150]);
        for name in registry.names() {
            let mut strategy = registry.create(name, &ParamMap::new()).unwrap();
            let result = Backtester::default()
                .run_backtest(&mut strategy, &series)
                .unwrap();
            assert_eq!(result.strategy_type, name);
            assert_eq!(result.portfolio_values.len(), 200);
            assert_eq!(result.metrics.total_trades, result.trades.len() / 2);
        }
    }

    #[test]
    fn moving_average_trades_on_wave_data() {
        let series = series_from_closes(&wave_closes(200, 100.0));
        let params = ParamMap::new().with("short_window", 5).with("long_window", 20);
        let mut strategy = StrategyRegistry::with_defaults()
            .create("ma", &params)
            .unwrap();
        let result = run(&mut strategy, &series);
        assert!(result.metrics.total_trades > 0);
        assert!(result.trades.windows(2).all(|w| w[0].side != w[1].side));
    }
}

mod accounting_invariants {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn balance_matches_realized_pnl(
            closes in prop::collection::vec(10.0f64..200.0, 5..60),
            script in prop::collection::vec(0u8..3, 60),
            fee_rate in 0.0f64..0.01,
        ) {
            let n = closes.len();
            let buys: Vec<usize> = (0..n).filter(|&i| script[i] == 1).collect();
            let sells: Vec<usize> = (0..n).filter(|&i| script[i] == 2).collect();
            let series = scripted_series(&closes, &buys, &sells);
            let mut strategy = model_strategy(ParamMap::new().with("fee_rate", fee_rate));
            let result = run(&mut strategy, &series);

            let realized: f64 = result.trades.iter().filter_map(|t| t.profit_loss).sum();
            let open_cost: f64 = if result.trades.len() % 2 == 1 {
                let t = result.trades.last().unwrap();
                t.quantity * t.price + t.fee
            } else {
                0.0
            };
            prop_assert!((result.final_balance - (10_000.0 + realized - open_cost)).abs() < 1e-6);
            prop_assert_eq!(result.metrics.total_trades, result.trades.len() / 2);
            prop_assert!(result.metrics.profit_factor >= 0.0);
            if result.metrics.losing_trades == 0 {
                prop_assert_eq!(result.metrics.profit_factor, 0.0);
            }
            prop_assert!(result.trades.windows(2).all(|w| w[0].side != w[1].side));
        }
    }
}
