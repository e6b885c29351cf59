//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{BacktestResult, Backtester};
use crate::domain::config_validation::{
    load_backtest_config, load_comparison, load_grid, load_optimizer_settings, load_sensitivity_ranges, load_space,
    load_strategy_settings, load_walk_forward, validate_config, SearchMethod, StrategySettings,
};
use crate::domain::error::OptitraderError;
use crate::domain::optimizer::{Optimizer, SearchResult, SensitivityReport, WalkForwardReport};
use crate::domain::series::MarketSeries;
use crate::domain::strategy::{StrategyRegistry, COMMON_PARAMETERS};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "optitrader", about = "Strategy backtester and parameter optimizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// OHLCV CSV file
        #[arg(short, long)]
        data: PathBuf,
        /// JSON report path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Validate config and data, then stop
        #[arg(long)]
        dry_run: bool,
    },
    /// Backtest every [compare] strategy on the same data and rank by return
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Search strategy parameters ([grid] or [space])
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ranked combinations to print
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Rolling in-sample search with out-of-sample replay
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        step: Option<usize>,
    },
    /// Sweep each [sensitivity] parameter with the rest fixed
    Sensitivity {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List registered strategy types
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    let registry = StrategyRegistry::with_defaults();
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            dry_run,
        } => run_backtest(&registry, &config, &data, output.as_deref(), dry_run),
        Command::Compare {
            config,
            data,
            output,
        } => run_compare(&registry, &config, &data, output.as_deref()),
        Command::Optimize {
            config,
            data,
            output,
            top,
        } => run_optimize(&registry, &config, &data, output.as_deref(), top),
        Command::WalkForward {
            config,
            data,
            output,
            window,
            step,
        } => run_walk_forward(&registry, &config, &data, output.as_deref(), window, step),
        Command::Sensitivity {
            config,
            data,
            output,
        } => run_sensitivity(&registry, &config, &data, output.as_deref()),
        Command::Validate { config } => run_validate(&registry, &config),
        Command::Strategies => {
            run_strategies(&registry);
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, OptitraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn load_series(path: &Path) -> Result<MarketSeries, OptitraderError> {
    eprintln!("Loading data from {}", path.display());
    let series = CsvAdapter::load_file(path)?;
    if series.is_empty() {
        return Err(OptitraderError::NoData {
            symbol: path.display().to_string(),
        });
    }
    series.validate_schema()?;
    Ok(series)
}

fn output_target(output: Option<&Path>) -> String {
    output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn report_written(output: Option<&Path>) {
    if let Some(path) = output {
        eprintln!("\nReport written to: {}", path.display());
    }
}

/// Load the sections every run needs.
fn prepare_run(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_path: &Path,
) -> Result<(FileConfigAdapter, Backtester, StrategySettings, MarketSeries), OptitraderError> {
    let adapter = load_config(config_path)?;
    let backtester = Backtester::new(load_backtest_config(&adapter)?);
    let settings = load_strategy_settings(&adapter, registry)?;
    eprintln!("Strategy: {} ({})", settings.strategy_type, settings.parameters);
    let series = load_series(data_path)?;
    Ok((adapter, backtester, settings, series))
}

fn run_backtest(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    dry_run: bool,
) -> Result<(), OptitraderError> {
    let (_adapter, backtester, settings, series) = prepare_run(registry, config_path, data_path)?;

    if dry_run {
        eprintln!("\n=== Dry Run ===");
        eprintln!("Bars:        {}", series.len());
        eprintln!("Columns:     {}", series.column_names().collect::<Vec<_>>().join(", "));
        eprintln!("Missing:     {}", series.missing_cells());
        eprintln!("\nConfiguration is valid. No backtest was run.");
        return Ok(());
    }

    let mut strategy = registry.create(&settings.strategy_type, &settings.parameters)?;
    eprintln!("Running backtest: {} bars", series.len());
    let result = backtester.run_backtest(&mut strategy, &series)?;

    print_backtest_summary(&result);
    JsonReportAdapter::default().write_backtest(&result, &output_target(output))?;
    report_written(output);
    Ok(())
}

fn run_compare(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
) -> Result<(), OptitraderError> {
    let adapter = load_config(config_path)?;
    let backtester = Backtester::new(load_backtest_config(&adapter)?);
    let strategies = load_comparison(&adapter, registry)?
        .iter()
        .map(|s| registry.create(&s.strategy_type, &s.parameters))
        .collect::<Result<Vec<_>, _>>()?;
    let series = load_series(data_path)?;

    eprintln!("Comparing {} strategies over {} bars", strategies.len(), series.len());
    let results = backtester.compare_strategies(&strategies, &series)?;

    print_comparison_summary(&results);
    JsonReportAdapter::default().write_comparison(&results, &output_target(output))?;
    report_written(output);
    Ok(())
}

fn run_optimize(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    top: usize,
) -> Result<(), OptitraderError> {
    let (adapter, backtester, settings, series) = prepare_run(registry, config_path, data_path)?;
    let optimizer_settings = load_optimizer_settings(&adapter)?;
    let optimizer = Optimizer::new(registry, backtester, optimizer_settings.config)?;

    let result = match optimizer_settings.method {
        SearchMethod::Grid => {
            let grid = load_grid(&adapter)?;
            eprintln!("Grid search: {} combinations", grid.combination_count());
            optimizer.grid_search(&settings.strategy_type, &grid, &settings.parameters, &series)?
        }
        SearchMethod::Random => {
            let space = load_space(&adapter)?;
            eprintln!("Random search: {} samples", optimizer_settings.samples);
            optimizer.random_search(
                &settings.strategy_type,
                &space,
                optimizer_settings.samples,
                &settings.parameters,
                &series,
            )?
        }
    };

    print_search_summary(&result, top);
    JsonReportAdapter::default().write_search(&result, &output_target(output))?;
    report_written(output);
    Ok(())
}

fn run_walk_forward(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    window: Option<usize>,
    step: Option<usize>,
) -> Result<(), OptitraderError> {
    let (adapter, backtester, settings, series) = prepare_run(registry, config_path, data_path)?;
    let (window, step) = match (window, step) {
        (Some(w), Some(s)) => (w, s),
        (w, s) => {
            let wf = load_walk_forward(&adapter)?;
            (w.unwrap_or(wf.window_size), s.unwrap_or(wf.step_size))
        }
    };
    let optimizer_config = if adapter.has_section("optimizer") {
        load_optimizer_settings(&adapter)?.config
    } else {
        Default::default()
    };
    let grid = load_grid(&adapter)?;
    let optimizer = Optimizer::new(registry, backtester, optimizer_config)?;

    eprintln!("Walk-forward: window {window}, step {step}, {} bars", series.len());
    let report = optimizer.walk_forward(
        &settings.strategy_type,
        &grid,
        &settings.parameters,
        &series,
        window,
        step,
    )?;

    print_walk_forward_summary(&report);
    JsonReportAdapter::default().write_walk_forward(&report, &output_target(output))?;
    report_written(output);
    Ok(())
}

fn run_sensitivity(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
) -> Result<(), OptitraderError> {
    let (adapter, backtester, settings, series) = prepare_run(registry, config_path, data_path)?;
    let ranges = load_sensitivity_ranges(&adapter)?;
    let optimizer_config = if adapter.has_section("optimizer") {
        load_optimizer_settings(&adapter)?.config
    } else {
        Default::default()
    };
    let optimizer = Optimizer::new(registry, backtester, optimizer_config)?;

    let report = optimizer.sensitivity_analysis(
        &settings.strategy_type,
        &settings.parameters,
        &ranges,
        &series,
    )?;

    print_sensitivity_summary(&report);
    JsonReportAdapter::default().write_sensitivity(&report, &output_target(output))?;
    report_written(output);
    Ok(())
}

fn run_validate(registry: &StrategyRegistry, config_path: &Path) -> Result<(), OptitraderError> {
    let adapter = load_config(config_path)?;
    validate_config(&adapter, registry)?;

    if adapter.has_section("strategy") {
        let settings = load_strategy_settings(&adapter, registry)?;
        eprintln!("\nStrategy type: {}", settings.strategy_type);
        for (key, value) in settings.parameters.iter() {
            eprintln!("  {key} = {value}");
        }
    }
    for section in ["compare", "optimizer", "grid", "space", "walk_forward", "sensitivity"] {
        if adapter.has_section(section) {
            eprintln!("  [{section}] ok");
        }
    }
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_strategies(registry: &StrategyRegistry) {
    println!("Strategy types:");
    for name in registry.names() {
        let aliases = registry.aliases_of(name);
        if aliases.is_empty() {
            println!("  {name}");
        } else {
            println!("  {name} (aliases: {})", aliases.join(", "));
        }
    }
    println!("\nCommon parameters: {}", COMMON_PARAMETERS.join(", "));
}

fn print_backtest_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} ===", result.strategy_name);
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!("Portfolio Value:  {:.2}", result.portfolio_value);
    eprintln!("Total Return:     {:.2}%", m.total_return_percent);
    eprintln!("Annualized:       {:.2}%", m.annualized_return_percent);
    eprintln!("Buy & Hold:       {:.2}%", result.buy_hold_return);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown_percent);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate_percent);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
}

fn print_comparison_summary(results: &[BacktestResult]) {
    eprintln!("\n=== Strategy Comparison ===");
    eprintln!(
        "  {:<24} {:>10} {:>8} {:>9} {:>8} {:>8} {:>7}",
        "Strategy", "Return %", "Sharpe", "Max DD %", "Win %", "PF", "Trades"
    );
    for r in results {
        let m = &r.metrics;
        eprintln!(
            "  {:<24} {:>10.2} {:>8.2} {:>9.1} {:>8.1} {:>8.2} {:>7}",
            r.strategy_name,
            m.total_return_percent,
            m.sharpe_ratio,
            m.max_drawdown_percent,
            m.win_rate_percent,
            m.profit_factor,
            m.total_trades
        );
    }
}

fn print_search_summary(result: &SearchResult, top: usize) {
    eprintln!(
        "\n=== Search: {} by {} ({}) ===",
        result.strategy_type,
        result.metric,
        if result.maximize { "max" } else { "min" }
    );
    eprintln!("Evaluated: {} ({} failed)", result.evaluated(), result.failures());
    for (rank, eval) in result.ranked.iter().take(top).enumerate() {
        match &eval.score_std {
            Some(std) => eprintln!("  #{:<3} {:>10.4} ± {:.4}  {}", rank + 1, eval.score, std, eval.parameters),
            None => eprintln!("  #{:<3} {:>10.4}  {}", rank + 1, eval.score, eval.parameters),
        }
    }
    print_backtest_summary(&result.best_result);
}

fn print_walk_forward_summary(report: &WalkForwardReport) {
    eprintln!("\n=== Walk-Forward: {} windows ===", report.windows.len());
    for w in &report.windows {
        let oos = w
            .out_of_sample_score
            .map(|s| format!("{s:.4}"))
            .unwrap_or_else(|| "n/a".to_string());
        eprintln!(
            "  [{}] {} .. {}  in-sample {:.4}  out-of-sample {}  {}",
            w.index, w.start_time, w.end_time, w.in_sample_score, oos, w.best_parameters
        );
    }
    if let Some(mean) = report.mean_in_sample_score() {
        eprintln!("Mean in-sample:     {mean:.4}");
    }
    if let Some(mean) = report.mean_out_of_sample_score() {
        eprintln!("Mean out-of-sample: {mean:.4}");
    }
}

fn print_sensitivity_summary(report: &SensitivityReport) {
    eprintln!("\n=== Sensitivity: {} by {} ===", report.strategy_type, report.metric);
    for p in &report.parameters {
        let corr = p
            .correlation
            .map(|c| format!("{c:+.3}"))
            .unwrap_or_else(|| "n/a".to_string());
        let optimal = p
            .optimal_value
            .map(|v| format!("{v}"))
            .unwrap_or_else(|| "n/a".to_string());
        eprintln!(
            "  {:<20} sensitivity {:>10.4}  correlation {}  optimal {}  ({} failed)",
            p.name, p.sensitivity, corr, optimal, p.failures
        );
    }
    if let Some(top) = report.most_sensitive() {
        eprintln!("Most sensitive: {}", top.name);
    }
}
