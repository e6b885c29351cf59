//! CLI integration tests.
//!
//! Tests cover:
//! - Every subcommand end-to-end with INI and CSV files on disk
//! - JSON reports written to the requested path
//! - Exit codes per error kind
//! - Dry-run mode

mod common;

use clap::Parser;
use common::*;
use optitrader::cli::{self, Cli};
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

const BACKTEST_INI: &str = r#"
[backtest]
periods_per_year = 252
risk_free_rate = 0.0

[strategy]
type = moving_average
name = Wave Cross
short_window = 5
long_window = 20
fee_rate = 0.001
"#;

const COMPARE_INI: &str = r#"
[compare]
strategies = fast_ma, slow_ma, rsi_swing

[fast_ma]
type = ma
short_window = 3
long_window = 10

[slow_ma]
type = ma
name = Slow MA
short_window = 10
long_window = 40

[rsi_swing]
type = rsi
window = 14
"#;

const OPTIMIZE_INI: &str = r#"
[strategy]
type = ma

[optimizer]
method = grid
metric = total_return_percent
threads = 2

[grid]
short_window = 3, 5, 8
long_window = 20, 30
"#;

const RANDOM_INI: &str = r#"
[strategy]
type = rsi

[optimizer]
method = random
samples = 6
seed = 11

[space]
window = int:5..25
oversold = float:20..35
"#;

const WALK_FORWARD_INI: &str = r#"
[strategy]
type = ma

[grid]
short_window = 3, 5
long_window = 15, 25

[walk_forward]
window_size = 100
step_size = 50
"#;

const SENSITIVITY_INI: &str = r#"
[strategy]
type = ma
long_window = 30

[sensitivity]
short_window = 2..20:4
fee_rate = 0.0..0.004:3
"#;

fn run_cli(args: &[&str]) -> ExitCode {
    let mut full = vec!["optitrader"];
    full.extend_from_slice(args);
    cli::run(Cli::try_parse_from(full).unwrap())
}

fn assert_exit(code: ExitCode, expected: u8) {
    assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(expected)));
}

fn write_csv(dir: &TempDir) -> String {
    let series = series_from_closes(&wave_closes(250, 100.0));
    let path = dir.path().join("prices.csv");
    std::fs::write(&path, series_to_csv(&series)).unwrap();
    path.to_str().unwrap().to_string()
}

fn write_ini(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

mod backtest_command {
    use super::*;

    #[test]
    fn writes_json_report() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "run.ini", BACKTEST_INI);
        let out = dir.path().join("result.json");

        let code = run_cli(&[
            "backtest",
            "-c",
            &config,
            "-d",
            &data,
            "-o",
            out.to_str().unwrap(),
        ]);
        assert_exit(code, 0);

        let json = read_json(&out);
        assert_eq!(json["strategy_name"], "Wave Cross");
        assert_eq!(json["strategy_type"], "moving_average");
        assert_eq!(json["prices"].as_array().unwrap().len(), 250);
        assert!(json["total_trades"].as_u64().unwrap() > 0);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "run.ini", BACKTEST_INI);
        let out = dir.path().join("result.json");

        let code = run_cli(&[
            "backtest",
            "-c",
            &config,
            "-d",
            &data,
            "-o",
            out.to_str().unwrap(),
            "--dry-run",
        ]);
        assert_exit(code, 0);
        assert!(!out.exists());
    }

    #[test]
    fn missing_config_file_exits_two() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let code = run_cli(&["backtest", "-c", "/nonexistent/run.ini", "-d", &data]);
        assert_exit(code, 2);
    }

    #[test]
    fn invalid_strategy_parameter_exits_two() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(
            &dir,
            "bad.ini",
            "[strategy]\ntype = ma\nshort_window = 40\nlong_window = 20\n",
        );
        assert_exit(run_cli(&["backtest", "-c", &config, "-d", &data]), 2);
    }

    #[test]
    fn csv_without_volume_exits_three() {
        let dir = TempDir::new().unwrap();
        let config = write_ini(&dir, "run.ini", BACKTEST_INI);
        let data = dir.path().join("bad.csv");
        std::fs::write(&data, "date,open,high,low,close\n2024-01-01,1,1,1,1\n").unwrap();
        assert_exit(
            run_cli(&["backtest", "-c", &config, "-d", data.to_str().unwrap()]),
            3,
        );
    }

    #[test]
    fn empty_csv_exits_three() {
        let dir = TempDir::new().unwrap();
        let config = write_ini(&dir, "run.ini", BACKTEST_INI);
        let data = dir.path().join("empty.csv");
        std::fs::write(&data, "timestamp,open,high,low,close,volume\n").unwrap();
        assert_exit(
            run_cli(&["backtest", "-c", &config, "-d", data.to_str().unwrap()]),
            3,
        );
    }

    #[test]
    fn unwritable_output_exits_one() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "run.ini", BACKTEST_INI);
        let code = run_cli(&[
            "backtest",
            "-c",
            &config,
            "-d",
            &data,
            "-o",
            "/nonexistent/dir/result.json",
        ]);
        assert_exit(code, 1);
    }
}

mod compare_command {
    use super::*;

    #[test]
    fn ranks_strategies_by_return() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "cmp.ini", COMPARE_INI);
        let out = dir.path().join("compare.json");

        assert_exit(
            run_cli(&["compare", "-c", &config, "-d", &data, "-o", out.to_str().unwrap()]),
            0,
        );
        let json = read_json(&out);
        let results = json.as_array().unwrap();
        assert_eq!(results.len(), 3);
        let returns: Vec<f64> = results
            .iter()
            .map(|r| r["total_return_percent"].as_f64().unwrap())
            .collect();
        assert!(returns.windows(2).all(|w| w[0] >= w[1]));
        let names: Vec<&str> = results
            .iter()
            .map(|r| r["strategy_name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"fast_ma"));
        assert!(names.contains(&"Slow MA"));
    }

    #[test]
    fn missing_compare_section_exits_two() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "bt.ini", BACKTEST_INI);
        assert_exit(run_cli(&["compare", "-c", &config, "-d", &data]), 2);
    }
}

mod optimize_command {
    use super::*;

    #[test]
    fn grid_search_report() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "opt.ini", OPTIMIZE_INI);
        let out = dir.path().join("search.json");

        assert_exit(
            run_cli(&["optimize", "-c", &config, "-d", &data, "-o", out.to_str().unwrap()]),
            0,
        );
        let json = read_json(&out);
        assert_eq!(json["strategy_type"], "moving_average");
        assert_eq!(json["metric"], "total_return_percent");
        assert_eq!(json["ranked"].as_array().unwrap().len(), 6);
        assert!(json["best_parameters"]["short_window"].is_i64());
    }

    #[test]
    fn random_search_report() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "rand.ini", RANDOM_INI);
        let out = dir.path().join("search.json");

        assert_exit(
            run_cli(&["optimize", "-c", &config, "-d", &data, "-o", out.to_str().unwrap()]),
            0,
        );
        let json = read_json(&out);
        assert_eq!(json["ranked"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn missing_grid_exits_two() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "opt.ini", "[strategy]\ntype = ma\n[optimizer]\nmethod = grid\n");
        assert_exit(run_cli(&["optimize", "-c", &config, "-d", &data]), 2);
    }

    #[test]
    fn every_combination_failing_exits_five() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(
            &dir,
            "opt.ini",
            "[strategy]\ntype = ma\n[grid]\nshort_window = 60, 70\nlong_window = 20\n",
        );
        assert_exit(run_cli(&["optimize", "-c", &config, "-d", &data]), 5);
    }
}

mod analysis_commands {
    use super::*;

    #[test]
    fn walk_forward_report() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "wf.ini", WALK_FORWARD_INI);
        let out = dir.path().join("wf.json");

        assert_exit(
            run_cli(&["walk-forward", "-c", &config, "-d", &data, "-o", out.to_str().unwrap()]),
            0,
        );
        let json = read_json(&out);
        // ceil((250 - 100) / 50) = 3
        assert_eq!(json["windows"].as_array().unwrap().len(), 3);
        assert_eq!(json["window_size"], 100);
    }

    #[test]
    fn walk_forward_flags_override_config() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "wf.ini", WALK_FORWARD_INI);
        let out = dir.path().join("wf.json");

        assert_exit(
            run_cli(&[
                "walk-forward",
                "-c",
                &config,
                "-d",
                &data,
                "-o",
                out.to_str().unwrap(),
                "--step",
                "75",
            ]),
            0,
        );
        let json = read_json(&out);
        assert_eq!(json["step_size"], 75);
        assert_eq!(json["windows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn walk_forward_zero_step_exits_four() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "wf.ini", WALK_FORWARD_INI);
        assert_exit(
            run_cli(&["walk-forward", "-c", &config, "-d", &data, "--window", "50", "--step", "0"]),
            4,
        );
    }

    #[test]
    fn sensitivity_report() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir);
        let config = write_ini(&dir, "sens.ini", SENSITIVITY_INI);
        let out = dir.path().join("sens.json");

        assert_exit(
            run_cli(&["sensitivity", "-c", &config, "-d", &data, "-o", out.to_str().unwrap()]),
            0,
        );
        let json = read_json(&out);
        let params = json["parameters"].as_array().unwrap();
        assert_eq!(params.len(), 2);
        let names: Vec<&str> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"short_window"));
        assert!(names.contains(&"fee_rate"));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_configs_pass() {
        let dir = TempDir::new().unwrap();
        for (name, content) in [
            ("bt.ini", BACKTEST_INI),
            ("cmp.ini", COMPARE_INI),
            ("opt.ini", OPTIMIZE_INI),
            ("rand.ini", RANDOM_INI),
            ("wf.ini", WALK_FORWARD_INI),
            ("sens.ini", SENSITIVITY_INI),
        ] {
            let config = write_ini(&dir, name, content);
            assert_exit(run_cli(&["validate", "-c", &config]), 0);
        }
    }

    #[test]
    fn invalid_sections_fail_with_config_code() {
        let dir = TempDir::new().unwrap();
        for content in [
            "[strategy]\nname = no type\n",
            "[strategy]\ntype = turtle\n",
            "[strategy]\ntype = rsi\n[optimizer]\nmetric = alpha\n",
            "[strategy]\ntype = rsi\n[space]\nwindow = 5..10\n",
            "[strategy]\ntype = rsi\n[sensitivity]\nwindow = 5..10\n",
            "[backtest]\nrisk_free_rate = 2\n[strategy]\ntype = rsi\n",
        ] {
            let config = write_ini(&dir, "bad.ini", content);
            assert_exit(run_cli(&["validate", "-c", &config]), 2);
        }
    }

    #[test]
    fn strategies_lists_registry() {
        assert_exit(run_cli(&["strategies"]), 0);
    }

    #[test]
    fn load_config_reads_sections() {
        use optitrader::ports::config_port::ConfigPort;
        let file = write_temp_file(OPTIMIZE_INI, ".ini");
        let adapter = cli::load_config(file.path()).unwrap();
        assert_eq!(adapter.keys("grid"), vec!["long_window", "short_window"]);
    }
}
