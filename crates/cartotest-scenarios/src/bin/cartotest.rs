// crates/cartotest-scenarios/src/bin/cartotest.rs

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use cartotest_core::{ClockKind, HarnessConfig, Summary, init_tracing};
use cartotest_scenarios::{all_suite_names, run_suite_by_name};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "cartotest")]
#[command(
    about = "Run cartotest scenario suites and print a QtTest-style report",
    long_about = None
)]
struct Cli {
    /// Harness configuration file (TOML)
    #[arg(short, long, env = "CARTOTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Suite to run; repeat to select several (default: all)
    #[arg(short, long = "suite", value_name = "NAME")]
    suites: Vec<String>,

    /// Print the reports as JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Clock driving the event loop
    #[arg(long, value_name = "system|virtual")]
    clock: Option<ClockKind>,

    /// Default log directive when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let config = match &cli.config {
        Some(path) => HarnessConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("applying CARTOTEST_* overrides")?;
    if let Some(clock) = cli.clock {
        config = config.with_clock(clock);
    }

    let selected: Vec<&str> = if cli.suites.is_empty() {
        all_suite_names().to_vec()
    } else {
        cli.suites.iter().map(String::as_str).collect()
    };
    for name in &selected {
        if !all_suite_names().contains(name) {
            bail!(
                "unknown suite `{name}`; available: {}",
                all_suite_names().join(", ")
            );
        }
    }

    let mut reports = Vec::new();
    let mut totals = Summary::default();
    for name in selected {
        info!(suite = name, clock = %config.clock, "running suite");
        let Some(report) = run_suite_by_name(name, &config) else {
            bail!("suite `{name}` is not registered");
        };
        totals.merge(report.summary());
        if !cli.json {
            println!("{report}\n");
        }
        reports.push(report);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("{totals}");
    }

    let clean = reports.iter().all(|report| report.is_clean());
    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
