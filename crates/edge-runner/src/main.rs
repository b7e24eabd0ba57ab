//! edge-runner: compute edge signals for tickers from local JSON files.
//!
//! Each ticker needs `<TICKER>.bars.json` and, optionally, `<TICKER>.news.json`
//! in the data directory. Models are trained on first use.
//!
//! Usage:
//!   cargo run -p edge-runner -- --data-dir data --symbols AAPL MSFT
//!   cargo run -p edge-runner -- --data-dir data --retrain --symbols AAPL

use analysis_core::EngineConfig;
use analysis_orchestrator::EdgeEngine;
use anyhow::{bail, Context, Result};
use serde_json::json;

mod provider;

use provider::FileDataProvider;

const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, PartialEq)]
struct RunnerArgs {
    data_dir: String,
    retrain: bool,
    symbols: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<RunnerArgs> {
    let data_dir = args
        .iter()
        .position(|a| a == "--data-dir")
        .map(|i| args.get(i + 1).cloned().context("--data-dir needs a value"))
        .transpose()?
        .or_else(|| std::env::var("EDGE_DATA_DIR").ok())
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

    let retrain = args.iter().any(|a| a == "--retrain");

    let symbols: Vec<String> = match args.iter().position(|a| a == "--symbols") {
        Some(idx) => args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .map(|s| s.to_uppercase())
            .collect(),
        None => Vec::new(),
    };
    if symbols.is_empty() {
        bail!("no symbols given; pass --symbols AAPL MSFT ...");
    }

    Ok(RunnerArgs {
        data_dir,
        retrain,
        symbols,
    })
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Logs go to stderr so stdout stays machine-readable
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args)?;

    let config = EngineConfig::from_env().context("invalid EDGE_* configuration")?;
    tracing::info!(
        algorithm = %config.model.algorithm,
        horizon = config.model.horizon,
        weights = ?config.fusion.weights,
        "configuration loaded"
    );
    let engine = EdgeEngine::new(config)?;
    let provider = FileDataProvider::new(&args.data_dir);
    tracing::info!("Reading market data from {}", provider.root().display());

    if args.retrain {
        for outcome in engine.retrain_all(&args.symbols, &provider) {
            let line = match &outcome.result {
                Ok(metrics) => json!({ "ticker": outcome.ticker, "model": metrics }),
                Err(e) => json!({
                    "ticker": outcome.ticker,
                    "retrain_error": e.to_string(),
                    "recoverable": e.is_recoverable(),
                }),
            };
            println!("{line}");
        }
    }

    let outcomes = engine.refresh_all(&args.symbols, &provider);
    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
    for outcome in &outcomes {
        let line = match &outcome.result {
            Ok(edge) => serde_json::to_value(edge)?,
            Err(e) => json!({
                "ticker": outcome.ticker,
                "error": e.to_string(),
                "recoverable": e.is_recoverable(),
            }),
        };
        println!("{line}");
    }

    if succeeded == 0 {
        bail!("no signal could be produced for {} ticker(s)", outcomes.len());
    }
    let actionable = outcomes
        .iter()
        .filter_map(|o| o.ok())
        .filter(|edge| edge.signal.is_actionable())
        .count();
    tracing::info!("{}/{} signals written, {} actionable", succeeded, outcomes.len(), actionable);
    Ok(())
}
