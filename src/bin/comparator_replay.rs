//! Comparator Replay
//!
//! Drives the streaming comparator from a recorded stimulation log, standing in
//! for the host pipeline's scheduler.
//!
//! Usage:
//!   comparator_replay --events session.jsonl --report results/comparison.json
//!   comparator_replay --events session.jsonl --config comparator.toml --tick-ms 62
//!
//! Event log format (one JSON object per line, `#` comments allowed):
//!   {"tick": 0, "input": 0, "code": 33025}
//!   {"tick": 0, "input": 2, "code": "0x00008102"}
//!
//! Lines sharing a `tick` are delivered together, in file order.
//!
//! Environment Variables:
//!   COMPARATOR_CONFIG_PATH - TOML config used when --config is absent
//!   RUST_LOG - log filter (overrides --log-level)

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

use classifier_comparator::comparator::{
    Comparator, ComparatorConfig, Finalization, StimulationEvent, StreamRole,
};

#[derive(Parser, Debug)]
#[command(name = "comparator_replay")]
#[command(about = "Replay recorded classifier stimulations through the streaming comparator")]
struct Args {
    /// JSON-lines stimulation log
    #[arg(short, long)]
    events: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the JSON report path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Override the text summary path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Milliseconds between ticks (0 = as fast as possible)
    #[arg(long, default_value = "0")]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Stimulation code, either numeric or a hex string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCode {
    Number(u64),
    Text(String),
}

impl RawCode {
    fn value(&self) -> Result<u64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => {
                let s = s.trim();
                match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16)
                        .with_context(|| format!("invalid hex code {:?}", s)),
                    None => s.parse().with_context(|| format!("invalid code {:?}", s)),
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct LogLine {
    tick: u64,
    input: usize,
    code: RawCode,
}

/// Group log lines into per-tick batches. Inputs past the last role are dropped.
fn load_ticks(contents: &str) -> Result<Vec<(u64, Vec<StimulationEvent>)>> {
    let mut ticks: BTreeMap<u64, Vec<StimulationEvent>> = BTreeMap::new();
    let mut skipped = 0usize;

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed: LogLine = serde_json::from_str(line)
            .with_context(|| format!("line {}: malformed event", idx + 1))?;
        let code = parsed
            .code
            .value()
            .with_context(|| format!("line {}", idx + 1))?;

        match StreamRole::from_input(parsed.input) {
            Some(role) => ticks
                .entry(parsed.tick)
                .or_default()
                .push(StimulationEvent::new(role, code)),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "Events on unknown inputs dropped");
    }
    Ok(ticks.into_iter().collect())
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.to_lowercase().into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<ComparatorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            ComparatorConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => ComparatorConfig::from_env()?,
    };

    if let Some(report) = &args.report {
        config.report_path = report.clone();
    }
    if let Some(summary) = &args.summary {
        config.summary_path = Some(summary.clone());
    }
    Ok(config)
}

fn print_outcome(outcome: Option<&Finalization>) {
    match outcome {
        Some(Finalization::Report { summary, .. }) => print!("{}", summary),
        Some(Finalization::NoPredictions) => println!("ERROR: No predictions received!"),
        None => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(&args)?;
    let contents = tokio::fs::read_to_string(&args.events)
        .await
        .with_context(|| format!("reading {}", args.events.display()))?;
    let ticks = load_ticks(&contents)?;
    if ticks.is_empty() {
        warn!("{} contains no events", args.events.display());
    }
    info!(
        ticks = ticks.len(),
        events = ticks.iter().map(|(_, e)| e.len()).sum::<usize>(),
        "Loaded stimulation log"
    );

    let mut comparator = Comparator::from_config(config)?;
    comparator.initialize()?;

    let replay = async {
        let mut interval = (args.tick_ms > 0)
            .then(|| tokio::time::interval(Duration::from_millis(args.tick_ms)));

        for (tick, events) in &ticks {
            if let Some(interval) = interval.as_mut() {
                interval.tick().await;
            }
            let result = comparator.tick(events);
            if result.finalization.is_some() {
                info!(tick, "Comparator finalized on termination signal");
                break;
            }
        }
    };

    tokio::select! {
        _ = replay => {
            info!("Replay finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    comparator.shutdown();
    print_outcome(comparator.final_outcome());
    Ok(())
}
