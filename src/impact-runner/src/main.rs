//! Impact Runner — batch driver for the campaign impact analytics engine.
//!
//! Reads a JSON Lines batch of outlet-period records, runs one analysis,
//! and writes the impact report as JSON.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use impact_core::input::read_json_lines;
use impact_core::AnalysisConfig;
use impact_reporting::ImpactEngine;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "impact-runner")]
#[command(about = "Campaign impact analysis over per-outlet period records")]
#[command(version)]
struct Cli {
    /// JSON Lines input file; reads stdin when omitted
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short, env = "CAMPAIGN_IMPACT_CONFIG")]
    config: Option<PathBuf>,

    /// Report destination; writes stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Abort the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Number of classification workers (overrides config)
    #[arg(long, env = "CAMPAIGN_IMPACT__WORKER_COUNT")]
    workers: Option<usize>,

    /// Pretty-print the report
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the report can be piped from stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "impact_runner=info,impact_reporting=info,impact_analytics=info".into()
            }),
        )
        .with_writer(io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AnalysisConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }

    let lines = match &cli.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            read_json_lines(BufReader::new(file))?
        }
        None => read_json_lines(io::stdin().lock())?,
    };
    info!(lines = lines.len(), "Input read");

    let engine = ImpactEngine::new(config)?;
    let config = engine.config();
    info!(
        workers = config.worker_count,
        min_sample_size = config.min_sample_size,
        pre = ?(config.window.pre.start, config.window.pre.end),
        during = ?(config.window.during.start, config.window.during.end),
        post = ?(config.window.post.start, config.window.post.end),
        "Engine configured"
    );

    let report = match cli.timeout_secs {
        Some(secs) => engine.run_with_timeout(lines, Duration::from_secs(secs)).await?,
        None => engine.run(lines).await?,
    };

    let json = report.to_json(cli.pretty)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
