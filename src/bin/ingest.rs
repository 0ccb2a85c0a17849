//! Batch front end for the pipeline: collect a date range, complete missing
//! enrichment, or print a topic summary.
//!
//! ```text
//! ingest search  --topic "Typhoon Yagi" --start 9/4/2024 --end 11/30/2024
//! ingest analyze --topic "Typhoon Yagi"
//! ingest rescan  --topic "Typhoon Yagi" --max-cycles 10
//! ingest summary --topic "Typhoon Yagi"
//! ```

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use disaster_media_pulse::bootstrap::build_pipeline;
use disaster_media_pulse::collect::parse_date;
use disaster_media_pulse::config::pipeline::PipelineSettings;
use disaster_media_pulse::pipeline::{CancelToken, Pipeline};

const DEFAULT_TOPIC: &str = "Typhoon Yagi";

#[derive(Parser)]
#[command(name = "ingest", about = "Collect, enrich and summarize disaster media coverage")]
struct Cli {
    /// Pipeline config TOML; defaults to config/pipeline.toml.
    #[arg(long, env = "PIPELINE_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect and store items without analyzing them.
    Search(RangeArgs),
    /// Collect, analyze and store items.
    Analyze(RangeArgs),
    /// Complete missing analysis of stored items.
    Rescan {
        #[arg(long, default_value = DEFAULT_TOPIC)]
        topic: String,
        /// Keep running cycles until they stop resolving items, at most this many.
        #[arg(long, default_value_t = 1)]
        max_cycles: u32,
    },
    /// Print the aggregated view of a topic as JSON.
    Summary {
        #[arg(long, default_value = DEFAULT_TOPIC)]
        topic: String,
    },
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long, default_value = DEFAULT_TOPIC)]
    topic: String,
    /// M/d/yyyy or yyyy-mm-dd, inclusive.
    #[arg(long, default_value = "9/4/2024")]
    start: String,
    #[arg(long, default_value = "11/30/2024")]
    end: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    disaster_media_pulse::telemetry::init_tracing();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => {
            let mut s = PipelineSettings::load_from(path)?;
            s.apply_env_overrides();
            s
        }
        None => PipelineSettings::load_default()?,
    };
    let pipeline = build_pipeline(&settings).await?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current item");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Search(range) => run_ingest(&pipeline, range, false, &cancel).await,
        Command::Analyze(range) => run_ingest(&pipeline, range, true, &cancel).await,
        Command::Rescan { topic, max_cycles } => {
            run_rescan(&pipeline, &topic, max_cycles.max(1), &cancel).await
        }
        Command::Summary { topic } => {
            let summary = pipeline.aggregate(&topic).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

async fn run_ingest(
    pipeline: &Pipeline,
    range: RangeArgs,
    analyze: bool,
    cancel: &CancelToken,
) -> Result<()> {
    let start = parse_date(&range.start)?;
    let end = parse_date(&range.end)?;
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    let report = pipeline
        .ingest_cycle(&range.topic, start, end, analyze, cancel)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_rescan(
    pipeline: &Pipeline,
    topic: &str,
    max_cycles: u32,
    cancel: &CancelToken,
) -> Result<()> {
    for cycle in 1..=max_cycles {
        let report = pipeline.rescan_cycle(topic, cancel).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if report.cancelled || report.is_settled() {
            break;
        }
        tracing::info!(target: "rescan", cycle, resolved = report.resolved, "cycle made progress, continuing");
    }
    Ok(())
}
