//! Attention scoring over a recorded session, with periodic snapshot queries.

use anyhow::{Context, Result};
use attention_fusion::{
    config::Config,
    pipeline::{AttentionPipeline, ReplaySource},
    scorer::AttentionScorer,
};
use clap::Parser;
use log::{info, warn};
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines recording of landmarks and gaze to score
    #[arg(short, long)]
    replay: String,

    /// Deliver frames at their recorded pace
    #[arg(long)]
    realtime: bool,

    /// Interval between printed snapshots in milliseconds
    #[arg(short, long, default_value = "1000")]
    query_interval_ms: u64,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Attention fusion");

    let config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {config_path}");
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    let scorer = AttentionScorer::new(&config).context("Invalid configuration")?;
    let source = ReplaySource::open(&args.replay)?.realtime(args.realtime);
    let handle = AttentionPipeline::new(scorer).spawn(source);
    let query = handle.query_service();

    let interval = Duration::from_millis(args.query_interval_ms.max(1));
    while !handle.is_finished() {
        thread::sleep(interval);
        println!("{}", serde_json::to_string(&query.snapshot())?);
    }

    let summary = handle.join().context("Producer stopped with an error")?;
    println!("{}", serde_json::to_string(&query.snapshot())?);
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
