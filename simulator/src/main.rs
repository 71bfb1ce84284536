//! Synthex Simulator
//!
//! Replays scripted or randomized trading against an in-memory exchanger.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;
use synthex_exchanger::ExchangerConfig;

/// Synthex Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Synthex exchange and settlement simulator")]
struct Args {
    /// Built-in scenario to run
    #[arg(short, long, default_value = "random", conflicts_with = "file")]
    scenario: String,

    /// JSON scenario file to run instead of a built-in one
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Override the settlement waiting period
    #[arg(long)]
    waiting_period: Option<u64>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let json = args.json.then(|| tracing_subscriber::fmt::layer().json());
    let plain = (!args.json).then(|| tracing_subscriber::fmt::layer());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(json)
        .with(plain)
        .init();

    if args.list {
        for name in Scenario::BUILT_IN {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = ExchangerConfig::from_env();
    if let Some(secs) = args.waiting_period {
        config.waiting_period_secs = secs;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let scenario = match &args.file {
        Some(path) => Scenario::from_file(path)?,
        None => Scenario::load(&args.scenario)?,
    };

    info!("Starting Synthex Simulator");
    info!("Waiting period: {}s", config.waiting_period_secs);

    let mut controller = SimulationController::new(config, args.seed)?;
    controller.run_scenario(&scenario).await?;

    // Print metrics
    let metrics = controller.metrics();
    let engine = controller.sandbox().exchanger.metrics();
    info!("Simulation complete");
    info!("Exchanges: {} attempted, {} committed", metrics.exchanges_attempted, metrics.exchanges_succeeded);
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!("Settlements: {} (reclaimed {}, rebated {})", metrics.settlements, metrics.reclaimed, metrics.rebated);
    info!("Rejections: {}", serde_json::to_string(&metrics.rejections)?);
    info!("Engine counters: {}", serde_json::to_string(&engine)?);
    info!(
        "Fees to distribute: {} {}",
        controller
            .sandbox()
            .fee_pool
            .fees_to_distribute(&controller.sandbox().exchanger.config().base_asset),
        controller.sandbox().exchanger.config().base_asset
    );

    Ok(())
}
