//! TokenLedger Simulator
//!
//! Runs scripted ledger scenarios, or a random concurrent workload followed
//! by a supply audit.

use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenledger_contract::ContractConfig;

mod controller;
mod holder;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// TokenLedger Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "TokenLedger scenario runner and workload simulator")]
struct Args {
    /// Scenario to run: lifecycle, replay, unauthorized, all or random
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// Number of simulated holders
    #[arg(long, default_value = "4")]
    holders: usize,

    /// Balance minted to each holder before a random run
    #[arg(long, default_value = "10000")]
    initial_balance: u64,

    /// Operations in a random run
    #[arg(short, long, default_value = "1000")]
    operations: usize,

    /// Concurrent workers in a random run
    #[arg(short, long, default_value = "4")]
    concurrency: usize,

    /// Re-executions allowed per operation on commit conflicts
    #[arg(long)]
    max_retries: Option<u32>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting TokenLedger Simulator");

    let mut config = ContractConfig::from_env();
    if let Some(retries) = args.max_retries {
        config.max_commit_retries = retries;
    }
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let started = Instant::now();
    let controller = match args.scenario.as_str() {
        "random" => {
            let controller = SimulationController::new(config, args.holders, args.seed)?;
            controller.initialize(args.initial_balance).await?;
            controller.run_random(args.operations, args.concurrency).await?;

            let audit = controller.audit().await?;
            info!(
                total_supply = %audit.total_supply,
                holders = audit.holders,
                "Supply audit passed"
            );
            controller
        }
        "all" => {
            let mut last = None;
            for name in Scenario::names() {
                let controller = SimulationController::new(config.clone(), args.holders, args.seed)?;
                controller.run_scenario(Scenario::load(name)?).await?;
                last = Some(controller);
            }
            last.ok_or_else(|| anyhow::anyhow!("No scenarios registered"))?
        }
        name => {
            let controller = SimulationController::new(config, args.holders, args.seed)?;
            controller.run_scenario(Scenario::load(name)?).await?;
            controller
        }
    };
    let elapsed = started.elapsed().as_secs_f64();

    let metrics = controller.get_metrics();
    info!("Simulation complete");
    if metrics.total_operations > 0 {
        info!(
            total = metrics.total_operations,
            committed = metrics.committed,
            rejected = metrics.rejected,
            failed = metrics.failed,
            retries = metrics.retries,
            commit_rate = metrics.commit_rate(),
            throughput = metrics.throughput(elapsed),
            avg_latency_us = metrics.average_latency_us(),
            p50_latency_us = metrics.p50_latency_us(),
            p99_latency_us = metrics.p99_latency_us(),
            "Workload metrics"
        );
    }
    println!("{}", controller.contract().metrics().to_prometheus());

    Ok(())
}
