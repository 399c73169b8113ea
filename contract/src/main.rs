//! TokenLedger Contract Host
//!
//! Serves invocations read as JSON lines from stdin against an in-memory
//! ledger and writes one response envelope per line to stdout.

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenledger_common::LedgerError;
use tokenledger_contract::{ContractConfig, TokenContract};
use tokenledger_ledger::{Caller, MemoryStore};
use tokenledger_protocol::InvocationResponse;

/// One line of input.
#[derive(Debug, Deserialize)]
struct Request {
    function: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    caller: Caller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ContractConfig::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    info!("Starting TokenLedger contract host");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let store = Arc::new(MemoryStore::new());
    let contract = TokenContract::new(config, store)?;

    info!(node_id = %contract.node_id(), "Contract host running");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => contract.invoke_raw(&request.caller, &request.function, &request.args),
            Err(e) => {
                warn!(error = %e, "Unreadable request line");
                let error = LedgerError::invalid(format!("malformed request: {}", e));
                InvocationResponse::from_error(String::new(), &error)
            }
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    let metrics = contract.metrics().snapshot();
    info!(
        invocations = metrics.invocations_total,
        committed = metrics.invocations_committed,
        rejected = metrics.invocations_rejected,
        failed = metrics.invocations_failed,
        queries = metrics.queries_total,
        conflicts = metrics.commit_conflicts,
        "Contract host shutdown complete"
    );

    Ok(())
}
