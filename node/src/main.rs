// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # yieldvault Devnet Node
//!
//! Entry point for the `yieldvault-node` binary. Parses CLI arguments,
//! initializes logging and metrics, deploys an in-process vault system and
//! serves the HTTP/WS API.
//!
//! Subcommands:
//!
//! - `run`: serve the devnet
//! - `simulate`: run one full withdrawal round offline and print the result
//! - `version`: print build version information

mod api;
mod cli;
mod devnet;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use cli::{Commands, YieldVaultNodeCli};
use devnet::{Devnet, DevnetConfig};
use logging::LogFormat;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = YieldVaultNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Simulate(args) => run_simulation(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Deploys the devnet and serves the API and metrics endpoints until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "yieldvault_node=info,yieldvault_contracts=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let config = DevnetConfig::load_or_default(args.config.as_deref())?;
    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        network = %config.network,
        config = ?args.config,
        "starting yieldvault-node"
    );

    let devnet = Devnet::new(&config)?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.observe(&devnet.system);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        devnet: Arc::new(RwLock::new(devnet)),
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("yieldvault-node stopped");
    Ok(())
}

/// Runs [`devnet::simulate`] and prints the report as pretty JSON on stdout.
fn run_simulation(args: cli::SimulateArgs) -> Result<()> {
    logging::init_logging("yieldvault_node=info,yieldvault_contracts=warn", LogFormat::Pretty);

    let config = DevnetConfig::load_or_default(args.config.as_deref())?;
    let mut devnet = Devnet::new(&config)?;
    let report = devnet::simulate(&mut devnet, args.holders, args.deposit)?;

    tracing::info!(
        holders = report.holders.len(),
        settled = report.settlement.request_ids.len(),
        events = devnet.system.events().len(),
        "simulation complete"
    );
    let out = serde_json::to_string_pretty(&report).context("failed to encode simulation report")?;
    println!("{out}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("yieldvault-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that branch never completes and the
/// other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
