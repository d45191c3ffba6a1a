//! # CLI Interface
//!
//! Defines the command-line argument structure for `yieldvault-node` using
//! `clap` derive. Supports three subcommands: `run`, `simulate`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// yieldvault devnet host.
///
/// Runs one in-process vault and withdrawal queue against a manual price
/// feed and clock, serves the JSON-RPC and REST API, and exposes
/// Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "yieldvault-node",
    about = "yieldvault devnet host",
    version,
    propagate_version = true
)]
pub struct YieldVaultNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the devnet and serve the API.
    Run(RunArgs),
    /// Run one deposit, request, lock, process and claim round and print
    /// the resulting state as JSON.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the devnet configuration file (JSON).
    ///
    /// When omitted, the built-in defaults are used.
    #[arg(long, short = 'c', env = "YIELDVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "YIELDVAULT_RPC_PORT", default_value_t = 9841)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "YIELDVAULT_METRICS_PORT", default_value_t = 9842)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "YIELDVAULT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Path to the devnet configuration file (JSON).
    #[arg(long, short = 'c', env = "YIELDVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of depositors taking part in the round.
    #[arg(long, default_value_t = 3)]
    pub holders: u32,

    /// Base asset each depositor brings, in smallest units.
    #[arg(long, default_value_t = 1_000_000_000_000_000_000_000)]
    pub deposit: u128,
}
