//! # Prometheus Metrics
//!
//! Operational metrics for the devnet host, scraped at `/metrics` on the
//! metrics port. Everything lives in a dedicated [`prometheus::Registry`]
//! prefixed `yieldvault`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use yieldvault_contracts::VaultSystem;

/// Metric handles for the node. Cheap to clone.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// RPC calls received, by method.
    pub rpc_calls_total: IntCounterVec,
    /// RPC calls rejected, by error kind.
    pub rpc_failures_total: IntCounterVec,
    /// Tickets settled by `queue_process`.
    pub requests_processed_total: IntCounter,
    /// Vault total assets in base units. Float, so large values lose
    /// precision.
    pub total_assets: Gauge,
    /// Outstanding vault shares.
    pub share_supply: Gauge,
    /// Addresses holding a non-zero share balance, queue escrow included.
    pub share_holders: IntGauge,
    /// Tickets in `Requested` or `Locked`.
    pub pending_requests: IntGauge,
    /// Entries in the audit event log.
    pub event_log_length: IntGauge,
    /// Wall time spent handling one RPC call, in seconds.
    pub rpc_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("yieldvault".into()), None)?;

        let rpc_calls_total = IntCounterVec::new(
            Opts::new("rpc_calls_total", "JSON-RPC calls received"),
            &["method"],
        )?;
        registry.register(Box::new(rpc_calls_total.clone()))?;

        let rpc_failures_total = IntCounterVec::new(
            Opts::new("rpc_failures_total", "JSON-RPC calls rejected by the ledger"),
            &["kind"],
        )?;
        registry.register(Box::new(rpc_failures_total.clone()))?;

        let requests_processed_total = IntCounter::new(
            "requests_processed_total",
            "Withdrawal tickets settled",
        )?;
        registry.register(Box::new(requests_processed_total.clone()))?;

        let total_assets = Gauge::new("total_assets", "Vault total assets in base units")?;
        registry.register(Box::new(total_assets.clone()))?;

        let share_supply = Gauge::new("share_supply", "Outstanding vault shares")?;
        registry.register(Box::new(share_supply.clone()))?;

        let share_holders = IntGauge::new("share_holders", "Addresses with a non-zero share balance")?;
        registry.register(Box::new(share_holders.clone()))?;

        let pending_requests =
            IntGauge::new("pending_requests", "Tickets in Requested or Locked")?;
        registry.register(Box::new(pending_requests.clone()))?;

        let event_log_length = IntGauge::new("event_log_length", "Entries in the audit event log")?;
        registry.register(Box::new(event_log_length.clone()))?;

        let rpc_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "JSON-RPC handling latency in seconds")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(rpc_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            rpc_calls_total,
            rpc_failures_total,
            requests_processed_total,
            total_assets,
            share_supply,
            share_holders,
            pending_requests,
            event_log_length,
            rpc_latency_seconds,
        })
    }

    /// Refreshes the gauges from the current ledger state.
    pub fn observe(&self, system: &VaultSystem) {
        // A stale feed leaves the last reading in place.
        if let Ok(total) = system.total_assets() {
            self.total_assets.set(total as f64);
        }
        self.share_supply.set(system.vault().total_supply() as f64);
        self.share_holders
            .set(i64::try_from(system.vault().shares().holder_count()).unwrap_or(i64::MAX));
        self.pending_requests
            .set(i64::try_from(system.queue().pending_count()).unwrap_or(i64::MAX));
        self.event_log_length
            .set(i64::try_from(system.events().len()).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics`.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
