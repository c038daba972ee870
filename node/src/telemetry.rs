// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const DEFAULT_LOG_FILTER: &str = "chainlog_node=debug,chainlog_kernel=info";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Metrics disabled, recorder install failed: {}", e),
    }

    metrics::describe_counter!("chainlog_blocks_replayed_total", "Blocks fully replayed and checkpointed, per group");
    metrics::describe_counter!("chainlog_replay_failures_total", "Blocks rolled back after a processor or storage failure");
    metrics::describe_gauge!("chainlog_checkpoint_height", "Last committed height, per group");
    metrics::describe_counter!("chainlog_block_logs_stored_total", "Block logs written to the store");
    metrics::describe_counter!("chainlog_blocks_finalized_total", "Block log rows flipped to final");
    metrics::describe_histogram!("chainlog_batch_duration_seconds", "Wall time of one replay batch, per group");

    metrics::gauge!("chainlog_node_up", 1.0);
}

/// Render the Prometheus exposition text
pub fn get_metrics() -> String {
    match PROM_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# metrics not initialized".to_string(),
    }
}
