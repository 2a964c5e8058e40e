use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Recorder setup
// ---------------------------------------------------------------------------

/// Install the Prometheus metrics recorder.
///
/// Must be called once, before any metrics are recorded. The returned handle
/// renders the exposition text for the `/metrics` endpoint.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder")
}

/// Register all metric descriptors at startup.
pub fn describe_all_metrics() {
    // -- Ingest pipeline --
    describe_counter!(
        "clipvault_ingest_total",
        "Completed video ingestions by outcome"
    );
    describe_counter!(
        "clipvault_ingest_failures_total",
        "Failed video ingestions by pipeline stage"
    );
    describe_histogram!(
        "clipvault_ingest_duration_seconds",
        "End-to-end video ingestion duration"
    );
    describe_histogram!(
        "clipvault_upload_size_bytes",
        "Staged video upload size"
    );

    // -- Thumbnails --
    describe_counter!(
        "clipvault_thumbnail_total",
        "Thumbnail uploads by outcome"
    );

    // -- Process --
    describe_counter!("clipvault_panic_total", "Panics caught by the panic hook");
    describe_gauge!("clipvault_uptime_seconds", "Process uptime");
}

// ---------------------------------------------------------------------------
// Recording helpers
// ---------------------------------------------------------------------------

pub fn inc_ingest_outcome(outcome: &'static str) {
    counter!("clipvault_ingest_total", "outcome" => outcome).increment(1);
}

pub fn inc_ingest_failure(stage: &'static str) {
    counter!("clipvault_ingest_total", "outcome" => "failure").increment(1);
    counter!("clipvault_ingest_failures_total", "stage" => stage).increment(1);
}

pub fn record_ingest_duration(secs: f64) {
    histogram!("clipvault_ingest_duration_seconds").record(secs);
}

pub fn record_upload_size(bytes: f64) {
    histogram!("clipvault_upload_size_bytes").record(bytes);
}

pub fn inc_thumbnail_outcome(outcome: &'static str) {
    counter!("clipvault_thumbnail_total", "outcome" => outcome).increment(1);
}

pub fn inc_panic_total() {
    counter!("clipvault_panic_total").increment(1);
}

/// Periodically publish process uptime until cancelled.
pub async fn run_uptime_task(start: Instant, cancel: CancellationToken) {
    let interval = std::time::Duration::from_secs(10);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {
                gauge!("clipvault_uptime_seconds").set(start.elapsed().as_secs_f64());
            }
        }
    }
}
