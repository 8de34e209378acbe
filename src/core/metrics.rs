use std::sync::OnceLock;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder when enabled. Without it every counter is a no-op.
pub fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    let _ = RECORDER.set(handle);

    metrics::describe_counter!(
        "answer_saves_total",
        "Autosave requests by outcome (saved, failed)"
    );
    metrics::describe_counter!(
        "result_fetch_attempts_total",
        "Requests made to the results endpoint, retries included"
    );
    metrics::describe_counter!(
        "submissions_total",
        "Submit calls by trigger (manual, timeout) and outcome"
    );

    Ok(())
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    RECORDER.get().map(PrometheusHandle::render)
}
