//! Prometheus metrics exposition server.
//!
//! Serves mailsink counters in Prometheus format when `metrics.enabled` is
//! set. Without the server the `metrics` macros are no-ops.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Register all metric descriptions for Prometheus.
///
/// Called once after the recorder is installed.
pub fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        "mailsink_records_received_total",
        "Total number of records handed to the sink"
    );
    describe_counter!(
        "mailsink_messages_sent_total",
        "Total number of messages accepted by the SMTP server"
    );
    describe_counter!(
        "mailsink_messages_failed_total",
        "Total number of messages that failed, by error class"
    );
    describe_counter!(
        "mailsink_scrub_replacements_total",
        "Total number of rendered texts repaired by replacing invalid bytes"
    );
    describe_counter!(
        "mailsink_input_parse_errors_total",
        "Total number of malformed input lines skipped"
    );
    describe_gauge!(
        "mailsink_build_info",
        "Build information with version label (always 1)"
    );
}

/// Set every unlabelled metric to its initial value so it shows up in
/// `/metrics` before the first record arrives.
pub fn initialize_metrics() {
    use metrics::{counter, gauge};

    gauge!("mailsink_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    counter!("mailsink_records_received_total").absolute(0);
    counter!("mailsink_messages_sent_total").absolute(0);
    counter!("mailsink_scrub_replacements_total").absolute(0);
}

/// Metrics server for Prometheus exposition on `/metrics`.
pub struct MetricsServer {
    port: u16,
    /// Signalled once the recorder is installed, so callers can wait before
    /// emitting metrics that would otherwise be lost.
    ready_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MetricsServer {
    /// Create a new metrics server bound to the given port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ready_tx: None,
        }
    }

    /// Create a new metrics server with a ready signal channel.
    pub fn with_ready_signal(port: u16, ready_tx: tokio::sync::oneshot::Sender<()>) -> Self {
        Self {
            port,
            ready_tx: Some(ready_tx),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Install the global recorder and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be installed (port in use,
    /// or a recorder already installed in this process).
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();

        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

        register_metric_descriptions();
        initialize_metrics();

        if let Some(tx) = self.ready_tx {
            let _ = tx.send(());
        }

        info!(port = self.port, "Metrics server started on /metrics");

        cancel.cancelled().await;

        info!("Metrics server shutting down");

        Ok(())
    }
}
