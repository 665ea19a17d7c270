//! # Internal Metrics Module
//!
//! This module provides the infrastructure for collecting and exposing
//! application metrics.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics system.
//!   It installs the Prometheus recorder, binds the metrics listener, and
//!   constructs the `Metrics` handle.
//!
//! - **`Metrics`**: A lightweight, cloneable struct that serves as the public
//!   API for the rest of the application. It provides high-level methods for
//!   updating the predefined metrics.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

pub mod server;

use crate::config::MetricsConfig;
use crate::core::{BatchResult, DeliveryOutcome};
use crate::internal_metrics::server::MetricsServer;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

/// The public API for the metrics system.
///
/// This struct holds cloneable handles to the metrics collectors.
#[derive(Clone)]
pub struct Metrics {
    pub rejected_unauthorized_total: Counter,
    pub rejected_invalid_json_total: Counter,
    pub alerts_received_total: Counter,
    pub alerts_processed_total: Counter,
    pub alerts_skipped_total: Counter,
    pub deliveries_succeeded_total: Counter,
    pub deliveries_failed_total: Counter,
    pub delivery_attempts_total: Counter,
    pub delivery_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        // Descriptions (for Prometheus)
        metrics::describe_counter!("payloads_rejected_total", Unit::Count, "Total number of webhook requests rejected before processing, labeled by reason.");
        metrics::describe_counter!("alerts_received_total", Unit::Count, "Total number of alert candidates found in accepted payloads.");
        metrics::describe_counter!("alerts_processed_total", Unit::Count, "Total number of alerts successfully extracted.");
        metrics::describe_counter!("alerts_skipped_total", Unit::Count, "Total number of alert candidates that could not be extracted.");
        metrics::describe_counter!("deliveries_total", Unit::Count, "Total number of delivery sequences, labeled by outcome.");
        metrics::describe_counter!("delivery_attempts_total", Unit::Count, "Total number of requests made to the notification channel.");
        metrics::describe_histogram!("delivery_duration_seconds", Unit::Seconds, "Time from the first delivery attempt to the terminal outcome, including backoff.");

        // Handles (for application use)
        Self {
            rejected_unauthorized_total: metrics::counter!("payloads_rejected_total", "reason" => "unauthorized"),
            rejected_invalid_json_total: metrics::counter!("payloads_rejected_total", "reason" => "invalid_json"),
            alerts_received_total: metrics::counter!("alerts_received_total"),
            alerts_processed_total: metrics::counter!("alerts_processed_total"),
            alerts_skipped_total: metrics::counter!("alerts_skipped_total"),
            deliveries_succeeded_total: metrics::counter!("deliveries_total", "outcome" => "delivered"),
            deliveries_failed_total: metrics::counter!("deliveries_total", "outcome" => "failed"),
            delivery_attempts_total: metrics::counter!("delivery_attempts_total"),
            delivery_duration_seconds: metrics::histogram!("delivery_duration_seconds"),
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    /// Used when metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            rejected_unauthorized_total: Counter::noop(),
            rejected_invalid_json_total: Counter::noop(),
            alerts_received_total: Counter::noop(),
            alerts_processed_total: Counter::noop(),
            alerts_skipped_total: Counter::noop(),
            deliveries_succeeded_total: Counter::noop(),
            deliveries_failed_total: Counter::noop(),
            delivery_attempts_total: Counter::noop(),
            delivery_duration_seconds: Histogram::noop(),
        }
    }

    /// Adds the counters of a finished batch.
    pub fn record_batch(&self, batch: &BatchResult) {
        self.alerts_received_total
            .increment(batch.received_raw_count as u64);
        self.alerts_processed_total.increment(batch.processed as u64);
        self.alerts_skipped_total.increment(batch.skipped as u64);
    }

    /// Records the terminal outcome of one delivery.
    pub fn record_delivery(&self, outcome: &DeliveryOutcome, elapsed: Duration) {
        if outcome.is_success() {
            self.deliveries_succeeded_total.increment(1);
        } else {
            self.deliveries_failed_total.increment(1);
        }
        self.delivery_attempts_total
            .increment(u64::from(outcome.attempts()));
        self.delivery_duration_seconds.record(elapsed.as_secs_f64());
    }
}

/// Builder for the metrics system.
///
/// This builder is responsible for initializing the `PrometheusRecorder`,
/// preparing the `MetricsServer`, and creating the `Metrics` handle.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle and an
    /// optional `MetricsServer` with its bound address.
    ///
    /// If metrics are disabled, or any step of the setup fails, this returns a
    /// disabled `Metrics` instance and `None` for the server. Metrics are never
    /// a reason to refuse startup.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let recorder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        ) {
            Ok(builder) => builder.build_recorder(),
            Err(e) => {
                error!("Failed to configure Prometheus buckets: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let handle = recorder.handle();

        // Bind before installing the recorder so a busy port leaves the
        // global recorder untouched.
        let listener = match TcpListener::bind(self.config.listen_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);

        (metrics, Some((server, addr)))
    }
}
