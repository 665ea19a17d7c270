//! The per-request alert pipeline.
//!
//! A request body is normalized into candidates once; each candidate is then
//! extracted, formatted and delivered strictly in input order. Element-level
//! failures are folded into the `BatchResult` and never abort the batch.
//!
//! An alert counts as `processed` as soon as it has been extracted, whether or
//! not the channel accepted it. Delivery failures are logged and counted in
//! the delivery metrics instead.

use crate::core::{BatchResult, CanonicalAlert, Notifier};
use crate::extract::{extract, ExtractError};
use crate::formatting::TextFormatter;
use crate::internal_metrics::Metrics;
use crate::normalize::{decode_body, InvalidPayload};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Normalizes, extracts and forwards the alerts of one request.
pub struct AlertPipeline {
    formatter: Box<dyn TextFormatter>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
}

impl AlertPipeline {
    pub fn new(
        formatter: Box<dyn TextFormatter>,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
    ) -> Self {
        Self {
            formatter,
            notifier,
            metrics,
        }
    }

    /// Runs the whole pipeline on a raw request body.
    #[instrument(skip_all, fields(body_len = body.len()))]
    pub async fn process_body(&self, body: &[u8]) -> Result<BatchResult, InvalidPayload> {
        let candidates = decode_body(body)?;
        Ok(self.process_candidates(candidates).await)
    }

    /// Processes already-normalized candidates in order.
    pub async fn process_candidates(&self, candidates: Vec<Value>) -> BatchResult {
        let mut batch = BatchResult::new(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            match self.prepare(candidate) {
                Ok((alert, message)) => {
                    info!(index, "ALERT normalized: {}", message);
                    self.forward(index, &alert, &message).await;
                    batch.record_processed();
                }
                Err(e) if e.is_fault() => {
                    error!(index, error = %e, "Failed to process element");
                    batch.record_skipped(Some(e.to_string()));
                }
                Err(e) => {
                    warn!(index, reason = %e, "Skipping element");
                    batch.record_skipped(None);
                }
            }
        }

        debug!(
            received = batch.received_raw_count,
            processed = batch.processed,
            skipped = batch.skipped,
            "Batch complete"
        );
        self.metrics.record_batch(&batch);
        batch
    }

    /// Extracts and formats one candidate.
    fn prepare(&self, candidate: &Value) -> Result<(CanonicalAlert, String), ExtractError> {
        // A panic while handling one element must not unwind the batch.
        panic::catch_unwind(AssertUnwindSafe(|| {
            let alert = extract(candidate)?;
            let message = self.formatter.format_alert(&alert);
            Ok((alert, message))
        }))
        .unwrap_or_else(|payload| Err(ExtractError::Fault(panic_message(payload.as_ref()))))
    }

    async fn forward(&self, index: usize, alert: &CanonicalAlert, message: &str) {
        let started = Instant::now();
        let outcome = self.notifier.deliver(message).await;
        self.metrics.record_delivery(&outcome, started.elapsed());

        if outcome.is_success() {
            debug!(index, channel = self.notifier.name(), attempts = outcome.attempts(), "Alert delivered");
        } else {
            warn!(
                index,
                alert = %alert.name,
                channel = self.notifier.name(),
                attempts = outcome.attempts(),
                reason = %outcome.detail(),
                "Alert extracted but not delivered"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected fault while processing element".to_string()
    }
}
