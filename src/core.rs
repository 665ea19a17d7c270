//! Core domain types and service traits for AlertRelay
//!
//! This module defines the records that flow through the request pipeline and
//! the trait contract for the notification channel that receives them.

use crate::notification::DeliveryError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

pub const DEFAULT_STATUS: &str = "?";
pub const DEFAULT_NAME: &str = "<no-name>";
pub const DEFAULT_INSTANCE: &str = "<unknown>";

/// A fully extracted, display-ready alert.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CanonicalAlert {
    /// Alert status as reported by the sender (e.g. "firing", "resolved").
    pub status: String,
    /// The `alertname` label.
    pub name: String,
    /// The `instance` (or `host`) label.
    pub instance: String,
    /// The `summary` (or `description`) annotation.
    pub summary: String,
}

impl Default for CanonicalAlert {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS.to_string(),
            name: DEFAULT_NAME.to_string(),
            instance: DEFAULT_INSTANCE.to_string(),
            summary: String::new(),
        }
    }
}

impl fmt::Display for CanonicalAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} on {} — {}",
            self.status, self.name, self.instance, self.summary
        )
    }
}

/// Aggregate counters for one inbound request.
///
/// Every candidate ends up either `processed` or `skipped`, so
/// `received_raw_count == processed + skipped` once the batch is complete.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct BatchResult {
    pub received_raw_count: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl BatchResult {
    pub fn new(received_raw_count: usize) -> Self {
        Self {
            received_raw_count,
            ..Default::default()
        }
    }

    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    /// Counts a skipped candidate. Only unexpected faults carry an error message.
    pub fn record_skipped(&mut self, error: Option<String>) {
        self.skipped += 1;
        if let Some(error) = error {
            self.errors.push(error);
        }
    }
}

/// The terminal result of a delivery attempt sequence.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The channel accepted the message. Carries the raw provider response.
    Delivered { attempts: u32, response: String },
    /// No further attempt will be made.
    Failed { attempts: u32, error: DeliveryError },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    /// Number of network attempts made. Zero when delivery was never tried.
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts, .. } => *attempts,
            DeliveryOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    /// The provider response body on success, or the failure reason.
    pub fn detail(&self) -> String {
        match self {
            DeliveryOutcome::Delivered { response, .. } => response.clone(),
            DeliveryOutcome::Failed { error, .. } => error.to_string(),
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Sends formatted alert messages to a notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A short, descriptive name for the channel (e.g., "telegram").
    /// Used for logging and metrics.
    fn name(&self) -> &str;

    /// Delivers a single text message.
    ///
    /// Never returns an error: every failure is folded into a terminal
    /// `DeliveryOutcome` so the caller can keep processing its batch.
    async fn deliver(&self, message: &str) -> DeliveryOutcome;
}
