//! Delivery of formatted alerts to the notification channel.
//!
//! The channel client implements the `Notifier` trait from `core`, so the
//! request pipeline never depends on a concrete provider. Failures are
//! classified as transient (retried with backoff) or terminal here, and every
//! delivery ends in a `DeliveryOutcome` rather than an error.
pub mod telegram;

use std::time::Duration;
use thiserror::Error;

pub use telegram::{ChatId, TelegramCredentials, TelegramNotifier};

/// Why a delivery ended without the channel accepting the message.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Bot token or destination is not configured. Never retried.
    #[error("no-creds")]
    MissingCredentials,

    /// The channel refused the request (non-5xx status, or `ok: false`).
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The channel answered 200 with a body that could not be decoded.
    #[error("undecodable response: {0}")]
    UndecodableResponse(String),

    /// Every attempt failed transiently.
    #[error("max_retries_exceeded")]
    RetriesExhausted,
}

/// Bounded retry settings for a single delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Timeout applied to each individual request.
    pub attempt_timeout: Duration,
    /// Base unit for backoff delays.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after a 5xx answer on `attempt` (counted from 1): `2^attempt` units.
    pub fn server_error_backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Delay after a network-level failure on `attempt` (counted from 1): `attempt` units.
    pub fn network_error_backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
