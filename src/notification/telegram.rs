//! A client for sending alert messages through the Telegram Bot API.

use crate::config::TelegramConfig;
use crate::core::{DeliveryOutcome, Notifier};
use crate::notification::{DeliveryError, RetryPolicy};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Destination chat. Telegram accepts numeric ids and `@channel` names alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawChatId", into = "String")]
pub struct ChatId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChatId {
    Numeric(i64),
    Text(String),
}

impl From<RawChatId> for ChatId {
    fn from(raw: RawChatId) -> Self {
        match raw {
            RawChatId::Numeric(id) => ChatId(id.to_string()),
            RawChatId::Text(id) => ChatId(id.trim().to_string()),
        }
    }
}

impl From<ChatId> for String {
    fn from(id: ChatId) -> Self {
        id.0
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        ChatId(id.trim().to_string())
    }
}

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bot token and destination chat.
#[derive(Clone)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: ChatId,
}

impl fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// The result of a single request to the Bot API.
enum Attempt {
    Delivered(String),
    Terminal(DeliveryError),
    ServerError { status: StatusCode, body: String },
    Network(reqwest::Error),
}

/// Sends messages to a Telegram chat, retrying transient failures.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base_url: String,
    credentials: Option<TelegramCredentials>,
    policy: RetryPolicy,
}

impl TelegramNotifier {
    /// Creates a new `TelegramNotifier`.
    ///
    /// Without credentials every delivery ends immediately with `no-creds`.
    pub fn new(
        api_base_url: impl Into<String>,
        credentials: Option<TelegramCredentials>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            credentials,
            policy,
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(
            config.api_base_url.clone(),
            config.credentials(),
            config.retry_policy(),
        )
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Performs one `sendMessage` request and classifies the answer.
    async fn attempt(&self, credentials: &TelegramCredentials, message: &str) -> Attempt {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base_url, credentials.bot_token
        );
        let request = self
            .client
            .post(url)
            .timeout(self.policy.attempt_timeout)
            .form(&[("chat_id", credentials.chat_id.as_str()), ("text", message)]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Network(e),
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::Network(e),
        };

        if status == StatusCode::OK {
            match serde_json::from_str::<SendMessageResponse>(&body) {
                Ok(SendMessageResponse { ok: true, .. }) => Attempt::Delivered(body),
                Ok(SendMessageResponse { description, .. }) => {
                    warn!(description = ?description, "Telegram answered 200 with ok=false");
                    Attempt::Terminal(DeliveryError::Rejected {
                        status: status.as_u16(),
                        body,
                    })
                }
                Err(_) => Attempt::Terminal(DeliveryError::UndecodableResponse(body)),
            }
        } else if status.is_server_error() {
            Attempt::ServerError { status, body }
        } else {
            Attempt::Terminal(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    #[instrument(skip_all, fields(channel = "telegram", len = message.len()))]
    async fn deliver(&self, message: &str) -> DeliveryOutcome {
        let Some(credentials) = &self.credentials else {
            warn!("Telegram credentials are not configured; message not delivered.");
            return DeliveryOutcome::Failed {
                attempts: 0,
                error: DeliveryError::MissingCredentials,
            };
        };

        let max_attempts = self.policy.attempts();
        for attempt in 1..=max_attempts {
            let backoff = match self.attempt(credentials, message).await {
                Attempt::Delivered(response) => {
                    info!(attempt, "Delivered alert to Telegram.");
                    return DeliveryOutcome::Delivered {
                        attempts: attempt,
                        response,
                    };
                }
                Attempt::Terminal(error) => {
                    error!(attempt, error = %error, "Telegram delivery failed permanently; not retrying.");
                    return DeliveryOutcome::Failed {
                        attempts: attempt,
                        error,
                    };
                }
                Attempt::ServerError { status, body } => {
                    warn!(attempt, status = %status, body = %body, "Telegram server error.");
                    self.policy.server_error_backoff(attempt)
                }
                Attempt::Network(e) => {
                    // The request URL embeds the bot token.
                    let e = e.without_url();
                    warn!(attempt, timeout = e.is_timeout(), error = %e, "HTTP request to Telegram failed.");
                    self.policy.network_error_backoff(attempt)
                }
            };

            if attempt < max_attempts {
                debug!(backoff_ms = backoff.as_millis() as u64, "Retrying after backoff");
                sleep(backoff).await;
            }
        }

        error!(attempts = max_attempts, "Giving up on Telegram delivery.");
        DeliveryOutcome::Failed {
            attempts: max_attempts,
            error: DeliveryError::RetriesExhausted,
        }
    }
}
