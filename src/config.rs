//! Configuration management for AlertRelay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer, in increasing priority: built-in defaults, an optional TOML
//! file, the conventional deployment variables (`PORT`, `SERVER_PORT`,
//! `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`), `ALERTRELAY_`-prefixed
//! variables, and command-line flags.
//!
//! The result is frozen at startup; nothing mutates it afterwards.

use crate::cli::Cli;
use crate::notification::{ChatId, RetryPolicy, TelegramCredentials};
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Where the bearer token secret is mounted by default.
pub const DEFAULT_TOKEN_FILE: &str = "/etc/webhook-secret/webhook_bearer";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the inbound HTTP server.
    pub server: ServerConfig,
    /// Configuration for request authentication.
    pub auth: AuthConfig,
    /// Configuration for the Telegram delivery channel.
    pub telegram: TelegramConfig,
    /// Configuration for the Prometheus metrics endpoint.
    pub metrics: MetricsConfig,
}

/// Configuration for the inbound HTTP server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub host: IpAddr,
    /// The port to listen on.
    pub port: u16,
    /// Request bodies larger than this are refused with 413.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Configuration for request authentication.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// File holding the expected bearer token. A missing file disables the check.
    pub token_file: PathBuf,
}

/// Configuration for the Telegram delivery channel.
#[serde_as]
#[derive(Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    /// The bot token issued by BotFather.
    pub bot_token: Option<String>,
    /// The chat that receives the alerts.
    pub chat_id: Option<ChatId>,
    /// Base URL of the Bot API.
    pub api_base_url: String,
    /// Total delivery attempts per message.
    pub max_attempts: u32,
    /// Timeout for each individual request.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "attempt_timeout_secs")]
    pub attempt_timeout: Duration,
    /// Base unit for the retry backoff.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "backoff_unit_ms")]
    pub backoff_unit: Duration,
}

impl TelegramConfig {
    /// Returns the credentials when both the token and the chat are set.
    pub fn credentials(&self) -> Option<TelegramCredentials> {
        let bot_token = self.bot_token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let chat_id = self.chat_id.clone().filter(|id| !id.as_str().is_empty())?;
        Some(TelegramCredentials {
            bot_token: bot_token.to_string(),
            chat_id,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: self.attempt_timeout,
            backoff_unit: self.backoff_unit,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .field("api_base_url", &self.api_base_url)
            .field("max_attempts", &self.max_attempts)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("backoff_unit", &self.backoff_unit)
            .finish()
    }
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    pub enabled: bool,
    /// The address the metrics server binds to.
    pub listen_address: SocketAddr,
}

impl Config {
    /// Loads the application configuration, layering every source on top of
    /// the defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = &cli.config {
            if !path.exists() {
                bail!("Config file not found at specified path: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: Config = figment
            // SERVER_PORT wins over PORT.
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(Env::raw().only(&["SERVER_PORT"]).map(|_| "server.port".into()))
            .merge(Env::raw().filter_map(|key| {
                if key.as_str().eq_ignore_ascii_case("TELEGRAM_BOT_TOKEN") {
                    Some("telegram.bot_token".into())
                } else if key.as_str().eq_ignore_ascii_case("TELEGRAM_CHAT_ID") {
                    Some("telegram.chat_id".into())
                } else {
                    None
                }
            }))
            // e.g. ALERTRELAY_TELEGRAM__MAX_ATTEMPTS=5
            .merge(Env::prefixed("ALERTRELAY_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 8080,
                max_body_bytes: 4 * 1024 * 1024,
            },
            auth: AuthConfig {
                token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            },
            telegram: TelegramConfig {
                bot_token: None,
                chat_id: None,
                api_base_url: "https://api.telegram.org".to_string(),
                max_attempts: 3,
                attempt_timeout: Duration::from_secs(10),
                backoff_unit: Duration::from_secs(1),
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9090),
            },
        }
    }
}
