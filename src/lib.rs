/// AlertRelay - An Alertmanager webhook receiver that relays alerts to Telegram
///
/// This library accepts alert payloads in whatever shape upstream senders
/// produce, normalizes them into canonical alerts, and forwards each one to
/// the notification channel with bounded retries.
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod core;
pub mod extract;
pub mod formatting;
pub mod internal_metrics;
pub mod normalize;
pub mod notification;
pub mod pipeline;
pub mod server;

// Re-export core types for convenience
pub use core::*;
