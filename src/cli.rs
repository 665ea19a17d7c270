//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged, with the
//! highest priority, over the configuration from the TOML file and the
//! environment.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Receives Alertmanager-style webhooks and relays each alert to Telegram.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Port to listen on for webhook requests.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// File holding the expected bearer token.
    #[arg(long, value_name = "FILE")]
    pub token_file: Option<PathBuf>,

    /// Log level filter (e.g. "info", "alertrelay=debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics.
    #[arg(long)]
    pub metrics: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(port) = self.port {
            dict.insert("server".into(), section("port", Value::from(port)));
        }

        if let Some(path) = &self.token_file {
            dict.insert(
                "auth".into(),
                section("token_file", Value::from(path.display().to_string())),
            );
        }

        // Only an explicit `--metrics` overrides; absence leaves lower layers alone.
        if self.metrics {
            dict.insert("metrics".into(), section("enabled", Value::from(true)));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

fn section(key: &str, value: Value) -> Value {
    let mut dict = Dict::new();
    dict.insert(key.into(), value);
    Value::from(dict)
}
