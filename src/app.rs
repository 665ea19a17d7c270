//! The main application logic, decoupled from the entry point.

use crate::{
    auth::BearerAuth,
    config::Config,
    core::Notifier,
    formatting::PlainTextFormatter,
    internal_metrics::{server::MetricsServer, Metrics, MetricsBuilder},
    notification::TelegramNotifier,
    pipeline::AlertPipeline,
    server::{build_router, ServerState},
};
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// A fully built application, bound to its listeners but not yet serving.
pub struct App {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
    metrics_server: Option<MetricsServer>,
    metrics_addr: Option<SocketAddr>,
    shutdown_rx: watch::Receiver<bool>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the webhook server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Serves requests until the shutdown signal fires, then drains in-flight
    /// requests and returns.
    pub async fn run(self) -> Result<()> {
        let metrics_task = self.metrics_server.map(|server| tokio::spawn(server.run()));

        let mut shutdown_rx = self.shutdown_rx;
        info!(address = %self.local_addr, "Listening for alert webhooks");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
                info!("Shutdown signal received. Draining in-flight requests...");
            })
            .await
            .context("Webhook server failed")?;

        if let Some(handle) = metrics_task {
            if let Err(e) = handle.await {
                error!("Metrics server task panicked: {:?}", e);
            }
        }

        info!("Webhook server shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// This pattern allows for a clean separation of concerns between constructing
/// the application's components and running the application. It also provides
/// a convenient way to override components for testing purposes.
pub struct AppBuilder {
    config: Config,
    notifier_override: Option<Arc<dyn Notifier>>,
    auth_override: Option<BearerAuth>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            notifier_override: None,
            auth_override: None,
            metrics_override: None,
        }
    }

    /// Overrides the notification channel for testing.
    pub fn notifier_override(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier_override = Some(notifier);
        self
    }

    /// Overrides the bearer token instead of reading the token file.
    pub fn auth_override(mut self, auth: BearerAuth) -> Self {
        self.auth_override = Some(auth);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;

        // =========================================================================
        // 1. Initialize Metrics
        // =========================================================================
        let (metrics, metrics_server_info) = match self.metrics_override {
            Some(m) => (m, None),
            None => {
                MetricsBuilder::new(config.metrics.clone())
                    .build(shutdown_rx.clone())
                    .await
            }
        };
        let (metrics_server, metrics_addr) = match metrics_server_info {
            Some((server, addr)) => {
                info!(address = %addr, "Metrics server enabled");
                (Some(server), Some(addr))
            }
            None => (None, None),
        };

        // =========================================================================
        // 2. Frozen configuration: token and delivery channel
        // =========================================================================
        let auth = match self.auth_override {
            Some(auth) => auth,
            None => BearerAuth::from_file(&config.auth.token_file)?,
        };

        let notifier: Arc<dyn Notifier> = match self.notifier_override {
            Some(notifier) => notifier,
            None => {
                let telegram = TelegramNotifier::from_config(&config.telegram);
                if !telegram.has_credentials() {
                    warn!("Telegram credentials are not set; alerts will be logged but not delivered.");
                }
                Arc::new(telegram)
            }
        };

        // =========================================================================
        // 3. Pipeline and HTTP server
        // =========================================================================
        let pipeline = AlertPipeline::new(Box::new(PlainTextFormatter), notifier, metrics.clone());
        let state = Arc::new(ServerState {
            pipeline,
            auth,
            metrics,
        });
        let router = build_router(state, config.server.max_body_bytes);

        let listen_address = config.server.listen_address();
        let listener = TcpListener::bind(listen_address)
            .await
            .with_context(|| format!("Failed to bind webhook server to {}", listen_address))?;
        let local_addr = listener.local_addr()?;

        Ok(App {
            listener,
            router,
            local_addr,
            metrics_server,
            metrics_addr,
            shutdown_rx,
        })
    }
}
