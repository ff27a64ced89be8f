use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod config;
mod delivery;
mod error;
mod handlers;
mod panel_client;
mod pipeline;
mod totp;
mod utils;

use config::GatewayConfig;
use panel_client::PanelClient;

const CONTENT_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load()?;
    tracing::info!("Subscription gateway starting...");
    tracing::info!("Panel: {}", config.panel_base_url());
    tracing::info!("Content base URL: {}", config.subscription_url);
    if config.totp_enabled {
        tracing::info!("Login step-up: enabled");
    }

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/sub/{sub_id}", get(handlers::subscription::subscription_handler))
        .route("/api/subscriptions", get(handlers::list::list_subscriptions))
        .route("/api/traffic/{sub_id}", get(handlers::traffic::traffic_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub panel_client: PanelClient,
    /// Client for the raw subscription payload. Content hosts commonly run
    /// self-signed certificates, so verification is disabled here and only
    /// here.
    pub content_client: reqwest::Client,
}

impl AppState {
    fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let panel_client = PanelClient::new(&config)?;
        let content_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(CONTENT_TIMEOUT)
            .build()?;

        Ok(Self {
            config,
            panel_client,
            content_client,
        })
    }
}
