use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod contracts;
mod error;
mod models;
mod services;
mod websocket;

use config::Config;
use constants::API_VERSION;
use services::{DashboardController, EthersTransport, NotificationService, RpcWalletProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stake_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting stake dashboard");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);
    tracing::info!("Wallet bridge: {}", config.wallet_rpc_url);

    // Wallet and chain access
    let provider = Arc::new(RpcWalletProvider::from_config(&config)?);
    let transport = Arc::new(EthersTransport::from_config(&config)?);
    let notifications = Arc::new(NotificationService::new(config.notification_history));

    let dashboard = Arc::new(DashboardController::new(
        &config,
        provider.clone(),
        transport,
        notifications.clone(),
    )?);

    let app_state = api::AppState {
        config: config.clone(),
        dashboard: dashboard.clone(),
        notifications,
    };

    // Build router
    let app = build_router(app_state);

    // Start background services
    services::start_background_services(provider, dashboard);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Dashboard
        .route("/api/v1/dashboard", get(api::dashboard::get_dashboard))
        // Network guard
        .route("/api/v1/network", get(api::network::get_network))
        .route("/api/v1/network/switch", post(api::network::switch_network))
        // Staking
        .route("/api/v1/stake/submit", post(api::stake::submit))
        // Notifications
        .route("/api/v1/notifications/list", get(api::notifications::list))
        // WebSocket endpoints
        .route("/ws/notifications", get(websocket::notifications::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
